use crate::shared::WORKROOM_DIR;
use log::{info, warn};
use std::path::{Path, PathBuf};

/// Copy developer-local configuration from the source repository into a
/// freshly created worktree. Covers root-level `*.local.*` override files
/// (usually git-ignored, so a new worktree starts without them) and the
/// repository's `.workroom/local/` directory.
///
/// Best-effort by contract: every failure is logged and skipped, existing
/// destination files are never overwritten, and the caller treats this step
/// as a convenience rather than a requirement.
pub fn copy_local_config(repo_path: &Path, worktree_path: &Path) {
    let mut copy_plan: Vec<(PathBuf, PathBuf)> = Vec::new();

    if let Ok(entries) = std::fs::read_dir(repo_path) {
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }

            let name_lower = entry.file_name().to_string_lossy().to_ascii_lowercase();
            if name_lower.contains(".local.") {
                let dest = worktree_path.join(entry.file_name());
                copy_plan.push((path, dest));
            }
        }
    }

    let local_dir = repo_path.join(WORKROOM_DIR).join("local");
    if local_dir.is_dir()
        && let Ok(entries) = std::fs::read_dir(&local_dir)
    {
        for entry in entries.filter_map(Result::ok) {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let dest = worktree_path
                .join(WORKROOM_DIR)
                .join("local")
                .join(entry.file_name());
            copy_plan.push((path, dest));
        }
    }

    for (source, dest) in copy_plan {
        if dest.exists() {
            info!(
                "Skipping local config copy; destination already exists: {}",
                dest.display()
            );
            continue;
        }

        if let Some(parent) = dest.parent()
            && let Err(e) = std::fs::create_dir_all(parent)
        {
            warn!("Failed to create directory for local config: {e}");
            continue;
        }

        match std::fs::copy(&source, &dest) {
            Ok(_) => info!("Copied local config: {}", dest.display()),
            Err(e) => warn!("Failed to copy local config: {e}"),
        }
    }
}
