use super::branches::validate_branch_name;
use super::repository::get_commit_hash;
use anyhow::{Result, anyhow};
use git2::{BranchType, Repository, WorktreeAddOptions, WorktreePruneOptions};
use std::path::Path;

/// Materialize a new worktree at `worktree_path`, on a fresh local branch
/// `branch_name` rooted at the already-resolved `start_point` (a plain
/// branch name or a remote-tracking shorthand like `origin/main`).
pub fn create_worktree(
    repo_path: &Path,
    branch_name: &str,
    worktree_path: &Path,
    start_point: &str,
) -> Result<()> {
    validate_branch_name(branch_name)?;

    let base_commit_hash = get_commit_hash(repo_path, start_point).map_err(|e| {
        anyhow!("Start point '{start_point}' is not resolvable in the repository: {e}")
    })?;

    log::info!("Creating worktree from commit {base_commit_hash} ({start_point})");

    if let Some(parent) = worktree_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let repo = Repository::open(repo_path)?;

    // A leftover branch from an earlier failed attempt would block creation.
    if let Ok(mut branch) = repo.find_branch(branch_name, BranchType::Local) {
        log::info!("Deleting existing branch: {branch_name}");
        branch.delete()?;
    }

    let base_oid = git2::Oid::from_str(&base_commit_hash)?;
    let base_commit = repo.find_commit(base_oid)?;

    let new_branch = repo.branch(branch_name, &base_commit, false)?;
    let branch_ref = new_branch.into_reference();

    let mut opts = WorktreeAddOptions::new();
    opts.reference(Some(&branch_ref));

    repo.worktree(
        worktree_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(branch_name),
        worktree_path,
        Some(&opts),
    )?;

    log::info!(
        "Successfully created worktree at: {}",
        worktree_path.display()
    );
    Ok(())
}

pub fn remove_worktree(repo_path: &Path, worktree_path: &Path) -> Result<()> {
    let repo = Repository::open(repo_path)?;

    // Match by canonical path; macOS tends to hand out both /var and
    // /private/var spellings of the same location.
    let canonical_target_path = worktree_path
        .canonicalize()
        .unwrap_or_else(|_| worktree_path.to_path_buf());

    let worktrees = repo.worktrees()?;
    for wt_name in worktrees.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(wt_name) {
            let wt_path = wt.path();
            let canonical_wt_path = wt_path
                .canonicalize()
                .unwrap_or_else(|_| wt_path.to_path_buf());
            if canonical_wt_path == canonical_target_path || wt_path == worktree_path {
                // Removing the directory first invalidates the worktree, which
                // lets prune succeed.
                if worktree_path.exists()
                    && let Err(e) = std::fs::remove_dir_all(worktree_path)
                {
                    return Err(anyhow!("Failed to remove worktree directory: {e}"));
                }

                if let Err(e) = wt.prune(Some(&mut WorktreePruneOptions::new())) {
                    log::warn!("Failed to prune worktree from git registry: {e}");
                }
                return Ok(());
            }
        }
    }

    // Not registered as a worktree; fall back to removing a bare directory.
    if worktree_path.exists() {
        std::fs::remove_dir_all(worktree_path)?;
        Ok(())
    } else {
        Err(anyhow!("Worktree not found: {worktree_path:?}"))
    }
}

#[cfg(test)]
pub fn is_worktree_registered(repo_path: &Path, worktree_path: &Path) -> Result<bool> {
    let repo = Repository::open(repo_path)?;
    let worktrees = repo.worktrees()?;

    let canonical_worktree_path = worktree_path
        .canonicalize()
        .unwrap_or_else(|_| worktree_path.to_path_buf());

    for wt_name in worktrees.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(wt_name) {
            let wt_path = wt.path();
            let canonical_wt_path = wt_path
                .canonicalize()
                .unwrap_or_else(|_| wt_path.to_path_buf());

            if canonical_wt_path == canonical_worktree_path {
                return Ok(true);
            }
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::process::Command;
    use tempfile::TempDir;

    fn run_git(dir: &Path, args: &[&str]) {
        let out = Command::new("git")
            .args(args)
            .current_dir(dir)
            .output()
            .unwrap();
        assert!(
            out.status.success(),
            "git {args:?} failed: {}",
            String::from_utf8_lossy(&out.stderr)
        );
    }

    fn init_repo_with_commit() -> (TempDir, PathBuf) {
        let tmp = TempDir::new().unwrap();
        let repo_path = tmp.path().to_path_buf();
        run_git(&repo_path, &["init", "--initial-branch=main"]);
        run_git(&repo_path, &["config", "user.email", "test@example.com"]);
        run_git(&repo_path, &["config", "user.name", "Test User"]);
        std::fs::write(repo_path.join("README.md"), "Initial").unwrap();
        run_git(&repo_path, &["add", "."]);
        run_git(&repo_path, &["commit", "-m", "init"]);
        (tmp, repo_path)
    }

    #[test]
    fn create_and_remove_worktree_roundtrip() {
        let (tmp, repo_path) = init_repo_with_commit();
        let worktree_path = tmp.path().join("worktrees").join("ws-a");

        create_worktree(&repo_path, "workroom/ws-a", &worktree_path, "main").unwrap();
        assert!(worktree_path.join("README.md").exists());
        assert!(is_worktree_registered(&repo_path, &worktree_path).unwrap());

        remove_worktree(&repo_path, &worktree_path).unwrap();
        assert!(!worktree_path.exists());
        assert!(!is_worktree_registered(&repo_path, &worktree_path).unwrap());
    }

    #[test]
    fn create_worktree_from_tracking_ref() {
        let (tmp, repo_path) = init_repo_with_commit();

        let head = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        let head = String::from_utf8_lossy(&head.stdout).trim().to_string();
        run_git(&repo_path, &["update-ref", "refs/remotes/origin/main", &head]);

        let worktree_path = tmp.path().join("worktrees").join("ws-b");
        create_worktree(&repo_path, "workroom/ws-b", &worktree_path, "origin/main").unwrap();

        let wt_head = Command::new("git")
            .args(["rev-parse", "HEAD"])
            .current_dir(&worktree_path)
            .output()
            .unwrap();
        assert_eq!(String::from_utf8_lossy(&wt_head.stdout).trim(), head);
    }

    #[test]
    fn create_worktree_fails_for_missing_start_point() {
        let (tmp, repo_path) = init_repo_with_commit();
        let worktree_path = tmp.path().join("worktrees").join("ws-c");
        let result = create_worktree(&repo_path, "workroom/ws-c", &worktree_path, "nope");
        assert!(result.is_err());
        assert!(!worktree_path.exists());
    }

    #[test]
    fn create_worktree_replaces_stale_branch() {
        let (tmp, repo_path) = init_repo_with_commit();
        run_git(&repo_path, &["branch", "workroom/ws-d"]);

        let worktree_path = tmp.path().join("worktrees").join("ws-d");
        create_worktree(&repo_path, "workroom/ws-d", &worktree_path, "main").unwrap();
        assert!(worktree_path.exists());
    }

    #[test]
    fn remove_worktree_errors_when_nothing_exists() {
        let (tmp, repo_path) = init_repo_with_commit();
        let missing = tmp.path().join("worktrees").join("ghost");
        assert!(remove_worktree(&repo_path, &missing).is_err());
    }
}
