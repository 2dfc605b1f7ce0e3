use std::path::{Path, PathBuf};

pub const BRANCH_PREFIX: &str = "workroom";

/// Directory (relative to the source repository) that holds Workroom state,
/// including the worktrees themselves. Kept out of version control via the
/// repository's ignore rules.
pub const WORKROOM_DIR: &str = ".workroom";

pub fn format_branch_name(workspace_name: &str) -> String {
    format!("{BRANCH_PREFIX}/{workspace_name}")
}

pub fn worktree_path_for(repo_path: &Path, workspace_name: &str) -> PathBuf {
    repo_path
        .join(WORKROOM_DIR)
        .join("worktrees")
        .join(workspace_name)
}
