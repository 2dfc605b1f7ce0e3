use anyhow::{Result, anyhow};
use git2::{Direction, Repository};
use std::path::Path;

/// Outcome of asking the remote whether a branch exists. A network or auth
/// failure is deliberately kept apart from a confirmed "not found": the
/// resolver falls back to local refs on `Error` but treats `NotFound` as a
/// hard answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteBranchStatus {
    Exists,
    NotFound,
    Error(String),
}

pub fn branch_exists_on_remote(repo_path: &Path, branch: &str) -> RemoteBranchStatus {
    match query_remote_heads(repo_path, branch) {
        Ok(true) => RemoteBranchStatus::Exists,
        Ok(false) => RemoteBranchStatus::NotFound,
        Err(e) => RemoteBranchStatus::Error(e.to_string()),
    }
}

fn query_remote_heads(repo_path: &Path, branch: &str) -> Result<bool> {
    let repo = Repository::open(repo_path)?;
    let mut remote = repo
        .find_remote("origin")
        .map_err(|e| anyhow!("No 'origin' remote configured: {e}"))?;

    remote
        .connect(Direction::Fetch)
        .map_err(|e| anyhow!("Cannot reach remote: {}", e.message()))?;

    let wanted = format!("refs/heads/{branch}");
    let found = remote.list()?.iter().any(|head| head.name() == wanted);
    Ok(found)
}

/// Ask the remote for its current default branch (the branch HEAD points at
/// on the server). Returns `None` when the remote is missing or unreachable;
/// callers keep their previously cached value in that case.
pub fn query_remote_default_branch(repo_path: &Path) -> Option<String> {
    let repo = match Repository::open(repo_path) {
        Ok(repo) => repo,
        Err(e) => {
            log::debug!("Cannot open repository for default-branch query: {e}");
            return None;
        }
    };

    let mut remote = repo.find_remote("origin").ok()?;
    if let Err(e) = remote.connect(Direction::Fetch) {
        log::debug!("Remote unreachable while refreshing default branch: {}", e.message());
        return None;
    }

    match remote.default_branch() {
        Ok(buf) => buf
            .as_str()
            .and_then(|name| name.strip_prefix("refs/heads/"))
            .map(|name| name.to_string()),
        Err(e) => {
            log::debug!("Remote did not report a default branch: {}", e.message());
            None
        }
    }
}

/// Fetch a single branch into its remote-tracking ref. Callers treat this as
/// a staleness-reduction optimization; failures are theirs to swallow.
pub fn fetch_branch(repo_path: &Path, branch: &str) -> Result<()> {
    let repo = Repository::open(repo_path)?;
    let mut remote = repo
        .find_remote("origin")
        .map_err(|e| anyhow!("No 'origin' remote configured: {e}"))?;

    let refspec = format!("+refs/heads/{branch}:refs/remotes/origin/{branch}");
    remote
        .fetch(&[refspec.as_str()], None, None)
        .map_err(|e| anyhow!("Fetch of '{branch}' failed: {}", e.message()))?;

    log::info!("Fetched '{branch}' from origin");
    Ok(())
}
