use anyhow::{Result, anyhow};
use git2::{BranchType, Repository};
use std::path::Path;

pub fn get_commit_hash(repo_path: &Path, reference: &str) -> Result<String> {
    let repo = Repository::open(repo_path)?;
    let obj = repo
        .revparse_single(reference)
        .map_err(|e| anyhow!("Cannot resolve reference '{reference}': {e}"))?;
    let commit = obj
        .peel_to_commit()
        .map_err(|e| anyhow!("Reference '{reference}' does not point to a commit: {e}"))?;
    Ok(commit.id().to_string())
}

pub fn get_current_branch(repo_path: &Path) -> Result<String> {
    let repo = Repository::open(repo_path)?;
    let head = repo.head()?;
    head.shorthand()
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow!("HEAD is not pointing at a named branch"))
}

/// Local notion of the default branch: prefer HEAD's branch, then `main`,
/// then `master`. The remote's view of the default branch is queried
/// separately and may override the cached value during provisioning.
pub fn get_default_branch(repo_path: &Path) -> Result<String> {
    if let Ok(current) = get_current_branch(repo_path) {
        return Ok(current);
    }

    let repo = Repository::open(repo_path)?;
    for candidate in ["main", "master"] {
        if repo.find_branch(candidate, BranchType::Local).is_ok() {
            return Ok(candidate.to_string());
        }
    }

    Err(anyhow!(
        "Repository at {} has no usable default branch",
        repo_path.display()
    ))
}

pub fn has_remote(repo_path: &Path) -> Result<bool> {
    let repo = Repository::open(repo_path)?;
    let remotes = repo.remotes()?;
    Ok(!remotes.is_empty())
}
