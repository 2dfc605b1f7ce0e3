use super::remote::RemoteBranchStatus;
use super::{branches, remote, repository, worktrees};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// The version-control operations the provisioning orchestrator consumes.
/// Production code uses [`LibGitClient`]; tests substitute fakes to script
/// remote outcomes without a network.
#[async_trait]
pub trait VcsClient: Send + Sync {
    async fn has_remote(&self, repo: &Path) -> Result<bool>;

    /// Three-way by contract: `Error` must stay distinguishable from
    /// `NotFound` so callers can fall back instead of failing.
    async fn branch_exists_on_remote(&self, repo: &Path, branch: &str) -> RemoteBranchStatus;

    /// Best-effort query of the remote's default branch; `None` when the
    /// remote is missing or unreachable.
    async fn refresh_default_branch(&self, repo: &Path) -> Option<String>;

    async fn fetch_branch(&self, repo: &Path, branch: &str) -> Result<()>;

    async fn ref_exists_locally(&self, repo: &Path, name: &str) -> Result<bool>;

    async fn create_worktree(
        &self,
        repo: &Path,
        new_branch: &str,
        dest: &Path,
        start_point: &str,
    ) -> Result<()>;

    async fn remove_worktree(&self, repo: &Path, path: &Path) -> Result<()>;

    async fn delete_branch(&self, repo: &Path, branch: &str) -> Result<()>;
}

/// git2-backed implementation. libgit2 calls are blocking, so every
/// operation is routed through `spawn_blocking`.
#[derive(Default)]
pub struct LibGitClient;

impl LibGitClient {
    pub fn new() -> Self {
        Self
    }
}

async fn run_blocking<T, F>(job: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| anyhow!("Task join error: {e}"))?
}

#[async_trait]
impl VcsClient for LibGitClient {
    async fn has_remote(&self, repo: &Path) -> Result<bool> {
        let repo = repo.to_path_buf();
        run_blocking(move || repository::has_remote(&repo)).await
    }

    async fn branch_exists_on_remote(&self, repo: &Path, branch: &str) -> RemoteBranchStatus {
        let repo = repo.to_path_buf();
        let branch = branch.to_string();
        match tokio::task::spawn_blocking(move || remote::branch_exists_on_remote(&repo, &branch))
            .await
        {
            Ok(status) => status,
            Err(e) => RemoteBranchStatus::Error(format!("Task join error: {e}")),
        }
    }

    async fn refresh_default_branch(&self, repo: &Path) -> Option<String> {
        let repo = repo.to_path_buf();
        tokio::task::spawn_blocking(move || remote::query_remote_default_branch(&repo))
            .await
            .ok()
            .flatten()
    }

    async fn fetch_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        let repo = repo.to_path_buf();
        let branch = branch.to_string();
        run_blocking(move || remote::fetch_branch(&repo, &branch)).await
    }

    async fn ref_exists_locally(&self, repo: &Path, name: &str) -> Result<bool> {
        let repo = repo.to_path_buf();
        let name = name.to_string();
        run_blocking(move || branches::ref_exists_locally(&repo, &name)).await
    }

    async fn create_worktree(
        &self,
        repo: &Path,
        new_branch: &str,
        dest: &Path,
        start_point: &str,
    ) -> Result<()> {
        let repo = repo.to_path_buf();
        let new_branch = new_branch.to_string();
        let dest: PathBuf = dest.to_path_buf();
        let start_point = start_point.to_string();
        run_blocking(move || worktrees::create_worktree(&repo, &new_branch, &dest, &start_point))
            .await
    }

    async fn remove_worktree(&self, repo: &Path, path: &Path) -> Result<()> {
        let repo = repo.to_path_buf();
        let path = path.to_path_buf();
        run_blocking(move || worktrees::remove_worktree(&repo, &path)).await
    }

    async fn delete_branch(&self, repo: &Path, branch: &str) -> Result<()> {
        let repo = repo.to_path_buf();
        let branch = branch.to_string();
        run_blocking(move || {
            if !branches::branch_exists(&repo, &branch)? {
                log::info!("Branch '{branch}' doesn't exist, skipping deletion");
                return Ok(());
            }
            branches::delete_branch(&repo, &branch)
        })
        .await
    }
}
