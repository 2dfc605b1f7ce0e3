pub mod branches;
pub mod client;
pub mod remote;
pub mod repository;
pub mod worktrees;

pub use client::{LibGitClient, VcsClient};
pub use remote::RemoteBranchStatus;
