use crate::domains::git::{RemoteBranchStatus, VcsClient};
use anyhow::Result;
use log::{info, warn};
use std::path::Path;

/// Where a new worktree should be rooted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StartPoint {
    /// The remote confirmed the branch; base off its tracking ref after a
    /// fresh fetch.
    Remote(String),
    /// Remote absent or unreachable; base off what is locally available.
    Local(String),
    Unresolved(UnresolvedReason),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnresolvedReason {
    /// The remote answered and the branch is not there. Not retried with a
    /// local ref: an identically named local branch would be stale or
    /// unrelated, not what the user asked to base off.
    BranchMissingOnRemote { branch: String },
    NoRemoteNoLocalRef { branch: String },
    RemoteUnreachableNoLocalRef { branch: String, error: String },
}

impl UnresolvedReason {
    pub fn user_message(&self) -> String {
        match self {
            Self::BranchMissingOnRemote { branch } => {
                format!("Branch '{branch}' does not exist on the remote; choose a different base branch")
            }
            Self::NoRemoteNoLocalRef { branch } => {
                format!(
                    "No remote is configured and no local reference available for '{branch}'; \
                     create the branch locally or configure a remote"
                )
            }
            Self::RemoteUnreachableNoLocalRef { branch, error } => {
                format!(
                    "Remote unreachable ({error}) and no local reference available for '{branch}'"
                )
            }
        }
    }
}

/// Decide what a new worktree for `desired_branch` should be created from.
///
/// The ordering encodes the product's trust policy under degraded networks:
/// a confirmed remote answer (exists / not found) is authoritative, while a
/// failed remote check falls back to locally cached refs so intermittent
/// connectivity doesn't block workspace creation.
pub async fn resolve_start_point(
    vcs: &dyn VcsClient,
    repo: &Path,
    desired_branch: &str,
) -> Result<StartPoint> {
    if !vcs.has_remote(repo).await? {
        return resolve_local(vcs, repo, desired_branch, RemoteState::NoRemote).await;
    }

    match vcs.branch_exists_on_remote(repo, desired_branch).await {
        RemoteBranchStatus::Exists => {
            Ok(StartPoint::Remote(format!("origin/{desired_branch}")))
        }
        RemoteBranchStatus::NotFound => Ok(StartPoint::Unresolved(
            UnresolvedReason::BranchMissingOnRemote {
                branch: desired_branch.to_string(),
            },
        )),
        RemoteBranchStatus::Error(error) => {
            warn!(
                "Could not confirm '{desired_branch}' on the remote ({error}); falling back to local refs"
            );
            resolve_local(vcs, repo, desired_branch, RemoteState::Unreachable(error)).await
        }
    }
}

enum RemoteState {
    NoRemote,
    Unreachable(String),
}

async fn resolve_local(
    vcs: &dyn VcsClient,
    repo: &Path,
    desired_branch: &str,
    remote_state: RemoteState,
) -> Result<StartPoint> {
    // The tracking ref is preferred: it reflects the last known remote state.
    let tracking = format!("origin/{desired_branch}");
    if vcs.ref_exists_locally(repo, &tracking).await? {
        info!("Using local tracking reference '{tracking}' for base branch");
        return Ok(StartPoint::Local(tracking));
    }

    if vcs.ref_exists_locally(repo, desired_branch).await? {
        info!("Using local branch '{desired_branch}' as base");
        return Ok(StartPoint::Local(desired_branch.to_string()));
    }

    Ok(StartPoint::Unresolved(match remote_state {
        RemoteState::NoRemote => UnresolvedReason::NoRemoteNoLocalRef {
            branch: desired_branch.to_string(),
        },
        RemoteState::Unreachable(error) => UnresolvedReason::RemoteUnreachableNoLocalRef {
            branch: desired_branch.to_string(),
            error,
        },
    }))
}
