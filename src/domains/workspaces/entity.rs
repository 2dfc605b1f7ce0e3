use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Pipeline steps in execution order, plus the two terminal states. The
/// step currently running doubles as the job's observable status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InitStep {
    Syncing,
    Verifying,
    Fetching,
    CreatingWorktree,
    CopyingConfig,
    Finalizing,
    Ready,
    Failed,
}

impl InitStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            InitStep::Syncing => "syncing",
            InitStep::Verifying => "verifying",
            InitStep::Fetching => "fetching",
            InitStep::CreatingWorktree => "creating_worktree",
            InitStep::CopyingConfig => "copying_config",
            InitStep::Finalizing => "finalizing",
            InitStep::Ready => "ready",
            InitStep::Failed => "failed",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "syncing" => Some(InitStep::Syncing),
            "verifying" => Some(InitStep::Verifying),
            "fetching" => Some(InitStep::Fetching),
            "creating_worktree" => Some(InitStep::CreatingWorktree),
            "copying_config" => Some(InitStep::CopyingConfig),
            "finalizing" => Some(InitStep::Finalizing),
            "ready" => Some(InitStep::Ready),
            "failed" => Some(InitStep::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, InitStep::Ready | InitStep::Failed)
    }
}

impl fmt::Display for InitStep {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One progress update as pushed to subscribers of a workspace's init job.
#[derive(Debug, Clone, Serialize)]
pub struct InitProgress {
    pub workspace_id: String,
    pub step: InitStep,
    pub message: String,
    pub error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WorktreeRecord {
    /// Workspace id; worktrees are one-to-one with workspaces.
    pub id: String,
    pub project_id: String,
    pub name: String,
    pub branch: String,
    pub base_branch: String,
    /// True when the base branch was derived from the project's default
    /// rather than chosen explicitly. Only auto-derived bases are adopted
    /// to the remote's current default during provisioning.
    pub base_branch_auto_derived: bool,
    pub path: PathBuf,
    pub init_status: InitStep,
    pub needs_rebase: bool,
    pub ready_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
