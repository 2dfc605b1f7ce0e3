use super::db_worktrees::WorktreeMethods;
use super::entity::{InitStep, WorktreeRecord};
use crate::infrastructure::database::{Database, ProjectMethods, ProjectRecord};
use anyhow::{Result, anyhow};

/// Database access for the workspaces domain; thin convenience over the
/// trait methods, turning missing rows into errors where callers require
/// the record to exist.
#[derive(Clone)]
pub struct WorkspaceDbManager {
    pub db: Database,
}

impl WorkspaceDbManager {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub fn project(&self, project_id: &str) -> Result<ProjectRecord> {
        self.db
            .get_project(project_id)?
            .ok_or_else(|| anyhow!("Project '{project_id}' not found"))
    }

    pub fn worktree(&self, workspace_id: &str) -> Result<WorktreeRecord> {
        self.db
            .get_worktree_record(workspace_id)?
            .ok_or_else(|| anyhow!("Worktree record for workspace '{workspace_id}' not found"))
    }

    pub fn insert_placeholder(&self, record: &WorktreeRecord) -> Result<()> {
        self.db.create_worktree_record(record)
    }

    pub fn adopt_base_branch(&self, workspace_id: &str, base_branch: &str) -> Result<()> {
        self.db.set_worktree_base_branch(workspace_id, base_branch)
    }

    pub fn update_init_status(&self, workspace_id: &str, status: InitStep) -> Result<()> {
        self.db.set_worktree_init_status(workspace_id, status)
    }

    pub fn refresh_project_default_branch(&self, project_id: &str, branch: &str) -> Result<()> {
        self.db.set_project_default_branch(project_id, branch)
    }

    pub fn finalize_worktree(&self, workspace_id: &str, branch: &str) -> Result<()> {
        self.db.mark_worktree_ready(workspace_id, branch)
    }

    pub fn delete_worktree(&self, workspace_id: &str) -> Result<()> {
        self.db.delete_worktree_record(workspace_id)
    }
}
