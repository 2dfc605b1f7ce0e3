use super::registry::InitRegistry;
use super::repository::WorkspaceDbManager;
use crate::domains::git::VcsClient;
use crate::infrastructure::database::Database;
use anyhow::{Context, Result};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct TeardownConfig {
    pub skip_branch_deletion: bool,
    /// How long to wait for an in-flight initialization to observe the
    /// cancellation request and exit before aborting the teardown.
    pub wait_timeout: Duration,
}

impl Default for TeardownConfig {
    fn default() -> Self {
        Self {
            skip_branch_deletion: false,
            wait_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone)]
pub struct TeardownResult {
    pub worktree_removed: bool,
    pub branch_deleted: bool,
    pub errors: Vec<String>,
}

/// Removes a workspace: worktree, branch, and persisted records. If the
/// workspace is still initializing, requests cancellation and waits for the
/// pipeline to reach a terminal state first; a wait timeout aborts the whole
/// teardown rather than racing a pipeline in an unknown state.
pub struct TeardownCoordinator {
    registry: Arc<InitRegistry>,
    vcs: Arc<dyn VcsClient>,
    db: WorkspaceDbManager,
}

impl TeardownCoordinator {
    pub fn new(registry: Arc<InitRegistry>, vcs: Arc<dyn VcsClient>, db: Database) -> Self {
        Self {
            registry,
            vcs,
            db: WorkspaceDbManager::new(db),
        }
    }

    pub async fn teardown(
        &self,
        workspace_id: &str,
        config: TeardownConfig,
    ) -> Result<TeardownResult> {
        let record = self.db.worktree(workspace_id)?;
        let project = self.db.project(&record.project_id)?;
        info!("Tearing down workspace '{}'", record.name);

        if self.registry.is_initializing(workspace_id) {
            info!(
                "Workspace '{}' is still initializing; requesting cancellation",
                record.name
            );
            self.registry.cancel(workspace_id);
            // Propagated as-is so callers can tell a timeout apart from a
            // git or database failure; see WorkspaceError::InitWaitTimeout.
            self.registry
                .wait_for_init(workspace_id, config.wait_timeout)
                .await?;
        }

        let _project_guard = self.registry.acquire_project_lock(&record.project_id).await;

        let mut result = TeardownResult {
            worktree_removed: false,
            branch_deleted: false,
            errors: Vec::new(),
        };

        if record.path.exists() {
            match self.vcs.remove_worktree(&project.repo_path, &record.path).await {
                Ok(()) => {
                    info!("Teardown {}: Removed worktree", record.name);
                    result.worktree_removed = true;
                }
                Err(e) => result.errors.push(format!("Worktree removal failed: {e}")),
            }
        } else {
            warn!(
                "Teardown {}: Worktree path missing, skipping removal: {}",
                record.name,
                record.path.display()
            );
        }

        if !config.skip_branch_deletion {
            // The branch counts as checked out while the worktree exists, so
            // deletion only runs after the removal above.
            match self.vcs.delete_branch(&project.repo_path, &record.branch).await {
                Ok(()) => result.branch_deleted = true,
                Err(e) => result.errors.push(format!("Branch deletion failed: {e}")),
            }
        }

        self.db
            .delete_worktree(workspace_id)
            .with_context(|| format!("Failed to delete worktree record '{workspace_id}'"))?;
        self.registry.clear_job(workspace_id);

        if result.errors.is_empty() {
            info!("Teardown {}: Successfully completed", record.name);
        } else {
            warn!(
                "Teardown {}: Completed with {} error(s)",
                record.name,
                result.errors.len()
            );
        }

        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domains::git::{LibGitClient, branches, worktrees};
    use crate::domains::workspaces::db_worktrees::WorktreeMethods;
    use crate::errors::WorkspaceError;
    use crate::domains::workspaces::entity::{InitStep, WorktreeRecord};
    use crate::infrastructure::database::{ProjectMethods, ProjectRecord};
    use chrono::Utc;
    use serial_test::serial;
    use std::path::{Path, PathBuf};
    use std::process::Command;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn setup_test_repo() -> (TempDir, PathBuf) {
        let temp_dir = TempDir::new().unwrap();
        let repo_path = temp_dir.path().to_path_buf();

        Command::new("git")
            .args(["init", "-b", "main"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.email", "test@example.com"])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["config", "user.name", "Test User"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        std::fs::write(repo_path.join("README.md"), "Initial").unwrap();
        Command::new("git")
            .args(["add", "."])
            .current_dir(&repo_path)
            .output()
            .unwrap();
        Command::new("git")
            .args(["commit", "-m", "init"])
            .current_dir(&repo_path)
            .output()
            .unwrap();

        (temp_dir, repo_path)
    }

    fn setup_coordinator(repo_path: &Path) -> (TeardownCoordinator, Database, Arc<InitRegistry>) {
        let db = Database::new(Some(repo_path.join("test.db"))).unwrap();
        let registry = Arc::new(InitRegistry::new());
        let coordinator = TeardownCoordinator::new(
            Arc::clone(&registry),
            Arc::new(LibGitClient::new()),
            db.clone(),
        );
        (coordinator, db, registry)
    }

    fn insert_workspace(db: &Database, repo_path: &Path, worktree_path: PathBuf) -> String {
        let now = Utc::now();
        let project = ProjectRecord {
            id: "proj-1".to_string(),
            name: "demo".to_string(),
            repo_path: repo_path.to_path_buf(),
            default_branch: Some("main".to_string()),
            created_at: now,
            updated_at: now,
        };
        if db.get_project("proj-1").unwrap().is_none() {
            db.create_project(&project).unwrap();
        }

        let id = Uuid::new_v4().to_string();
        db.create_worktree_record(&WorktreeRecord {
            id: id.clone(),
            project_id: "proj-1".to_string(),
            name: "test-workspace".to_string(),
            branch: "workroom/test-workspace".to_string(),
            base_branch: "main".to_string(),
            base_branch_auto_derived: true,
            path: worktree_path,
            init_status: InitStep::Ready,
            needs_rebase: false,
            ready_at: Some(now),
            created_at: now,
            updated_at: now,
        })
        .unwrap();
        id
    }

    #[tokio::test]
    #[serial]
    async fn teardown_removes_worktree_branch_and_record() {
        let (_temp_dir, repo_path) = setup_test_repo();
        let worktree_path = repo_path.join(".workroom/worktrees/test-workspace");
        worktrees::create_worktree(&repo_path, "workroom/test-workspace", &worktree_path, "main")
            .unwrap();

        let (coordinator, db, _registry) = setup_coordinator(&repo_path);
        let id = insert_workspace(&db, &repo_path, worktree_path.clone());

        let result = coordinator
            .teardown(&id, TeardownConfig::default())
            .await
            .unwrap();

        assert!(result.worktree_removed);
        assert!(result.branch_deleted);
        assert!(result.errors.is_empty());
        assert!(!worktree_path.exists());
        assert!(!branches::branch_exists(&repo_path, "workroom/test-workspace").unwrap());
        assert!(db.get_worktree_record(&id).unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn teardown_with_missing_worktree_still_deletes_record() {
        let (_temp_dir, repo_path) = setup_test_repo();
        let (coordinator, db, _registry) = setup_coordinator(&repo_path);
        let id = insert_workspace(
            &db,
            &repo_path,
            repo_path.join(".workroom/worktrees/nonexistent"),
        );

        let result = coordinator
            .teardown(&id, TeardownConfig::default())
            .await
            .unwrap();

        assert!(!result.worktree_removed);
        assert!(db.get_worktree_record(&id).unwrap().is_none());
    }

    #[tokio::test]
    #[serial]
    async fn teardown_can_skip_branch_deletion() {
        let (_temp_dir, repo_path) = setup_test_repo();
        let worktree_path = repo_path.join(".workroom/worktrees/test-workspace");
        worktrees::create_worktree(&repo_path, "workroom/test-workspace", &worktree_path, "main")
            .unwrap();

        let (coordinator, db, _registry) = setup_coordinator(&repo_path);
        let id = insert_workspace(&db, &repo_path, worktree_path);

        let result = coordinator
            .teardown(
                &id,
                TeardownConfig {
                    skip_branch_deletion: true,
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(!result.branch_deleted);
        assert!(branches::branch_exists(&repo_path, "workroom/test-workspace").unwrap());
    }

    #[tokio::test]
    #[serial]
    async fn teardown_aborts_when_init_never_finishes() {
        let (_temp_dir, repo_path) = setup_test_repo();
        let (coordinator, db, registry) = setup_coordinator(&repo_path);
        let id = insert_workspace(
            &db,
            &repo_path,
            repo_path.join(".workroom/worktrees/test-workspace"),
        );

        // A registered job that never finalizes models a stuck pipeline.
        registry.start_job(&id, "proj-1");

        let err = coordinator
            .teardown(
                &id,
                TeardownConfig {
                    wait_timeout: Duration::from_millis(10),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<WorkspaceError>(),
            Some(WorkspaceError::InitWaitTimeout { .. })
        ));
        // Nothing was deleted.
        assert!(db.get_worktree_record(&id).unwrap().is_some());
        assert!(registry.is_cancellation_requested(&id));
    }

    #[tokio::test]
    #[serial]
    async fn teardown_of_unknown_workspace_fails() {
        let (_temp_dir, repo_path) = setup_test_repo();
        let (coordinator, _db, _registry) = setup_coordinator(&repo_path);

        let err = coordinator
            .teardown("no-such-workspace", TeardownConfig::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
