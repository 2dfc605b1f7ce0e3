use super::config_copy::copy_local_config;
use super::entity::{InitStep, WorktreeRecord};
use super::registry::InitRegistry;
use super::repository::WorkspaceDbManager;
use super::resolver::{StartPoint, resolve_start_point};
use crate::domains::git::{VcsClient, branches, repository};
use crate::infrastructure::database::{Database, ProjectRecord};
use crate::infrastructure::telemetry::Telemetry;
use crate::shared::{format_branch_name, worktree_path_for};
use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use log::{info, warn};
use serde_json::json;
use std::sync::Arc;
use uuid::Uuid;

pub struct CreateWorkspaceParams {
    pub project_id: String,
    pub name: String,
    /// `None` derives the base from the project's cached default branch and
    /// marks the record auto-derived, which allows the pipeline to adopt the
    /// remote's current default later.
    pub base_branch: Option<String>,
}

/// Hook invoked right after the worktree is materialized, before the next
/// cancellation checkpoint. Exists so tests can inject a cancellation at
/// that exact boundary.
#[doc(hidden)]
pub type PostCreateHook = Arc<dyn Fn(&str) + Send + Sync>;

enum PipelineOutcome {
    Ready,
    Cancelled,
}

/// Fires the job's completion signal when dropped. Declared at the top of
/// the pipeline driver so the job reaches a terminal state however the run
/// exits, a panic inside a collaborator included; a job that never
/// finalizes would leave the workspace undeletable.
struct FinalizeOnDrop<'a> {
    registry: &'a InitRegistry,
    workspace_id: &'a str,
}

impl Drop for FinalizeOnDrop<'_> {
    fn drop(&mut self) {
        self.registry.finalize_job(self.workspace_id);
    }
}

/// Runs workspace provisioning as fire-and-forget background tasks. One
/// instance serves the whole process; per-project serialization comes from
/// the registry's locks, not from this type.
pub struct WorkspaceProvisioner {
    registry: Arc<InitRegistry>,
    vcs: Arc<dyn VcsClient>,
    db: WorkspaceDbManager,
    telemetry: Arc<dyn Telemetry>,
    post_create: Option<PostCreateHook>,
}

impl WorkspaceProvisioner {
    pub fn new(
        registry: Arc<InitRegistry>,
        vcs: Arc<dyn VcsClient>,
        db: Database,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            registry,
            vcs,
            db: WorkspaceDbManager::new(db),
            telemetry,
            post_create: None,
        }
    }

    #[doc(hidden)]
    pub fn with_post_create_hook(mut self, hook: PostCreateHook) -> Self {
        self.post_create = Some(hook);
        self
    }

    /// Fast path of a creation request: validate, persist the placeholder
    /// record, register the init job, spawn the pipeline, return. The caller
    /// observes everything after this point through the progress stream.
    pub fn begin_create(
        self: &Arc<Self>,
        params: CreateWorkspaceParams,
    ) -> Result<WorktreeRecord> {
        let project = self.db.project(&params.project_id)?;
        branches::validate_branch_name(&params.name)
            .with_context(|| format!("Invalid workspace name '{}'", params.name))?;

        let base_branch_auto_derived = params.base_branch.is_none();
        let base_branch = match params.base_branch {
            Some(branch) => branch,
            None => match project.default_branch.clone() {
                Some(branch) => branch,
                None => repository::get_default_branch(&project.repo_path)
                    .unwrap_or_else(|e| {
                        warn!("No cached default branch and none detectable locally: {e}");
                        "main".to_string()
                    }),
            },
        };

        let now = Utc::now();
        let record = WorktreeRecord {
            id: Uuid::new_v4().to_string(),
            project_id: project.id.clone(),
            name: params.name.clone(),
            branch: format_branch_name(&params.name),
            base_branch,
            base_branch_auto_derived,
            path: worktree_path_for(&project.repo_path, &params.name),
            init_status: InitStep::Syncing,
            needs_rebase: false,
            ready_at: None,
            created_at: now,
            updated_at: now,
        };

        self.db.insert_placeholder(&record)?;
        self.registry.start_job(&record.id, &project.id);

        let this = Arc::clone(self);
        let workspace_id = record.id.clone();
        tokio::spawn(async move {
            this.run(&workspace_id).await;
        });

        Ok(record)
    }

    /// Pipeline driver. Holds the project lock for the whole run so that the
    /// base-branch decision and the git mutations see a consistent project.
    /// However this exits, normal return, error, or unwind, the finalize
    /// guard fires the completion signal and the lock guard releases.
    async fn run(&self, workspace_id: &str) {
        let _finalize = FinalizeOnDrop {
            registry: self.registry.as_ref(),
            workspace_id,
        };

        let record = match self.db.worktree(workspace_id) {
            Ok(record) => record,
            Err(e) => {
                self.registry.update_progress(
                    workspace_id,
                    InitStep::Failed,
                    "Workspace initialization failed",
                    Some(e.to_string()),
                );
                return;
            }
        };

        let _project_guard = self.registry.acquire_project_lock(&record.project_id).await;

        match self.run_steps(&record).await {
            Ok(PipelineOutcome::Ready) => {}
            Ok(PipelineOutcome::Cancelled) => {
                info!("Workspace '{workspace_id}' initialization cancelled");
                self.rollback_if_needed(&record).await;
            }
            Err(e) => {
                self.rollback_if_needed(&record).await;
                if let Err(db_err) = self.db.update_init_status(workspace_id, InitStep::Failed) {
                    warn!("Failed to persist failed status for '{workspace_id}': {db_err}");
                }
                self.registry.update_progress(
                    workspace_id,
                    InitStep::Failed,
                    "Workspace initialization failed",
                    Some(e.to_string()),
                );
            }
        }
    }

    async fn run_steps(&self, record: &WorktreeRecord) -> Result<PipelineOutcome> {
        let ws = record.id.as_str();
        let project = self.db.project(&record.project_id)?;
        let repo = project.repo_path.as_path();

        // syncing
        if self.registry.is_cancellation_requested(ws) {
            return Ok(PipelineOutcome::Cancelled);
        }
        self.report(ws, InitStep::Syncing, "Syncing project metadata")?;
        let effective_base = self.sync_base_branch(&project, record).await?;

        // verifying
        if self.registry.is_cancellation_requested(ws) {
            return Ok(PipelineOutcome::Cancelled);
        }
        self.report(
            ws,
            InitStep::Verifying,
            &format!("Resolving base branch '{effective_base}'"),
        )?;
        let start_point = match resolve_start_point(self.vcs.as_ref(), repo, &effective_base)
            .await?
        {
            StartPoint::Remote(reference) => reference,
            StartPoint::Local(reference) => {
                self.registry.update_progress(
                    ws,
                    InitStep::Verifying,
                    &format!("Using local reference '{reference}', remote unavailable"),
                    None,
                );
                reference
            }
            StartPoint::Unresolved(reason) => return Err(anyhow!(reason.user_message())),
        };

        // fetching
        if self.registry.is_cancellation_requested(ws) {
            return Ok(PipelineOutcome::Cancelled);
        }
        self.report(
            ws,
            InitStep::Fetching,
            &format!("Fetching '{effective_base}' from origin"),
        )?;
        if self.vcs.has_remote(repo).await.unwrap_or(false)
            && let Err(e) = self.vcs.fetch_branch(repo, &effective_base).await
        {
            // Staleness-reducing optimization only; the resolver has already
            // confirmed the start point is usable.
            warn!("Fetch of '{effective_base}' failed, continuing with cached refs: {e}");
        }

        // creating_worktree
        if self.registry.is_cancellation_requested(ws) {
            return Ok(PipelineOutcome::Cancelled);
        }
        self.report(
            ws,
            InitStep::CreatingWorktree,
            &format!("Creating worktree at '{}'", record.path.display()),
        )?;
        self.vcs
            .create_worktree(repo, &record.branch, &record.path, &start_point)
            .await?;
        // Flag goes up before anything else so a cancellation or crash from
        // here on is known to require rollback.
        self.registry.mark_worktree_created(ws);
        if let Some(hook) = &self.post_create {
            hook(ws);
        }

        // copying_config
        if self.registry.is_cancellation_requested(ws) {
            return Ok(PipelineOutcome::Cancelled);
        }
        self.report(ws, InitStep::CopyingConfig, "Copying local configuration")?;
        copy_local_config(repo, &record.path);

        // finalizing
        if self.registry.is_cancellation_requested(ws) {
            return Ok(PipelineOutcome::Cancelled);
        }
        self.report(ws, InitStep::Finalizing, "Finalizing workspace")?;
        self.db.finalize_worktree(ws, &record.branch)?;
        self.telemetry.emit(
            "workspace_initialized",
            json!({
                "workspace_id": ws,
                "project_id": record.project_id,
                "base_branch": effective_base,
            }),
        );

        self.registry
            .update_progress(ws, InitStep::Ready, "Workspace ready", None);
        Ok(PipelineOutcome::Ready)
    }

    /// Best-effort refresh of the project's default branch from the remote,
    /// returning the effective base branch for this run. Auto-derived bases
    /// follow the remote's current default so retries after a failure
    /// self-correct instead of chasing a stale branch.
    async fn sync_base_branch(
        &self,
        project: &ProjectRecord,
        record: &WorktreeRecord,
    ) -> Result<String> {
        let mut effective_base = record.base_branch.clone();

        let Some(remote_default) = self.vcs.refresh_default_branch(&project.repo_path).await
        else {
            return Ok(effective_base);
        };

        if project.default_branch.as_deref() != Some(remote_default.as_str()) {
            info!(
                "Project '{}' default branch refreshed to '{remote_default}'",
                project.id
            );
            self.db
                .refresh_project_default_branch(&project.id, &remote_default)?;
        }

        if record.base_branch_auto_derived && effective_base != remote_default {
            info!(
                "Adopting remote default '{remote_default}' as base for workspace '{}' \
                 (was '{effective_base}')",
                record.id
            );
            self.db.adopt_base_branch(&record.id, &remote_default)?;
            effective_base = remote_default;
        }

        Ok(effective_base)
    }

    fn report(&self, workspace_id: &str, step: InitStep, message: &str) -> Result<()> {
        self.registry
            .update_progress(workspace_id, step, message, None);
        self.db.update_init_status(workspace_id, step)
    }

    /// Undo a partially materialized worktree. Best-effort on every branch:
    /// the job must still reach a terminal state even if cleanup fails.
    async fn rollback_if_needed(&self, record: &WorktreeRecord) {
        if !self.registry.was_worktree_created(&record.id) {
            return;
        }

        let repo = match self.db.project(&record.project_id) {
            Ok(project) => project.repo_path,
            Err(e) => {
                warn!(
                    "Cannot roll back worktree for '{}': project lookup failed: {e}",
                    record.id
                );
                return;
            }
        };

        info!(
            "Rolling back partially created worktree at '{}'",
            record.path.display()
        );
        if let Err(e) = self.vcs.remove_worktree(&repo, &record.path).await {
            warn!(
                "Failed to remove worktree at '{}' during rollback: {e}",
                record.path.display()
            );
        }
        if let Err(e) = self.vcs.delete_branch(&repo, &record.branch).await {
            warn!(
                "Failed to delete branch '{}' during rollback: {e}",
                record.branch
            );
        }
    }
}
