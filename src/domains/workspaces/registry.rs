use super::entity::{InitProgress, InitStep};
use crate::errors::WorkspaceError;
use crate::infrastructure::events::EventBus;
use dashmap::DashMap;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, broadcast, watch};

#[derive(Debug, Clone)]
struct JobStatus {
    step: InitStep,
    message: String,
    error: Option<String>,
}

/// One in-flight (or just-finished) workspace initialization. Status fields
/// have a single writer by construction (the pipeline task that owns the
/// job), while cancellation and queries arrive from other tasks.
pub struct InitJob {
    pub workspace_id: String,
    pub project_id: String,
    status: StdMutex<JobStatus>,
    cancellation_requested: AtomicBool,
    worktree_created: AtomicBool,
    /// Completion signal; flips to true exactly once, observable by any
    /// number of waiters, including ones that subscribe after the fact.
    done: watch::Sender<bool>,
}

impl InitJob {
    fn new(workspace_id: &str, project_id: &str) -> Self {
        let (done, _) = watch::channel(false);
        Self {
            workspace_id: workspace_id.to_string(),
            project_id: project_id.to_string(),
            status: StdMutex::new(JobStatus {
                step: InitStep::Syncing,
                message: "Preparing workspace".to_string(),
                error: None,
            }),
            cancellation_requested: AtomicBool::new(false),
            worktree_created: AtomicBool::new(false),
            done,
        }
    }
}

/// Owns every init job and one mutex per project. Constructed once at
/// startup and handed to callers by reference; there is no global instance.
pub struct InitRegistry {
    jobs: DashMap<String, Arc<InitJob>>,
    project_locks: DashMap<String, Arc<AsyncMutex<()>>>,
    progress: EventBus<InitProgress>,
}

impl InitRegistry {
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            project_locks: DashMap::new(),
            progress: EventBus::new(),
        }
    }

    pub fn start_job(&self, workspace_id: &str, project_id: &str) {
        info!("Registering init job for workspace '{workspace_id}' (project '{project_id}')");
        self.jobs.insert(
            workspace_id.to_string(),
            Arc::new(InitJob::new(workspace_id, project_id)),
        );
    }

    /// Sole mutator of a job's status; only the pipeline owning the job may
    /// call this. Tolerates the job having been cleared already.
    pub fn update_progress(
        &self,
        workspace_id: &str,
        step: InitStep,
        message: &str,
        error: Option<String>,
    ) {
        let Some(job) = self.jobs.get(workspace_id).map(|j| Arc::clone(&j)) else {
            debug!("Progress update for unknown workspace '{workspace_id}' ignored");
            return;
        };

        match &error {
            Some(err) => warn!("Workspace '{workspace_id}' [{step}]: {message} ({err})"),
            None => info!("Workspace '{workspace_id}' [{step}]: {message}"),
        }

        {
            let mut status = job.status.lock().unwrap();
            *status = JobStatus {
                step,
                message: message.to_string(),
                error: error.clone(),
            };
        }

        self.progress.publish(
            workspace_id,
            InitProgress {
                workspace_id: workspace_id.to_string(),
                step,
                message: message.to_string(),
                error,
            },
        );
    }

    pub fn subscribe_progress(&self, workspace_id: &str) -> broadcast::Receiver<InitProgress> {
        self.progress.subscribe(workspace_id)
    }

    pub fn current_step(&self, workspace_id: &str) -> Option<InitStep> {
        self.jobs
            .get(workspace_id)
            .map(|job| job.status.lock().unwrap().step)
    }

    /// Snapshot of the job's latest progress, for callers that attach after
    /// events were already published on the stream.
    pub fn current_progress(&self, workspace_id: &str) -> Option<InitProgress> {
        self.jobs.get(workspace_id).map(|job| {
            let status = job.status.lock().unwrap();
            InitProgress {
                workspace_id: job.workspace_id.clone(),
                step: status.step,
                message: status.message.clone(),
                error: status.error.clone(),
            }
        })
    }

    pub fn is_cancellation_requested(&self, workspace_id: &str) -> bool {
        self.jobs
            .get(workspace_id)
            .map(|job| job.cancellation_requested.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Request cooperative cancellation. Sets a durable flag the pipeline
    /// reads at its step boundaries; nothing is interrupted mid-step.
    pub fn cancel(&self, workspace_id: &str) {
        if let Some(job) = self.jobs.get(workspace_id) {
            info!("Cancellation requested for workspace '{workspace_id}'");
            job.cancellation_requested.store(true, Ordering::Release);
        }
    }

    pub fn mark_worktree_created(&self, workspace_id: &str) {
        if let Some(job) = self.jobs.get(workspace_id) {
            job.worktree_created.store(true, Ordering::Release);
        }
    }

    pub fn was_worktree_created(&self, workspace_id: &str) -> bool {
        self.jobs
            .get(workspace_id)
            .map(|job| job.worktree_created.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// Mark the job terminal and fire the completion signal. Idempotent, but
    /// the pipeline calls it exactly once, on every exit path.
    pub fn finalize_job(&self, workspace_id: &str) {
        if let Some(job) = self.jobs.get(workspace_id) {
            debug!("Finalizing init job for workspace '{workspace_id}'");
            job.done.send_replace(true);
        }
    }

    /// Block until the workspace's init job reaches a terminal state. A job
    /// that was never registered (or already cleared) counts as finished.
    pub async fn wait_for_init(
        &self,
        workspace_id: &str,
        timeout: Duration,
    ) -> Result<(), WorkspaceError> {
        let Some(job) = self.jobs.get(workspace_id).map(|j| Arc::clone(&j)) else {
            return Ok(());
        };

        let mut rx = job.done.subscribe();
        match tokio::time::timeout(timeout, rx.wait_for(|done| *done)).await {
            Ok(Ok(_)) => Ok(()),
            // Sender dropped: the job was cleared, which implies terminal.
            Ok(Err(_)) => Ok(()),
            Err(_) => Err(WorkspaceError::InitWaitTimeout {
                workspace_id: workspace_id.to_string(),
                waited_ms: timeout.as_millis() as u64,
            }),
        }
    }

    /// Per-project mutual exclusion. The guard is owned so the pipeline can
    /// hold it across await points; release happens on drop, which keeps
    /// acquire/release correctly paired on every exit path.
    pub async fn acquire_project_lock(&self, project_id: &str) -> OwnedMutexGuard<()> {
        let lock = self
            .project_locks
            .entry(project_id.to_string())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    pub fn is_initializing(&self, workspace_id: &str) -> bool {
        self.jobs
            .get(workspace_id)
            .map(|job| !*job.done.borrow())
            .unwrap_or(false)
    }

    /// Drop the job record once nothing needs to observe it anymore. Caller
    /// contract: never before `finalize_job`.
    pub fn clear_job(&self, workspace_id: &str) {
        if let Some((_, job)) = self.jobs.remove(workspace_id) {
            if !*job.done.borrow() {
                warn!("Cleared init job for workspace '{workspace_id}' before it was finalized");
            }
        }
        self.progress.remove(workspace_id);
    }
}

impl Default for InitRegistry {
    fn default() -> Self {
        Self::new()
    }
}
