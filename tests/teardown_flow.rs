use chrono::Utc;
use serial_test::serial;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use workroom::domains::git::{LibGitClient, branches};
use workroom::domains::workspaces::WorktreeMethods;
use workroom::infrastructure::database::{Database, ProjectMethods, ProjectRecord};
use workroom::infrastructure::telemetry::LogTelemetry;
use workroom::{
    CreateWorkspaceParams, InitRegistry, TeardownConfig, TeardownCoordinator, WorkspaceProvisioner,
};

fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "git {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
}

fn setup_cloned_repo() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let origin = tmp.path().join("origin");
    std::fs::create_dir_all(&origin).unwrap();
    git(&origin, &["init", "-b", "main"]);
    git(&origin, &["config", "user.email", "test@example.com"]);
    git(&origin, &["config", "user.name", "Test User"]);
    std::fs::write(origin.join("README.md"), "Initial").unwrap();
    git(&origin, &["add", "."]);
    git(&origin, &["commit", "-m", "init"]);

    git(tmp.path(), &["clone", origin.to_str().unwrap(), "local"]);
    let local = tmp.path().join("local");
    git(&local, &["config", "user.email", "test@example.com"]);
    git(&local, &["config", "user.name", "Test User"]);
    (tmp, local)
}

struct Harness {
    provisioner: Arc<WorkspaceProvisioner>,
    teardown: TeardownCoordinator,
    registry: Arc<InitRegistry>,
    db: Database,
}

fn setup_harness(repo: &Path) -> Harness {
    let _ = env_logger::builder().is_test(true).try_init();
    let db = Database::new(Some(repo.join("test.db"))).unwrap();
    let now = Utc::now();
    db.create_project(&ProjectRecord {
        id: "proj-1".to_string(),
        name: "demo".to_string(),
        repo_path: repo.to_path_buf(),
        default_branch: Some("main".to_string()),
        created_at: now,
        updated_at: now,
    })
    .unwrap();

    let registry = Arc::new(InitRegistry::new());
    let vcs = Arc::new(LibGitClient::new());
    Harness {
        provisioner: Arc::new(WorkspaceProvisioner::new(
            Arc::clone(&registry),
            Arc::clone(&vcs) as Arc<dyn workroom::domains::git::VcsClient>,
            db.clone(),
            Arc::new(LogTelemetry),
        )),
        teardown: TeardownCoordinator::new(Arc::clone(&registry), vcs, db.clone()),
        registry,
        db,
    }
}

#[tokio::test]
#[serial]
async fn teardown_of_ready_workspace_removes_everything() {
    let (_tmp, repo) = setup_cloned_repo();
    let harness = setup_harness(&repo);

    let record = harness
        .provisioner
        .begin_create(CreateWorkspaceParams {
            project_id: "proj-1".to_string(),
            name: "short-lived".to_string(),
            base_branch: None,
        })
        .unwrap();
    harness
        .registry
        .wait_for_init(&record.id, Duration::from_secs(30))
        .await
        .unwrap();
    assert!(record.path.exists());

    let result = harness
        .teardown
        .teardown(&record.id, TeardownConfig::default())
        .await
        .unwrap();

    assert!(result.worktree_removed);
    assert!(result.branch_deleted);
    assert!(!record.path.exists());
    assert!(!branches::branch_exists(&repo, &record.branch).unwrap());
    assert!(harness.db.get_worktree_record(&record.id).unwrap().is_none());
    assert!(!harness.registry.is_initializing(&record.id));
}

#[tokio::test]
#[serial]
async fn teardown_during_initialization_cancels_then_removes() {
    let (_tmp, repo) = setup_cloned_repo();
    let harness = setup_harness(&repo);

    // On this single-threaded test runtime the pipeline task has not run
    // yet, so the workspace is still initializing when teardown starts; the
    // coordinator must cancel, wait for the terminal state, then clean up.
    let record = harness
        .provisioner
        .begin_create(CreateWorkspaceParams {
            project_id: "proj-1".to_string(),
            name: "torn-down-early".to_string(),
            base_branch: None,
        })
        .unwrap();
    assert!(harness.registry.is_initializing(&record.id));

    harness
        .teardown
        .teardown(&record.id, TeardownConfig::default())
        .await
        .unwrap();

    assert!(!record.path.exists());
    assert!(harness.db.get_worktree_record(&record.id).unwrap().is_none());
    assert!(!harness.registry.is_initializing(&record.id));
}
