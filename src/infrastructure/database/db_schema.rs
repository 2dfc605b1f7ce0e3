use super::connection::Database;

pub fn initialize_schema(db: &Database) -> anyhow::Result<()> {
    let conn = db.get_conn()?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS projects (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            repo_path TEXT NOT NULL UNIQUE,
            default_branch TEXT,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS worktrees (
            id TEXT PRIMARY KEY,  -- workspace id
            project_id TEXT NOT NULL REFERENCES projects(id),
            name TEXT NOT NULL,
            branch TEXT NOT NULL,
            base_branch TEXT NOT NULL,
            base_branch_auto_derived BOOLEAN NOT NULL DEFAULT FALSE,
            path TEXT NOT NULL,
            init_status TEXT NOT NULL DEFAULT 'syncing',
            needs_rebase BOOLEAN NOT NULL DEFAULT FALSE,
            ready_at INTEGER,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL,
            UNIQUE(project_id, name)
        )",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_worktrees_project ON worktrees(project_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_worktrees_status ON worktrees(init_status)",
        [],
    )?;

    Ok(())
}
