use super::entity::{InitStep, WorktreeRecord};
use crate::infrastructure::database::Database;
use crate::infrastructure::database::timestamps::{
    utc_from_epoch_seconds_lossy, utc_from_epoch_seconds_lossy_opt,
};
use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{OptionalExtension, Row, params};
use std::path::PathBuf;

pub trait WorktreeMethods {
    fn create_worktree_record(&self, record: &WorktreeRecord) -> Result<()>;
    fn get_worktree_record(&self, workspace_id: &str) -> Result<Option<WorktreeRecord>>;
    fn list_worktree_records(&self, project_id: &str) -> Result<Vec<WorktreeRecord>>;
    fn set_worktree_base_branch(&self, workspace_id: &str, base_branch: &str) -> Result<()>;
    fn set_worktree_init_status(&self, workspace_id: &str, status: InitStep) -> Result<()>;
    /// Final status metadata written by the pipeline's `finalizing` step.
    fn mark_worktree_ready(&self, workspace_id: &str, branch: &str) -> Result<()>;
    fn delete_worktree_record(&self, workspace_id: &str) -> Result<()>;
}

fn row_to_record(row: &Row) -> rusqlite::Result<WorktreeRecord> {
    Ok(WorktreeRecord {
        id: row.get(0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        branch: row.get(3)?,
        base_branch: row.get(4)?,
        base_branch_auto_derived: row.get(5)?,
        path: PathBuf::from(row.get::<_, String>(6)?),
        init_status: InitStep::parse(&row.get::<_, String>(7)?).unwrap_or(InitStep::Failed),
        needs_rebase: row.get(8)?,
        ready_at: utc_from_epoch_seconds_lossy_opt(row.get(9)?),
        created_at: utc_from_epoch_seconds_lossy(row.get(10)?),
        updated_at: utc_from_epoch_seconds_lossy(row.get(11)?),
    })
}

const RECORD_COLUMNS: &str = "id, project_id, name, branch, base_branch, base_branch_auto_derived, \
     path, init_status, needs_rebase, ready_at, created_at, updated_at";

impl WorktreeMethods for Database {
    fn create_worktree_record(&self, record: &WorktreeRecord) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO worktrees (id, project_id, name, branch, base_branch,
                base_branch_auto_derived, path, init_status, needs_rebase, ready_at,
                created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                record.id,
                record.project_id,
                record.name,
                record.branch,
                record.base_branch,
                record.base_branch_auto_derived,
                record.path.to_string_lossy(),
                record.init_status.as_str(),
                record.needs_rebase,
                record.ready_at.map(|t| t.timestamp()),
                record.created_at.timestamp(),
                record.updated_at.timestamp(),
            ],
        )
        .with_context(|| format!("Failed to insert worktree record '{}'", record.id))?;
        Ok(())
    }

    fn get_worktree_record(&self, workspace_id: &str) -> Result<Option<WorktreeRecord>> {
        let conn = self.get_conn()?;
        conn.query_row(
            &format!("SELECT {RECORD_COLUMNS} FROM worktrees WHERE id = ?1"),
            params![workspace_id],
            row_to_record,
        )
        .optional()
        .with_context(|| format!("Failed to load worktree record '{workspace_id}'"))
    }

    fn list_worktree_records(&self, project_id: &str) -> Result<Vec<WorktreeRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM worktrees WHERE project_id = ?1 ORDER BY created_at"
        ))?;
        let rows = stmt.query_map(params![project_id], row_to_record)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    fn set_worktree_base_branch(&self, workspace_id: &str, base_branch: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE worktrees SET base_branch = ?1, updated_at = ?2 WHERE id = ?3",
            params![base_branch, Utc::now().timestamp(), workspace_id],
        )
        .with_context(|| format!("Failed to update base branch for worktree '{workspace_id}'"))?;
        Ok(())
    }

    fn set_worktree_init_status(&self, workspace_id: &str, status: InitStep) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE worktrees SET init_status = ?1, updated_at = ?2 WHERE id = ?3",
            params![status.as_str(), Utc::now().timestamp(), workspace_id],
        )
        .with_context(|| format!("Failed to update init status for worktree '{workspace_id}'"))?;
        Ok(())
    }

    fn mark_worktree_ready(&self, workspace_id: &str, branch: &str) -> Result<()> {
        let conn = self.get_conn()?;
        let now = Utc::now().timestamp();
        conn.execute(
            "UPDATE worktrees
             SET branch = ?1, init_status = 'ready', needs_rebase = FALSE,
                 ready_at = ?2, updated_at = ?2
             WHERE id = ?3",
            params![branch, now, workspace_id],
        )
        .with_context(|| format!("Failed to finalize worktree record '{workspace_id}'"))?;
        Ok(())
    }

    fn delete_worktree_record(&self, workspace_id: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "DELETE FROM worktrees WHERE id = ?1",
            params![workspace_id],
        )?;
        Ok(())
    }
}
