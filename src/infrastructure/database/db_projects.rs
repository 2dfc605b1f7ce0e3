use super::connection::Database;
use super::timestamps::utc_from_epoch_seconds_lossy;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub id: String,
    pub name: String,
    pub repo_path: PathBuf,
    /// Last known default branch of the project's remote; refreshed
    /// best-effort during provisioning.
    pub default_branch: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub trait ProjectMethods {
    fn create_project(&self, project: &ProjectRecord) -> Result<()>;
    fn get_project(&self, project_id: &str) -> Result<Option<ProjectRecord>>;
    fn set_project_default_branch(&self, project_id: &str, branch: &str) -> Result<()>;
    fn delete_project(&self, project_id: &str) -> Result<()>;
}

impl ProjectMethods for Database {
    fn create_project(&self, project: &ProjectRecord) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO projects (id, name, repo_path, default_branch, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                project.id,
                project.name,
                project.repo_path.to_string_lossy(),
                project.default_branch,
                project.created_at.timestamp(),
                project.updated_at.timestamp(),
            ],
        )
        .with_context(|| format!("Failed to insert project '{}'", project.id))?;
        Ok(())
    }

    fn get_project(&self, project_id: &str) -> Result<Option<ProjectRecord>> {
        let conn = self.get_conn()?;
        conn.query_row(
            "SELECT id, name, repo_path, default_branch, created_at, updated_at
             FROM projects WHERE id = ?1",
            params![project_id],
            |row| {
                Ok(ProjectRecord {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    repo_path: PathBuf::from(row.get::<_, String>(2)?),
                    default_branch: row.get(3)?,
                    created_at: utc_from_epoch_seconds_lossy(row.get(4)?),
                    updated_at: utc_from_epoch_seconds_lossy(row.get(5)?),
                })
            },
        )
        .optional()
        .with_context(|| format!("Failed to load project '{project_id}'"))
    }

    fn set_project_default_branch(&self, project_id: &str, branch: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE projects SET default_branch = ?1, updated_at = ?2 WHERE id = ?3",
            params![branch, Utc::now().timestamp(), project_id],
        )
        .with_context(|| format!("Failed to update default branch for project '{project_id}'"))?;
        Ok(())
    }

    fn delete_project(&self, project_id: &str) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_db() -> (TempDir, Database) {
        let tmp = TempDir::new().unwrap();
        let db = Database::new(Some(tmp.path().join("test.db"))).unwrap();
        (tmp, db)
    }

    fn sample_project() -> ProjectRecord {
        let now = Utc::now();
        ProjectRecord {
            id: "proj-1".to_string(),
            name: "demo".to_string(),
            repo_path: PathBuf::from("/tmp/demo"),
            default_branch: Some("main".to_string()),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn create_and_get_project() {
        let (_tmp, db) = test_db();
        db.create_project(&sample_project()).unwrap();

        let loaded = db.get_project("proj-1").unwrap().unwrap();
        assert_eq!(loaded.name, "demo");
        assert_eq!(loaded.default_branch.as_deref(), Some("main"));
    }

    #[test]
    fn missing_project_is_none() {
        let (_tmp, db) = test_db();
        assert!(db.get_project("ghost").unwrap().is_none());
    }

    #[test]
    fn default_branch_update_persists() {
        let (_tmp, db) = test_db();
        db.create_project(&sample_project()).unwrap();
        db.set_project_default_branch("proj-1", "trunk").unwrap();

        let loaded = db.get_project("proj-1").unwrap().unwrap();
        assert_eq!(loaded.default_branch.as_deref(), Some("trunk"));
    }
}
