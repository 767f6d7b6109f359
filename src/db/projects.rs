//! Project CRUD.
//!
//! Projects themselves are created and managed by the surrounding
//! application; the engine only needs enough surface to own the task
//! forest and to give the reverse clone a target.

use super::{now_ms, parse_date, Database};
use crate::error::{EngineError, EngineResult};
use crate::types::{Project, ProjectId};
use anyhow::Result;
use chrono::NaiveDate;
use rusqlite::{params, Connection, Row};

pub(crate) fn parse_project_row(row: &Row) -> rusqlite::Result<Project> {
    let start_date: Option<String> = row.get("start_date")?;
    Ok(Project {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        start_date: parse_date(start_date),
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

/// Check project existence on an open connection, usable mid-transaction.
pub(crate) fn project_exists_internal(conn: &Connection, project_id: ProjectId) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM projects WHERE id = ?1",
        params![project_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

impl Database {
    /// Create a new project.
    pub fn create_project(
        &self,
        name: &str,
        description: Option<&str>,
        start_date: Option<NaiveDate>,
    ) -> EngineResult<Project> {
        let now = now_ms();
        let project = self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO projects (name, description, start_date, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    name,
                    description,
                    start_date.map(|d| d.to_string()),
                    now,
                    now
                ],
            )?;
            Ok(Project {
                id: ProjectId(conn.last_insert_rowid()),
                name: name.to_string(),
                description: description.map(String::from),
                start_date,
                created_at: now,
                updated_at: now,
            })
        })?;
        Ok(project)
    }

    /// Get a project by id.
    pub fn get_project(&self, project_id: ProjectId) -> EngineResult<Option<Project>> {
        let project = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM projects WHERE id = ?1")?;
            match stmt.query_row(params![project_id], parse_project_row) {
                Ok(project) => Ok(Some(project)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })?;
        Ok(project)
    }

    /// Check whether a project exists.
    pub fn project_exists(&self, project_id: ProjectId) -> EngineResult<bool> {
        let exists = self.with_conn(|conn| project_exists_internal(conn, project_id))?;
        Ok(exists)
    }

    /// List all projects, newest first.
    pub fn list_projects(&self) -> EngineResult<Vec<Project>> {
        let projects = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM projects ORDER BY created_at DESC, id DESC")?;
            let projects = stmt
                .query_map([], parse_project_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(projects)
        })?;
        Ok(projects)
    }

    /// Delete a project. Its tasks and dependency edges cascade away.
    pub fn delete_project(&self, project_id: ProjectId) -> EngineResult<()> {
        let deleted = self.with_conn(|conn| {
            let n = conn.execute("DELETE FROM projects WHERE id = ?1", params![project_id])?;
            Ok(n)
        })?;
        if deleted == 0 {
            return Err(EngineError::project_not_found(project_id));
        }
        Ok(())
    }
}
