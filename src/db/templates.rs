//! Template CRUD.
//!
//! Templates are created either by the forward cloner or directly by an
//! administrator (system templates start empty; tasks are added later).
//! Name scoping is enforced by the store's unique indexes, so a
//! concurrent check-then-insert race cannot slip a duplicate through;
//! this module only translates the constraint violation.

use super::{now_ms, Database};
use crate::error::{EngineError, EngineResult};
use crate::types::{DependencyType, ProjectId, ProjectTemplate, TemplateId, TemplateTask, UserId};
use anyhow::Result;
use rusqlite::{params, Connection, Row};

pub(crate) fn parse_template_row(row: &Row) -> rusqlite::Result<ProjectTemplate> {
    let is_system: i64 = row.get("is_system")?;
    Ok(ProjectTemplate {
        id: row.get("id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        owner_user_id: row.get("owner_user_id")?,
        is_system: is_system != 0,
        source_project_id: row.get("source_project_id")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_template_task_row(row: &Row) -> rusqlite::Result<TemplateTask> {
    let is_milestone: i64 = row.get("is_milestone")?;
    let dep_type: Option<String> = row.get("dep_type")?;
    Ok(TemplateTask {
        id: row.get("id")?,
        template_id: row.get("template_id")?,
        original_task_id: row.get("original_task_id")?,
        parent_template_task_id: row.get("parent_template_task_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        planned_duration_days: row.get("planned_duration_days")?,
        task_order: row.get("task_order")?,
        is_milestone: is_milestone != 0,
        depends_on_original_id: row.get("depends_on_original_id")?,
        dep_type: dep_type.as_deref().and_then(DependencyType::from_str),
        dep_lag_days: row.get("dep_lag_days")?,
    })
}

/// Check template existence on an open connection, usable mid-transaction.
pub(crate) fn template_exists_internal(conn: &Connection, template_id: TemplateId) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM project_templates WHERE id = ?1",
        params![template_id],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

/// Insert a template row, translating the unique-index violation into
/// `DuplicateName`. Runs on the caller's connection so the forward
/// cloner can use it mid-transaction.
pub(crate) fn insert_template(
    conn: &Connection,
    name: &str,
    description: Option<&str>,
    owner_user_id: Option<UserId>,
    is_system: bool,
    source_project_id: Option<ProjectId>,
) -> Result<TemplateId> {
    let now = now_ms();
    let inserted = conn.execute(
        "INSERT INTO project_templates
            (name, description, owner_user_id, is_system, source_project_id, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            name,
            description,
            owner_user_id,
            is_system as i64,
            source_project_id,
            now,
            now,
        ],
    );

    match inserted {
        Ok(_) => Ok(TemplateId(conn.last_insert_rowid())),
        Err(rusqlite::Error::SqliteFailure(e, _))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Err(EngineError::duplicate_name(name).into())
        }
        Err(e) => Err(e.into()),
    }
}

impl Database {
    /// Create a template directly (administrator path). The template
    /// starts with no tasks; a task-less template is valid.
    pub fn create_template(
        &self,
        name: &str,
        description: Option<&str>,
        owner_user_id: Option<UserId>,
        is_system: bool,
    ) -> EngineResult<ProjectTemplate> {
        let template = self.with_conn(|conn| {
            let id = insert_template(conn, name, description, owner_user_id, is_system, None)?;
            let mut stmt = conn.prepare("SELECT * FROM project_templates WHERE id = ?1")?;
            let template = stmt.query_row(params![id], parse_template_row)?;
            Ok(template)
        })?;
        Ok(template)
    }

    /// Get a template by id.
    pub fn get_template(&self, template_id: TemplateId) -> EngineResult<Option<ProjectTemplate>> {
        let template = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT * FROM project_templates WHERE id = ?1")?;
            match stmt.query_row(params![template_id], parse_template_row) {
                Ok(template) => Ok(Some(template)),
                Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                Err(e) => Err(e.into()),
            }
        })?;
        Ok(template)
    }

    /// List the templates visible to a user: their own plus system
    /// templates, sorted by name. With no user, only system templates.
    pub fn list_templates(&self, owner: Option<UserId>) -> EngineResult<Vec<ProjectTemplate>> {
        let templates = self.with_conn(|conn| {
            let templates = match owner {
                Some(user_id) => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM project_templates
                         WHERE is_system = 1 OR owner_user_id = ?1
                         ORDER BY name, id",
                    )?;
                    let rows = stmt.query_map(params![user_id], parse_template_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
                None => {
                    let mut stmt = conn.prepare(
                        "SELECT * FROM project_templates WHERE is_system = 1 ORDER BY name, id",
                    )?;
                    let rows = stmt.query_map([], parse_template_row)?
                        .collect::<Result<Vec<_>, _>>()?;
                    rows
                }
            };
            Ok(templates)
        })?;
        Ok(templates)
    }

    /// Delete a template. Its template tasks cascade away.
    pub fn delete_template(&self, template_id: TemplateId) -> EngineResult<()> {
        let deleted = self.with_conn(|conn| {
            let n = conn.execute(
                "DELETE FROM project_templates WHERE id = ?1",
                params![template_id],
            )?;
            Ok(n)
        })?;
        if deleted == 0 {
            return Err(EngineError::template_not_found(template_id));
        }
        Ok(())
    }
}
