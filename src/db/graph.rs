//! Graph reading: the full node list and precedence-edge set for one
//! owning entity, project or template.
//!
//! Rows come back parents-first (parent-null rows, then by ordering
//! key). The cloners do not rely on that (they are unconditionally
//! multi-pass), but it keeps generated records readable. The free
//! functions take a plain connection so the cloners can call them
//! inside an open transaction.

use super::projects::project_exists_internal;
use super::tasks::{parse_dependency_row, parse_task_row};
use super::templates::{parse_template_task_row, template_exists_internal};
use super::Database;
use crate::error::{EngineError, EngineResult};
use crate::types::{ProjectId, Task, TaskDependency, TemplateId, TemplateTask};
use anyhow::Result;
use rusqlite::{params, Connection};

/// Load a project's task forest and dependency edges.
///
/// Fails with `ProjectNotFound` if the project row is absent. A project
/// with zero tasks yields empty lists, not an error.
pub(crate) fn project_graph(
    conn: &Connection,
    project_id: ProjectId,
) -> Result<(Vec<Task>, Vec<TaskDependency>)> {
    if !project_exists_internal(conn, project_id)? {
        return Err(EngineError::project_not_found(project_id).into());
    }

    let mut stmt = conn.prepare(
        "SELECT * FROM tasks WHERE project_id = ?1
         ORDER BY (parent_task_id IS NOT NULL), task_order, id",
    )?;
    let tasks = stmt
        .query_map(params![project_id], parse_task_row)?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt =
        conn.prepare("SELECT * FROM task_dependencies WHERE project_id = ?1 ORDER BY id")?;
    let deps = stmt
        .query_map(params![project_id], parse_dependency_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((tasks, deps))
}

/// Load a template's task rows (nodes and their encoded edges are one
/// table on this side).
///
/// Fails with `TemplateNotFound` if the template row is absent. A
/// template with zero tasks yields an empty list, not an error.
pub(crate) fn template_graph(
    conn: &Connection,
    template_id: TemplateId,
) -> Result<Vec<TemplateTask>> {
    if !template_exists_internal(conn, template_id)? {
        return Err(EngineError::template_not_found(template_id).into());
    }

    let mut stmt = conn.prepare(
        "SELECT * FROM template_tasks WHERE template_id = ?1
         ORDER BY (parent_template_task_id IS NOT NULL), task_order, id",
    )?;
    let template_tasks = stmt
        .query_map(params![template_id], parse_template_task_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(template_tasks)
}

impl Database {
    /// Read a project's full task forest and dependency-edge set.
    pub fn project_graph(
        &self,
        project_id: ProjectId,
    ) -> EngineResult<(Vec<Task>, Vec<TaskDependency>)> {
        let graph = self.with_conn(|conn| project_graph(conn, project_id))?;
        Ok(graph)
    }

    /// Read a template's full task-row set.
    pub fn template_graph(&self, template_id: TemplateId) -> EngineResult<Vec<TemplateTask>> {
        let rows = self.with_conn(|conn| template_graph(conn, template_id))?;
        Ok(rows)
    }
}
