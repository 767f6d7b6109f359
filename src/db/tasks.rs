//! Task CRUD and dependency-edge operations.

use super::projects::project_exists_internal;
use super::{now_ms, parse_date, Database};
use crate::error::{EngineError, EngineResult};
use crate::types::{DependencyType, NewTask, ProjectId, Task, TaskDependency, TaskId};
use anyhow::Result;
use rusqlite::{params, Connection, Row};
use std::collections::{HashSet, VecDeque};

pub(crate) fn parse_task_row(row: &Row) -> rusqlite::Result<Task> {
    let start_date: Option<String> = row.get("start_date")?;
    let end_date: Option<String> = row.get("end_date")?;
    let is_milestone: i64 = row.get("is_milestone")?;

    Ok(Task {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        parent_task_id: row.get("parent_task_id")?,
        name: row.get("name")?,
        description: row.get("description")?,
        planned_duration_days: row.get("planned_duration_days")?,
        start_date: parse_date(start_date),
        end_date: parse_date(end_date),
        task_order: row.get("task_order")?,
        is_milestone: is_milestone != 0,
        budget_cents: row.get("budget_cents")?,
        created_at: row.get("created_at")?,
        updated_at: row.get("updated_at")?,
    })
}

pub(crate) fn parse_dependency_row(row: &Row) -> rusqlite::Result<TaskDependency> {
    let dep_type: String = row.get("dep_type")?;
    Ok(TaskDependency {
        id: row.get("id")?,
        project_id: row.get("project_id")?,
        task_id: row.get("task_id")?,
        depends_on_task_id: row.get("depends_on_task_id")?,
        dep_type: DependencyType::from_str(&dep_type).unwrap_or_default(),
        lag_days: row.get("lag_days")?,
    })
}

/// Internal helper to get a task using an existing connection.
pub(crate) fn get_task_internal(conn: &Connection, task_id: TaskId) -> Result<Option<Task>> {
    let mut stmt = conn.prepare("SELECT * FROM tasks WHERE id = ?1")?;

    match stmt.query_row(params![task_id], parse_task_row) {
        Ok(task) => Ok(Some(task)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Check whether making `task_id` depend on `depends_on` would close a
/// cycle: true when `depends_on` already reaches `task_id` through its
/// own predecessor edges.
fn would_create_cycle(conn: &Connection, task_id: TaskId, depends_on: TaskId) -> Result<bool> {
    let mut visited: HashSet<TaskId> = HashSet::new();
    let mut queue: VecDeque<TaskId> = VecDeque::new();
    queue.push_back(depends_on);

    while let Some(current) = queue.pop_front() {
        if current == task_id {
            return Ok(true);
        }

        if !visited.insert(current) {
            continue;
        }

        let mut stmt =
            conn.prepare("SELECT depends_on_task_id FROM task_dependencies WHERE task_id = ?1")?;

        let predecessors: Vec<TaskId> = stmt
            .query_map(params![current], |row| row.get(0))?
            .collect::<Result<Vec<_>, _>>()?;

        for predecessor in predecessors {
            if !visited.contains(&predecessor) {
                queue.push_back(predecessor);
            }
        }
    }

    Ok(false)
}

/// Fetch a task and require it to belong to the given project.
fn require_project_task(
    conn: &Connection,
    project_id: ProjectId,
    task_id: TaskId,
) -> Result<Task> {
    let task =
        get_task_internal(conn, task_id)?.ok_or_else(|| EngineError::task_not_found(task_id))?;
    if task.project_id != project_id {
        return Err(EngineError::cross_project(task_id, project_id).into());
    }
    Ok(task)
}

impl Database {
    /// Create a new task in a project.
    ///
    /// The parent, when given, must already exist in the same project.
    pub fn create_task(&self, project_id: ProjectId, input: &NewTask) -> EngineResult<Task> {
        let now = now_ms();
        let task = self.with_conn(|conn| {
            if !project_exists_internal(conn, project_id)? {
                return Err(EngineError::project_not_found(project_id).into());
            }

            if let Some(parent_id) = input.parent_task_id {
                require_project_task(conn, project_id, parent_id)?;
            }

            conn.execute(
                "INSERT INTO tasks (
                    project_id, parent_task_id, name, description,
                    planned_duration_days, start_date, end_date,
                    task_order, is_milestone, budget_cents, created_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                params![
                    project_id,
                    input.parent_task_id,
                    input.name,
                    input.description,
                    input.planned_duration_days,
                    input.start_date.map(|d| d.to_string()),
                    input.end_date.map(|d| d.to_string()),
                    input.task_order,
                    input.is_milestone as i64,
                    input.budget_cents,
                    now,
                    now,
                ],
            )?;

            Ok(Task {
                id: TaskId(conn.last_insert_rowid()),
                project_id,
                parent_task_id: input.parent_task_id,
                name: input.name.clone(),
                description: input.description.clone(),
                planned_duration_days: input.planned_duration_days,
                start_date: input.start_date,
                end_date: input.end_date,
                task_order: input.task_order,
                is_milestone: input.is_milestone,
                budget_cents: input.budget_cents,
                created_at: now,
                updated_at: now,
            })
        })?;
        Ok(task)
    }

    /// Get a task by id.
    pub fn get_task(&self, task_id: TaskId) -> EngineResult<Option<Task>> {
        let task = self.with_conn(|conn| get_task_internal(conn, task_id))?;
        Ok(task)
    }

    /// List a project's tasks, parents before the subtrees they root.
    pub fn list_tasks(&self, project_id: ProjectId) -> EngineResult<Vec<Task>> {
        let tasks = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM tasks WHERE project_id = ?1
                 ORDER BY (parent_task_id IS NOT NULL), task_order, id",
            )?;
            let tasks = stmt
                .query_map(params![project_id], parse_task_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tasks)
        })?;
        Ok(tasks)
    }

    /// Add a precedence edge: `task_id` (successor) depends on
    /// `depends_on_task_id` (predecessor).
    ///
    /// Both tasks must belong to `project_id`; an edge that would close
    /// a cycle is rejected. Re-adding an existing edge overwrites its
    /// type and lag.
    pub fn add_dependency(
        &self,
        project_id: ProjectId,
        task_id: TaskId,
        depends_on_task_id: TaskId,
        dep_type: DependencyType,
        lag_days: i64,
    ) -> EngineResult<TaskDependency> {
        let dependency = self.with_conn(|conn| {
            require_project_task(conn, project_id, task_id)?;
            require_project_task(conn, project_id, depends_on_task_id)?;

            if task_id == depends_on_task_id
                || would_create_cycle(conn, task_id, depends_on_task_id)?
            {
                return Err(EngineError::dependency_cycle(task_id, depends_on_task_id).into());
            }

            conn.execute(
                "INSERT INTO task_dependencies
                    (project_id, task_id, depends_on_task_id, dep_type, lag_days)
                 VALUES (?1, ?2, ?3, ?4, ?5)
                 ON CONFLICT (task_id, depends_on_task_id)
                 DO UPDATE SET dep_type = excluded.dep_type, lag_days = excluded.lag_days",
                params![
                    project_id,
                    task_id,
                    depends_on_task_id,
                    dep_type.as_str(),
                    lag_days
                ],
            )?;

            let mut stmt = conn.prepare(
                "SELECT * FROM task_dependencies WHERE task_id = ?1 AND depends_on_task_id = ?2",
            )?;
            let dependency = stmt.query_row(params![task_id, depends_on_task_id], parse_dependency_row)?;
            Ok(dependency)
        })?;
        Ok(dependency)
    }

    /// List a project's dependency edges.
    pub fn list_dependencies(&self, project_id: ProjectId) -> EngineResult<Vec<TaskDependency>> {
        let deps = self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT * FROM task_dependencies WHERE project_id = ?1 ORDER BY id",
            )?;
            let deps = stmt
                .query_map(params![project_id], parse_dependency_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(deps)
        })?;
        Ok(deps)
    }
}
