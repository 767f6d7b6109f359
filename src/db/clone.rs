//! The two clone directions.
//!
//! Forward: capture a project's task forest and dependency edges as a
//! template. Reverse: instantiate a template into a target project.
//! Each direction is one SQLite transaction around strictly sequential
//! passes: materialize nodes, fix up parent pointers, then encode the
//! precedence edges. Pass 2 and 3 need the identities pass
//! 1 generated, so the passes never overlap; dropping the transaction
//! on an early error return rolls the whole operation back.

use super::projects::project_exists_internal;
use super::templates::insert_template;
use super::{graph, now_ms, Database};
use crate::error::{EngineError, EngineResult, ErrorCode};
use crate::identity::IdentityMap;
use crate::types::{ProjectId, Task, TaskId, TemplateId, TemplateTaskId, UserId};
use rusqlite::params;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Counters describing one template instantiation.
///
/// `dangling_parents` and `dangling_dependencies` count fix-ups that
/// were skipped because a `parent_template_task_id` or
/// `depends_on_original_id` resolved to nothing in the same template
/// (possible only in hand-edited templates). Each skip is also logged
/// as a warning; neither fails the operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateOutcome {
    pub tasks_created: usize,
    pub dependencies_created: usize,
    pub dangling_parents: usize,
    pub dangling_dependencies: usize,
}

/// Duration carried onto a template row: the task's planned duration
/// when set, otherwise the non-negative span of its dates.
fn template_duration(task: &Task) -> Option<i64> {
    task.planned_duration_days
        .or_else(|| match (task.start_date, task.end_date) {
            (Some(start), Some(end)) => {
                let days = (end - start).num_days();
                (days >= 0).then_some(days)
            }
            _ => None,
        })
}

impl Database {
    /// Save a project's task structure as a new template.
    ///
    /// Creates one template row plus one template task per source task.
    /// Every template task records the id of the task it was cloned
    /// from; dependency edges are encoded on the successor's row with
    /// the predecessor's id left in the source numbering space, so a
    /// later instantiation resolves parents and predecessors through
    /// one mapping pass without the source project needing to still
    /// exist.
    ///
    /// A project with zero tasks produces a valid, empty template. With
    /// `owner` set this is a user template (name unique per owner);
    /// without, a system template (name unique globally).
    pub fn save_project_as_template(
        &self,
        project_id: ProjectId,
        name: &str,
        description: Option<&str>,
        owner: Option<UserId>,
    ) -> EngineResult<TemplateId> {
        let template_id = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !project_exists_internal(&tx, project_id)? {
                return Err(EngineError::project_not_found(project_id).into());
            }

            let is_system = owner.is_none();
            let template_id =
                insert_template(&tx, name, description, owner, is_system, Some(project_id))?;

            let (tasks, deps) = graph::project_graph(&tx, project_id)?;

            if tasks.is_empty() {
                tx.commit()?;
                info!(%project_id, %template_id, "saved empty project as template");
                return Ok(template_id);
            }

            // Pass 1: materialize one template task per source task,
            // parent pointers deferred.
            let mut ids: IdentityMap<TemplateTaskId> = IdentityMap::with_capacity(tasks.len());
            for task in &tasks {
                tx.execute(
                    "INSERT INTO template_tasks (
                        template_id, original_task_id, parent_template_task_id,
                        name, description, planned_duration_days, task_order, is_milestone
                    ) VALUES (?1, ?2, NULL, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        template_id,
                        task.id,
                        task.name,
                        task.description,
                        template_duration(task),
                        task.task_order,
                        task.is_milestone as i64,
                    ],
                )?;
                ids.record_source(task.id, TemplateTaskId(tx.last_insert_rowid()));
            }
            debug!(%template_id, rows = ids.len(), "pass 1: template tasks materialized");

            // Pass 2: rewrite parent pointers into the template's id space.
            for task in &tasks {
                let Some(parent_id) = task.parent_task_id else {
                    continue;
                };
                match (ids.source(task.id), ids.source(parent_id)) {
                    (Some(row), Some(parent_row)) => {
                        tx.execute(
                            "UPDATE template_tasks SET parent_template_task_id = ?1 WHERE id = ?2",
                            params![parent_row, row],
                        )?;
                    }
                    (Some(_), None) => {
                        warn!(
                            code = ?ErrorCode::DanglingReference,
                            task_id = %task.id,
                            parent_id = %parent_id,
                            "parent outside the source task set; template task left as root"
                        );
                    }
                    _ => {}
                }
            }
            debug!(%template_id, "pass 2: parent pointers rewritten");

            // Pass 3: encode each edge on its successor's row. The
            // predecessor id stays untranslated: it is the stable key
            // instantiation later resolves against original_task_id.
            for dep in &deps {
                match ids.source(dep.task_id) {
                    Some(row) => {
                        tx.execute(
                            "UPDATE template_tasks
                             SET depends_on_original_id = ?1, dep_type = ?2, dep_lag_days = ?3
                             WHERE id = ?4",
                            params![
                                dep.depends_on_task_id,
                                dep.dep_type.as_str(),
                                dep.lag_days,
                                row
                            ],
                        )?;
                    }
                    None => {
                        warn!(
                            code = ?ErrorCode::DanglingReference,
                            task_id = %dep.task_id,
                            "dependency successor outside the source task set; edge skipped"
                        );
                    }
                }
            }
            debug!(%template_id, edges = deps.len(), "pass 3: dependency edges encoded");

            tx.commit()?;
            info!(
                %project_id,
                %template_id,
                tasks = tasks.len(),
                edges = deps.len(),
                "saved project as template"
            );
            Ok(template_id)
        })?;
        Ok(template_id)
    }

    /// Instantiate a template into an existing target project.
    ///
    /// The target project is expected to have been created by the
    /// caller (with its own start date); this creates the task forest
    /// and dependency edges only. Dates on the new tasks are left
    /// unset; scheduling from planned durations is a downstream
    /// concern.
    pub fn instantiate_template(
        &self,
        template_id: TemplateId,
        target_project_id: ProjectId,
    ) -> EngineResult<InstantiateOutcome> {
        let outcome = self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            if !project_exists_internal(&tx, target_project_id)? {
                return Err(EngineError::project_not_found(target_project_id).into());
            }

            let template_tasks = graph::template_graph(&tx, template_id)?;

            if template_tasks.is_empty() {
                tx.commit()?;
                info!(%template_id, %target_project_id, "instantiated empty template");
                return Ok(InstantiateOutcome::default());
            }

            let now = now_ms();

            // Pass 1: materialize one task per template task. The map is
            // filled under both key shapes: the historical source-task id
            // (what depends_on_original_id references) and the template
            // task's own id (what parent_template_task_id references).
            let mut ids: IdentityMap<TaskId> = IdentityMap::with_capacity(template_tasks.len());
            for tt in &template_tasks {
                tx.execute(
                    "INSERT INTO tasks (
                        project_id, parent_task_id, name, description,
                        planned_duration_days, start_date, end_date,
                        task_order, is_milestone, budget_cents, created_at, updated_at
                    ) VALUES (?1, NULL, ?2, ?3, ?4, NULL, NULL, ?5, ?6, NULL, ?7, ?7)",
                    params![
                        target_project_id,
                        tt.name,
                        tt.description,
                        tt.planned_duration_days,
                        tt.task_order,
                        tt.is_milestone as i64,
                        now,
                    ],
                )?;
                let new_id = TaskId(tx.last_insert_rowid());
                ids.record_source(tt.original_task_id, new_id);
                ids.record_template(tt.id, new_id);
            }
            debug!(%target_project_id, rows = ids.len(), "pass 1: tasks materialized");

            // Pass 2: rewrite parent pointers into the new project's id
            // space, via the template-local key shape.
            let mut dangling_parents = 0usize;
            for tt in &template_tasks {
                let Some(parent_template_id) = tt.parent_template_task_id else {
                    continue;
                };
                match (ids.template(tt.id), ids.template(parent_template_id)) {
                    (Some(new_task), Some(new_parent)) => {
                        tx.execute(
                            "UPDATE tasks SET parent_task_id = ?1 WHERE id = ?2",
                            params![new_parent, new_task],
                        )?;
                    }
                    (Some(new_task), None) => {
                        warn!(
                            code = ?ErrorCode::DanglingReference,
                            template_task_id = %tt.id,
                            new_task_id = %new_task,
                            "parent template task not in this template; task left as root"
                        );
                        dangling_parents += 1;
                    }
                    _ => {}
                }
            }
            debug!(%target_project_id, dangling_parents, "pass 2: parent pointers rewritten");

            // Pass 3: materialize dependency edges. Successor and
            // predecessor both resolve through the source-identity key
            // shape, since depends_on_original_id was stored
            // untranslated at clone time.
            let mut dependencies_created = 0usize;
            let mut dangling_dependencies = 0usize;
            for tt in &template_tasks {
                let Some(predecessor_original) = tt.depends_on_original_id else {
                    continue;
                };
                match (
                    ids.source(tt.original_task_id),
                    ids.source(predecessor_original),
                ) {
                    (Some(successor), Some(predecessor)) => {
                        tx.execute(
                            "INSERT INTO task_dependencies
                                (project_id, task_id, depends_on_task_id, dep_type, lag_days)
                             VALUES (?1, ?2, ?3, ?4, ?5)",
                            params![
                                target_project_id,
                                successor,
                                predecessor,
                                tt.dep_type.unwrap_or_default().as_str(),
                                tt.dep_lag_days.unwrap_or(0),
                            ],
                        )?;
                        dependencies_created += 1;
                    }
                    (Some(successor), None) => {
                        warn!(
                            code = ?ErrorCode::DanglingReference,
                            template_task_id = %tt.id,
                            new_task_id = %successor,
                            predecessor_original = %predecessor_original,
                            "predecessor not captured in this template; edge skipped"
                        );
                        dangling_dependencies += 1;
                    }
                    _ => {}
                }
            }
            debug!(
                %target_project_id,
                dependencies_created,
                dangling_dependencies,
                "pass 3: dependency edges materialized"
            );

            tx.commit()?;
            let outcome = InstantiateOutcome {
                tasks_created: template_tasks.len(),
                dependencies_created,
                dangling_parents,
                dangling_dependencies,
            };
            info!(
                %template_id,
                %target_project_id,
                tasks = outcome.tasks_created,
                edges = outcome.dependencies_created,
                "instantiated template"
            );
            Ok(outcome)
        })?;
        Ok(outcome)
    }
}
