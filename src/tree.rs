//! Read-only forest assembly for display consumers.
//!
//! Pure function over flat task rows; no storage access and no side
//! effects, deliberately separate from the transactional cloning
//! paths.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::types::{Task, TaskId};

/// A task with its children, for nested rendering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskNode {
    #[serde(flatten)]
    pub task: Task,
    pub children: Vec<TaskNode>,
}

/// Assemble flat task rows into a forest.
///
/// Roots are tasks with no parent, or whose parent is not present in
/// the input slice (a partial listing still renders). Siblings are
/// ordered by `task_order`, then id for stability.
pub fn build_forest(tasks: &[Task]) -> Vec<TaskNode> {
    let present: HashMap<TaskId, &Task> = tasks.iter().map(|t| (t.id, t)).collect();

    let mut children_of: HashMap<Option<TaskId>, Vec<&Task>> = HashMap::new();
    for task in tasks {
        let key = match task.parent_task_id {
            Some(parent) if present.contains_key(&parent) => Some(parent),
            _ => None,
        };
        children_of.entry(key).or_default().push(task);
    }

    for siblings in children_of.values_mut() {
        siblings.sort_by_key(|t| (t.task_order, t.id));
    }

    assemble(None, &children_of)
}

fn assemble(
    parent: Option<TaskId>,
    children_of: &HashMap<Option<TaskId>, Vec<&Task>>,
) -> Vec<TaskNode> {
    children_of
        .get(&parent)
        .map(|siblings| {
            siblings
                .iter()
                .map(|task| TaskNode {
                    task: (*task).clone(),
                    children: assemble(Some(task.id), children_of),
                })
                .collect()
        })
        .unwrap_or_default()
}
