//! Core types for the cloning engine.
//!
//! Every entity id is a dedicated newtype over the SQLite rowid. The
//! point is that [`TaskId`] (an identity in the source project's
//! numbering space) and [`TemplateTaskId`] (a template-local identity)
//! can never be confused: the identity map that unifies the two spaces
//! during a clone keys them separately at the type level.

use chrono::NaiveDate;
use rusqlite::types::{FromSql, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! id_newtype {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl ToSql for $name {
            fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
                Ok(ToSqlOutput::from(self.0))
            }
        }

        impl FromSql for $name {
            fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
                i64::column_result(value).map(Self)
            }
        }
    };
}

id_newtype!(
    /// Identifier of a project.
    ProjectId
);
id_newtype!(
    /// Identifier of a project-scoped task.
    TaskId
);
id_newtype!(
    /// Identifier of a project template.
    TemplateId
);
id_newtype!(
    /// Identifier of a template task (template-local identity space,
    /// distinct from the source-task space captured in
    /// `original_task_id`).
    TemplateTaskId
);
id_newtype!(
    /// Identifier of a user, owned by the out-of-scope auth layer.
    UserId
);

/// Precedence-edge type between two tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DependencyType {
    /// Finish-to-start: successor starts after predecessor finishes.
    #[serde(rename = "FS")]
    FinishToStart,
    /// Start-to-start.
    #[serde(rename = "SS")]
    StartToStart,
    /// Finish-to-finish.
    #[serde(rename = "FF")]
    FinishToFinish,
    /// Start-to-finish.
    #[serde(rename = "SF")]
    StartToFinish,
}

impl DependencyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DependencyType::FinishToStart => "FS",
            DependencyType::StartToStart => "SS",
            DependencyType::FinishToFinish => "FF",
            DependencyType::StartToFinish => "SF",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "FS" => Some(DependencyType::FinishToStart),
            "SS" => Some(DependencyType::StartToStart),
            "FF" => Some(DependencyType::FinishToFinish),
            "SF" => Some(DependencyType::StartToFinish),
            _ => None,
        }
    }
}

impl Default for DependencyType {
    fn default() -> Self {
        DependencyType::FinishToStart
    }
}

/// A project owning a task forest and its dependency edges.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    pub description: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task in a project's forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub project_id: ProjectId,
    pub parent_task_id: Option<TaskId>,
    pub name: String,
    pub description: Option<String>,
    pub planned_duration_days: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub task_order: i64,
    pub is_milestone: bool,
    /// Budget amount in cents. Opaque to the cloning engine; carried
    /// for the surrounding application's financial aggregation.
    pub budget_cents: Option<i64>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A directed precedence edge: `task_id` (successor) depends on
/// `depends_on_task_id` (predecessor). Both tasks belong to
/// `project_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDependency {
    pub id: i64,
    pub project_id: ProjectId,
    pub task_id: TaskId,
    pub depends_on_task_id: TaskId,
    pub dep_type: DependencyType,
    pub lag_days: i64,
}

/// A reusable, project-independent snapshot of a task hierarchy.
///
/// Name uniqueness is scoped per owner for user templates and globally
/// for system templates; the store's unique indexes enforce it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectTemplate {
    pub id: TemplateId,
    pub name: String,
    pub description: Option<String>,
    /// NULL only for system templates.
    pub owner_user_id: Option<UserId>,
    pub is_system: bool,
    /// Provenance: the project this template was cloned from, if any.
    pub source_project_id: Option<ProjectId>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// A task row inside a template.
///
/// `original_task_id` and `depends_on_original_id` live in the same
/// numbering space: the source project's task ids at clone time.
/// `parent_template_task_id` is a template-local relation instead. One
/// instantiation pass can therefore resolve both "which new task is
/// this" and "which new task must this depend on" through a single
/// identity map with two key shapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateTask {
    pub id: TemplateTaskId,
    pub template_id: TemplateId,
    pub original_task_id: TaskId,
    pub parent_template_task_id: Option<TemplateTaskId>,
    pub name: String,
    pub description: Option<String>,
    pub planned_duration_days: Option<i64>,
    pub task_order: i64,
    pub is_milestone: bool,
    pub depends_on_original_id: Option<TaskId>,
    pub dep_type: Option<DependencyType>,
    pub dep_lag_days: Option<i64>,
}

/// Input for creating a task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewTask {
    pub name: String,
    pub description: Option<String>,
    pub parent_task_id: Option<TaskId>,
    pub planned_duration_days: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub task_order: i64,
    #[serde(default)]
    pub is_milestone: bool,
    pub budget_cents: Option<i64>,
}
