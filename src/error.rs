//! Structured error types for the cloning engine.

use serde::Serialize;
use std::fmt;

use crate::types::{ProjectId, TaskId, TemplateId};

/// Error codes for programmatic error handling.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Not found errors
    ProjectNotFound,
    TemplateNotFound,
    TaskNotFound,

    // Conflict errors
    DuplicateName,
    DependencyCycle,
    CrossProjectReference,

    // Carried on warnings when a parent or predecessor cannot be
    // resolved through the identity map; never fatal on its own.
    DanglingReference,

    // Internal errors
    StorageFailure,
}

/// Structured error returned by engine operations.
#[derive(Debug, Serialize)]
pub struct EngineError {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl EngineError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    // Convenience constructors

    pub fn project_not_found(project_id: ProjectId) -> Self {
        Self::new(
            ErrorCode::ProjectNotFound,
            format!("Project not found: {}", project_id),
        )
    }

    pub fn template_not_found(template_id: TemplateId) -> Self {
        Self::new(
            ErrorCode::TemplateNotFound,
            format!("Template not found: {}", template_id),
        )
    }

    pub fn task_not_found(task_id: TaskId) -> Self {
        Self::new(
            ErrorCode::TaskNotFound,
            format!("Task not found: {}", task_id),
        )
    }

    pub fn duplicate_name(name: &str) -> Self {
        Self::new(
            ErrorCode::DuplicateName,
            format!("A template named '{}' already exists in this scope", name),
        )
    }

    pub fn dependency_cycle(task_id: TaskId, depends_on: TaskId) -> Self {
        Self::new(
            ErrorCode::DependencyCycle,
            format!(
                "Dependency {} -> {} would create a cycle",
                task_id, depends_on
            ),
        )
    }

    pub fn cross_project(task_id: TaskId, project_id: ProjectId) -> Self {
        Self::new(
            ErrorCode::CrossProjectReference,
            format!("Task {} does not belong to project {}", task_id, project_id),
        )
    }

    pub fn storage(err: impl fmt::Display) -> Self {
        Self::new(ErrorCode::StorageFailure, err.to_string())
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for EngineError {}

// Allow using ? with anyhow errors by converting them
impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to EngineError first
        match err.downcast::<EngineError>() {
            Ok(engine_err) => engine_err,
            Err(err) => EngineError::storage(err),
        }
    }
}

impl From<rusqlite::Error> for EngineError {
    fn from(err: rusqlite::Error) -> Self {
        EngineError::storage(err)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
