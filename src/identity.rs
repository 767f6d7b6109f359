//! Per-run identity mapping between source and destination id spaces.

use std::collections::HashMap;

use crate::types::{TaskId, TemplateTaskId};

/// Bidirectional-clone lookup table from a stable source identity to a
/// newly created record's identity.
///
/// One clone run touches two disjoint key spaces: the source project's
/// task ids (captured on template rows as `original_task_id` /
/// `depends_on_original_id`) and the template's own task ids (what
/// `parent_template_task_id` references). Both map to the same
/// destination id type `D`, so the two shapes live in one structure as
/// two separately-typed maps; a `TaskId` key can never collide with a
/// `TemplateTaskId` key.
///
/// The map lives for the duration of a single forward or reverse clone
/// and is discarded afterwards. A missing key means "no corresponding
/// destination record" and is reported as `None`; callers decide
/// whether that skips a fix-up row.
#[derive(Debug)]
pub struct IdentityMap<D> {
    by_source: HashMap<TaskId, D>,
    by_template_task: HashMap<TemplateTaskId, D>,
}

impl<D: Copy> IdentityMap<D> {
    pub fn new() -> Self {
        Self {
            by_source: HashMap::new(),
            by_template_task: HashMap::new(),
        }
    }

    /// Create a map sized for a known node count.
    pub fn with_capacity(nodes: usize) -> Self {
        Self {
            by_source: HashMap::with_capacity(nodes),
            by_template_task: HashMap::with_capacity(nodes),
        }
    }

    /// Record the destination id created for a source-task identity.
    pub fn record_source(&mut self, source: TaskId, dest: D) {
        self.by_source.insert(source, dest);
    }

    /// Record the destination id created for a template-task identity.
    pub fn record_template(&mut self, template_task: TemplateTaskId, dest: D) {
        self.by_template_task.insert(template_task, dest);
    }

    /// Resolve a source-task identity.
    pub fn source(&self, source: TaskId) -> Option<D> {
        self.by_source.get(&source).copied()
    }

    /// Resolve a template-task identity.
    pub fn template(&self, template_task: TemplateTaskId) -> Option<D> {
        self.by_template_task.get(&template_task).copied()
    }

    /// Number of source-identity entries.
    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

impl<D: Copy> Default for IdentityMap<D> {
    fn default() -> Self {
        Self::new()
    }
}
