//! Project/template structure cloning engine.
//!
//! Captures a live project's task hierarchy and task-dependency graph
//! into a reusable template, and instantiates a template back into a
//! brand-new project's task hierarchy and dependency graph. Both
//! directions are multi-pass graph remappings executed inside a single
//! SQLite transaction: nodes are materialized first, then structural
//! pointers (parent links, precedence edges) are rewritten through a
//! per-run [`identity::IdentityMap`] from source identities to freshly
//! created row ids.

pub mod db;
pub mod error;
pub mod identity;
pub mod tree;
pub mod types;
