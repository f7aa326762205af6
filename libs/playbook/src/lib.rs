//! Playbook documents.
//!
//! A playbook declares which target shapes a run exercises and the
//! ordered criteria that select tests. Loading goes through three gates,
//! and any failure aborts the run before a target exists:
//!
//! 1. YAML syntax
//! 2. JSON schema (shape, unknown keys, value types)
//! 3. Semantic checks (unique target names)
//!
//! An absent playbook is the empty document: no targets, no criteria.

mod error;
mod model;
mod schema;

pub use error::PlaybookError;
pub use model::{Parameters, Playbook, TargetSpec};
pub use schema::PlaybookSchema;
