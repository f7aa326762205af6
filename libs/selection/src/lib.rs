//! Criteria-based test selection.
//!
//! Given the test cases discovered by the host engine and the ordered
//! criteria from a playbook, compute the multiset of tests that run.
//!
//! # Invariants
//!
//! - Criteria apply in playbook order, tests in discovery order
//! - A criterion matches when *any* of its set fields matches
//! - `times` is a target total count, never an increment
//! - Exclusion always wins, regardless of rule order or `times`
//! - No rule matched anything means every test runs once
//! - Tests without selection metadata are never matched and always kept

mod case;
mod criterion;
mod error;
mod select;

pub use case::{validate_catalog, CatalogEntry, TestCase, TestMetadata};
pub use criterion::{Criterion, DEFAULT_TIMES};
pub use error::SelectionError;
pub use select::{select, DropReason, Selection};
