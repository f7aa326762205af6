//! # lisa-id
//!
//! Typed identifiers for the resources an orchestration run creates.
//!
//! All IDs render as `{prefix}_{ulid}`:
//!
//! - `tgt_01HV4Z2WQXKJNM8GPQY6VBKC3D` for a provisioned target
//! - `run_01HV4Z3MXNKPQR9HSTZ7WCLD4E` for one orchestration run
//!
//! The prefix keeps a target ID from being passed where a run ID is
//! expected, and the ULID keeps IDs sortable by creation time, which
//! matches the pool's insertion order.

mod error;
mod id;

pub use error::IdError;
pub use id::{Id, IdKind, Run, RunId, Target, TargetId};
pub use ulid::Ulid;
