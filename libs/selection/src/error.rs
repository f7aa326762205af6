//! Selection errors.

use thiserror::Error;

/// Errors raised before selection can run.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SelectionError {
    /// A test's selection metadata failed validation. The whole
    /// candidate set is discarded when this is returned.
    #[error("test {test} failed LISA validation: {reason}")]
    InvalidMetadata { test: String, reason: String },
}

impl SelectionError {
    /// Name of the test the error is about.
    pub fn test_name(&self) -> &str {
        match self {
            Self::InvalidMetadata { test, .. } => test,
        }
    }
}
