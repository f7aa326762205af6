use thiserror::Error;

/// Why an ID string was rejected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdError {
    #[error("ID cannot be empty")]
    Empty,

    #[error("wrong ID kind: expected '{expected}_…', got '{actual}_…'")]
    InvalidPrefix {
        expected: &'static str,
        actual: String,
    },

    #[error("ID has no '_' between prefix and ULID")]
    MissingSeparator,

    #[error("invalid ULID: {0}")]
    InvalidUlid(String),
}

impl IdError {
    pub fn is_prefix_error(&self) -> bool {
        matches!(self, Self::InvalidPrefix { .. })
    }
}
