//! Playbook errors. All of them are configuration errors.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlaybookError {
    #[error("failed to read playbook {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid playbook YAML: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// The document does not satisfy the playbook schema.
    #[error("playbook failed schema validation: {}", violations.join("; "))]
    Schema { violations: Vec<String> },

    /// The document passed the schema but could not be mapped to types.
    #[error("malformed playbook: {0}")]
    Shape(#[from] serde_json::Error),

    #[error("duplicate target name in playbook: {0}")]
    DuplicateTarget(String),

    /// The embedded schema itself is broken.
    #[error("playbook schema is invalid: {0}")]
    SchemaCompile(String),
}
