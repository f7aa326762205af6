//! JSON schema gate for raw playbook documents.

use serde_json::Value;

use crate::error::PlaybookError;

const SCHEMA_SOURCE: &str = include_str!("../schema/playbook.schema.json");

/// Compiled playbook schema.
pub struct PlaybookSchema {
    validator: jsonschema::Validator,
}

impl PlaybookSchema {
    /// Compile the embedded schema.
    pub fn new() -> Result<Self, PlaybookError> {
        let schema: Value = serde_json::from_str(SCHEMA_SOURCE)
            .map_err(|e| PlaybookError::SchemaCompile(e.to_string()))?;
        let validator = jsonschema::validator_for(&schema)
            .map_err(|e| PlaybookError::SchemaCompile(e.to_string()))?;
        Ok(Self { validator })
    }

    /// Check a raw document, collecting every violation.
    pub fn check(&self, document: &Value) -> Result<(), PlaybookError> {
        let violations: Vec<String> = self
            .validator
            .iter_errors(document)
            .map(|e| e.to_string())
            .collect();

        if violations.is_empty() {
            Ok(())
        } else {
            Err(PlaybookError::Schema { violations })
        }
    }
}
