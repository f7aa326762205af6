//! Playbook types and loading.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use lisa_selection::Criterion;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::PlaybookError;
use crate::schema::PlaybookSchema;

/// Opaque target configuration. Compared by value when matching targets.
pub type Parameters = BTreeMap<String, Value>;

/// A target shape the run intends to exercise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TargetSpec {
    /// Label used in invocation IDs, e.g. `test_ping[azure-gen2]`.
    pub name: String,

    /// Registered platform kind.
    pub platform: String,

    #[serde(default)]
    pub parameters: Parameters,
}

impl TargetSpec {
    pub fn new(name: impl Into<String>, platform: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            platform: platform.into(),
            parameters: Parameters::new(),
        }
    }

    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }
}

/// A validated playbook.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Playbook {
    #[serde(default)]
    pub targets: Vec<TargetSpec>,

    #[serde(default)]
    pub criteria: Vec<Criterion>,
}

impl Playbook {
    /// Load the playbook at `path`, or the empty playbook when `None`.
    pub fn load(path: Option<&Path>) -> Result<Self, PlaybookError> {
        let Some(path) = path else {
            debug!("No playbook given, using the empty playbook");
            return Self::from_value(Value::Object(Default::default()));
        };

        let contents = std::fs::read_to_string(path).map_err(|source| PlaybookError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let playbook = Self::from_yaml_str(&contents)?;

        info!(
            path = %path.display(),
            targets = playbook.targets.len(),
            criteria = playbook.criteria.len(),
            "Playbook loaded"
        );
        Ok(playbook)
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(contents: &str) -> Result<Self, PlaybookError> {
        if contents.trim().is_empty() {
            return Self::from_value(Value::Null);
        }
        let document: Value = serde_yaml::from_str(contents)?;
        Self::from_value(document)
    }

    /// Validate a raw document already in JSON form.
    pub fn from_value(document: Value) -> Result<Self, PlaybookError> {
        // An empty YAML file is null.
        let document = match document {
            Value::Null => Value::Object(Default::default()),
            other => other,
        };

        PlaybookSchema::new()?.check(&document)?;
        let playbook: Playbook = serde_json::from_value(document)?;
        playbook.check_semantics()?;
        Ok(playbook)
    }

    fn check_semantics(&self) -> Result<(), PlaybookError> {
        let mut names = HashSet::new();
        for target in &self.targets {
            if !names.insert(target.name.as_str()) {
                return Err(PlaybookError::DuplicateTarget(target.name.clone()));
            }
        }

        for (index, criterion) in self.criteria.iter().enumerate() {
            if !criterion.has_conditions() {
                warn!(
                    index,
                    criterion = %criterion,
                    "Criterion has no match fields and selects nothing"
                );
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty() && self.criteria.is_empty()
    }

    pub fn target_names(&self) -> Vec<&str> {
        self.targets.iter().map(|t| t.name.as_str()).collect()
    }
}
