//! Discovered test cases and their selection metadata.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::SelectionError;

/// Selection metadata a test declares at discovery time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct TestMetadata {
    /// Functional area, e.g. `network` or `storage`.
    #[validate(length(min = 1, message = "area must not be empty"))]
    pub area: String,

    /// Test category, e.g. `functional` or `performance`.
    #[validate(length(min = 1, message = "category must not be empty"))]
    pub category: String,

    /// Priority, 0 (highest) through 5.
    #[validate(range(max = 5, message = "priority must be between 0 and 5"))]
    pub priority: u8,

    #[serde(default)]
    pub tags: BTreeSet<String>,

    /// Capabilities the target must provide for this test.
    #[serde(default)]
    pub features: BTreeSet<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl TestMetadata {
    /// Minimal metadata with no tags or features.
    pub fn new(area: impl Into<String>, category: impl Into<String>, priority: u8) -> Self {
        Self {
            area: area.into(),
            category: category.into(),
            priority,
            tags: BTreeSet::new(),
            features: BTreeSet::new(),
            description: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_features<I, S>(mut self, features: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.features = features.into_iter().map(Into::into).collect();
        self
    }
}

/// A test case as seen by the selection engine.
///
/// Tests are identified by name; two cases with the same name are the
/// same test when counting repeats and applying exclusions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCase {
    pub name: String,

    /// `None` for tests that carry no selection metadata (static
    /// analysis checks and the like).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<TestMetadata>,

    /// Whether the test runs against a target.
    #[serde(default)]
    pub requires_target: bool,

    /// Host engine markers, e.g. `flake8` or `mypy`.
    #[serde(default)]
    pub markers: BTreeSet<String>,
}

impl TestCase {
    /// A target-backed test with selection metadata.
    pub fn lisa(name: impl Into<String>, metadata: TestMetadata) -> Self {
        Self {
            name: name.into(),
            metadata: Some(metadata),
            requires_target: true,
            markers: BTreeSet::new(),
        }
    }

    /// A test without selection metadata that needs no target.
    pub fn plain(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            metadata: None,
            requires_target: false,
            markers: BTreeSet::new(),
        }
    }

    pub fn with_marker(mut self, marker: impl Into<String>) -> Self {
        self.markers.insert(marker.into());
        self
    }

    pub fn has_selection_metadata(&self) -> bool {
        self.metadata.is_some()
    }

    /// Capabilities a target must provide to run this test.
    pub fn required_features(&self) -> BTreeSet<String> {
        self.metadata
            .as_ref()
            .map(|m| m.features.clone())
            .unwrap_or_default()
    }

    pub fn has_any_marker(&self, markers: &[&str]) -> bool {
        markers.iter().any(|m| self.markers.contains(*m))
    }
}

/// A test as reported by the host engine, metadata not yet checked.
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEntry {
    pub name: String,

    #[serde(default)]
    pub metadata: Option<serde_json::Value>,

    #[serde(default)]
    pub requires_target: bool,

    #[serde(default)]
    pub markers: BTreeSet<String>,
}

impl CatalogEntry {
    fn into_test_case(self) -> Result<TestCase, SelectionError> {
        let metadata = match self.metadata {
            None => None,
            Some(raw) => {
                let metadata: TestMetadata =
                    serde_json::from_value(raw).map_err(|e| SelectionError::InvalidMetadata {
                        test: self.name.clone(),
                        reason: e.to_string(),
                    })?;
                metadata
                    .validate()
                    .map_err(|e| SelectionError::InvalidMetadata {
                        test: self.name.clone(),
                        reason: e.to_string(),
                    })?;
                Some(metadata)
            }
        };

        Ok(TestCase {
            name: self.name,
            metadata,
            requires_target: self.requires_target,
            markers: self.markers,
        })
    }
}

/// Check every discovered test's metadata and build the candidate set.
///
/// Fails closed: the first invalid test aborts the whole set, and the
/// error names that test.
pub fn validate_catalog(entries: Vec<CatalogEntry>) -> Result<Vec<TestCase>, SelectionError> {
    entries
        .into_iter()
        .map(CatalogEntry::into_test_case)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(name: &str, metadata: Option<serde_json::Value>) -> CatalogEntry {
        CatalogEntry {
            name: name.to_string(),
            metadata,
            requires_target: true,
            markers: BTreeSet::new(),
        }
    }

    #[test]
    fn test_valid_catalog() {
        let tests = validate_catalog(vec![
            entry(
                "test_ping",
                Some(json!({
                    "area": "network",
                    "category": "functional",
                    "priority": 1,
                    "tags": ["smoke"],
                    "features": ["sriov"],
                })),
            ),
            entry("test_flake8", None),
        ])
        .unwrap();

        assert_eq!(tests.len(), 2);
        let ping = &tests[0];
        assert!(ping.has_selection_metadata());
        assert!(ping.required_features().contains("sriov"));
        assert!(!tests[1].has_selection_metadata());
    }

    #[test]
    fn test_missing_key_discards_everything() {
        let err = validate_catalog(vec![
            entry(
                "test_ok",
                Some(json!({"area": "a", "category": "c", "priority": 0})),
            ),
            entry("test_bad", Some(json!({"area": "a", "priority": 0}))),
        ])
        .unwrap_err();

        assert_eq!(err.test_name(), "test_bad");
        assert!(err.to_string().contains("category"));
    }

    #[test]
    fn test_out_of_range_priority() {
        let err = validate_catalog(vec![entry(
            "test_p",
            Some(json!({"area": "a", "category": "c", "priority": 9})),
        )])
        .unwrap_err();

        assert!(matches!(err, SelectionError::InvalidMetadata { .. }));
    }

    #[test]
    fn test_empty_area_rejected() {
        let err = validate_catalog(vec![entry(
            "test_e",
            Some(json!({"area": "", "category": "c", "priority": 1})),
        )])
        .unwrap_err();

        assert_eq!(err.test_name(), "test_e");
    }

    #[test]
    fn test_unknown_metadata_key_rejected() {
        let err = validate_catalog(vec![entry(
            "test_u",
            Some(json!({"area": "a", "category": "c", "priority": 1, "owner": "x"})),
        )])
        .unwrap_err();

        assert!(err.to_string().contains("owner"));
    }

    #[test]
    fn test_same_name_in_two_suites_is_kept() {
        let tests = validate_catalog(vec![
            entry(
                "test_boot",
                Some(json!({"area": "network", "category": "c", "priority": 1})),
            ),
            entry(
                "test_boot",
                Some(json!({"area": "storage", "category": "c", "priority": 1})),
            ),
        ])
        .unwrap();

        assert_eq!(tests.len(), 2);
        assert_ne!(tests[0].metadata, tests[1].metadata);
    }
}
