//! Playbook criteria and the any-of match predicate.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

use crate::case::TestCase;

/// Default repeat count for an including criterion.
pub const DEFAULT_TIMES: u32 = 1;

fn default_times() -> u32 {
    DEFAULT_TIMES
}

/// One selection rule from a playbook.
///
/// Every match field is optional. An unset (or empty) field is not a
/// condition; the rule matches a test when any set field matches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Criterion {
    /// Substring of the test name.
    #[serde(default)]
    pub name: Option<String>,

    /// Case-insensitive area.
    #[serde(default)]
    pub area: Option<String>,

    /// Case-insensitive category.
    #[serde(default)]
    pub category: Option<String>,

    /// Exact priority. Accepts `1` or `"1"` in documents.
    #[serde(default, deserialize_with = "deserialize_priority")]
    pub priority: Option<u8>,

    /// Matches when all of these are among the test's tags.
    #[serde(default)]
    pub tags: Option<BTreeSet<String>>,

    /// Total number of copies an including rule asks for.
    #[serde(default = "default_times")]
    pub times: u32,

    #[serde(default)]
    pub exclude: bool,
}

impl Default for Criterion {
    fn default() -> Self {
        Self {
            name: None,
            area: None,
            category: None,
            priority: None,
            tags: None,
            times: DEFAULT_TIMES,
            exclude: false,
        }
    }
}

impl Criterion {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn area(mut self, area: impl Into<String>) -> Self {
        self.area = Some(area.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn priority(mut self, priority: u8) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn times(mut self, times: u32) -> Self {
        self.times = times;
        self
    }

    pub fn excluding(mut self) -> Self {
        self.exclude = true;
        self
    }

    /// Whether at least one match field is set.
    pub fn has_conditions(&self) -> bool {
        non_empty(&self.name).is_some()
            || non_empty(&self.area).is_some()
            || non_empty(&self.category).is_some()
            || self.priority.is_some()
            || self.tags.as_ref().is_some_and(|t| !t.is_empty())
    }

    /// Any-of predicate. Tests without selection metadata never match.
    pub fn matches(&self, test: &TestCase) -> bool {
        let Some(meta) = &test.metadata else {
            return false;
        };

        let by_name = non_empty(&self.name).is_some_and(|n| test.name.contains(n));
        let by_area = non_empty(&self.area).is_some_and(|a| eq_casefold(a, &meta.area));
        let by_category =
            non_empty(&self.category).is_some_and(|c| eq_casefold(c, &meta.category));
        let by_priority = self.priority.is_some_and(|p| p == meta.priority);
        let by_tags = self
            .tags
            .as_ref()
            .is_some_and(|t| !t.is_empty() && t.is_subset(&meta.tags));

        by_name || by_area || by_category || by_priority || by_tags
    }
}

impl fmt::Display for Criterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(name) = non_empty(&self.name) {
            parts.push(format!("name~{name}"));
        }
        if let Some(area) = non_empty(&self.area) {
            parts.push(format!("area={area}"));
        }
        if let Some(category) = non_empty(&self.category) {
            parts.push(format!("category={category}"));
        }
        if let Some(priority) = self.priority {
            parts.push(format!("priority={priority}"));
        }
        if let Some(tags) = self.tags.as_ref().filter(|t| !t.is_empty()) {
            let tags: Vec<&str> = tags.iter().map(String::as_str).collect();
            parts.push(format!("tags⊇[{}]", tags.join(",")));
        }
        let action = if self.exclude {
            "exclude".to_string()
        } else {
            format!("include x{}", self.times)
        };
        write!(f, "{} ({action})", parts.join(" | "))
    }
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

fn eq_casefold(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

fn deserialize_priority<'de, D>(deserializer: D) -> Result<Option<u8>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u8),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(p)) => Ok(Some(p)),
        Some(Raw::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(Raw::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid priority: {s:?}"))),
    }
}
