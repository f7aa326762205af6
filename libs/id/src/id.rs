//! Prefixed ULID identifiers.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use ulid::Ulid;

use crate::error::IdError;

/// The kind of resource an [`Id`] names. Only the prefix differs.
pub trait IdKind {
    const PREFIX: &'static str;
}

/// An identifier rendered as `{prefix}_{ulid}`.
///
/// The kind parameter is a zero-sized marker, so `Id<Target>` and
/// `Id<Run>` are distinct types with identical layout.
pub struct Id<K> {
    ulid: Ulid,
    kind: PhantomData<fn() -> K>,
}

impl<K: IdKind> Id<K> {
    pub const PREFIX: &'static str = K::PREFIX;

    /// A fresh ID. IDs created later compare greater.
    #[must_use]
    pub fn new() -> Self {
        Self::from_ulid(Ulid::new())
    }

    #[must_use]
    pub const fn from_ulid(ulid: Ulid) -> Self {
        Self {
            ulid,
            kind: PhantomData,
        }
    }

    #[must_use]
    pub const fn ulid(&self) -> Ulid {
        self.ulid
    }

    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }

        let (prefix, rest) = s.split_once('_').ok_or(IdError::MissingSeparator)?;
        if prefix != K::PREFIX {
            return Err(IdError::InvalidPrefix {
                expected: K::PREFIX,
                actual: prefix.to_string(),
            });
        }

        Ulid::from_string(rest)
            .map(Self::from_ulid)
            .map_err(|e| IdError::InvalidUlid(e.to_string()))
    }
}

impl<K: IdKind> Default for Id<K> {
    fn default() -> Self {
        Self::new()
    }
}

// Manual impls: derives would demand the same traits of the marker.

impl<K> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for Id<K> {}

impl<K> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.ulid == other.ulid
    }
}

impl<K> Eq for Id<K> {}

impl<K> PartialOrd for Id<K> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<K> Ord for Id<K> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.ulid.cmp(&other.ulid)
    }
}

impl<K> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.ulid.hash(state);
    }
}

impl<K: IdKind> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", K::PREFIX, self.ulid)
    }
}

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

impl<K: IdKind> FromStr for Id<K> {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<K: IdKind> Serialize for Id<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, K: IdKind> Deserialize<'de> for Id<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Marker for provisioned targets.
#[derive(Debug)]
pub enum Target {}

impl IdKind for Target {
    const PREFIX: &'static str = "tgt";
}

/// Marker for orchestration runs.
#[derive(Debug)]
pub enum Run {}

impl IdKind for Run {
    const PREFIX: &'static str = "run";
}

/// Identity of one provisioned target held by a pool.
pub type TargetId = Id<Target>;

/// Identity of one orchestration run (one session).
pub type RunId = Id<Run>;

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_target_id_roundtrip() {
        let id = TargetId::new();
        let parsed: TargetId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
        assert!(id.to_string().starts_with("tgt_"));
    }

    #[test]
    fn test_run_id_rejects_target_prefix() {
        let target = TargetId::new().to_string();
        let err = target.parse::<RunId>().unwrap_err();
        assert!(err.is_prefix_error());
    }

    #[test]
    fn test_missing_separator() {
        let result: Result<TargetId, _> = "tgt01HV4Z2WQXKJNM8GPQY6VBKC3D".parse();
        assert_eq!(result.unwrap_err(), IdError::MissingSeparator);
    }

    #[test]
    fn test_empty() {
        assert_eq!("".parse::<RunId>().unwrap_err(), IdError::Empty);
    }

    #[test]
    fn test_invalid_ulid() {
        let result: Result<TargetId, _> = "tgt_not-a-ulid".parse();
        assert!(matches!(result.unwrap_err(), IdError::InvalidUlid(_)));
    }

    #[test]
    fn test_json_form_is_string() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
        let parsed: RunId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_debug_matches_display() {
        let id = TargetId::new();
        assert_eq!(format!("{id:?}"), id.to_string());
    }

    #[test]
    fn test_ids_sort_by_creation() {
        let first = TargetId::new();
        std::thread::sleep(std::time::Duration::from_millis(2));
        let second = TargetId::new();
        assert!(first < second);
    }

    proptest! {
        #[test]
        fn parse_never_panics(s in "\\PC*") {
            let _ = TargetId::parse(&s);
        }

        #[test]
        fn prefix_mismatch_always_rejected(raw in any::<u128>()) {
            let text = format!("run_{}", Ulid(raw));
            prop_assert!(TargetId::parse(&text).unwrap_err().is_prefix_error());
        }

        #[test]
        fn display_parses_back(raw in any::<u128>()) {
            let id = RunId::from_ulid(Ulid(raw));
            prop_assert_eq!(RunId::parse(&id.to_string()).unwrap(), id);
        }
    }
}
