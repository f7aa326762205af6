//! The selection pass.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;
use tracing::debug;

use crate::case::TestCase;
use crate::criterion::Criterion;

/// Why a discovered test is absent from the selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DropReason {
    /// An excluding criterion matched the test.
    Excluded,

    /// Some criterion included tests, but none included this one.
    NotSelected,

    /// Selected, then filtered out by the run mode.
    Deselected,
}

/// Result of a selection pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection {
    /// Tests to run, repeats adjacent to each other.
    pub tests: Vec<TestCase>,

    /// Every discovered test that will not run, with the reason.
    pub dropped: Vec<(String, DropReason)>,

    /// True when no criterion included anything and every test was kept.
    pub fell_back: bool,
}

impl Selection {
    /// Number of times `name` appears in the selection.
    pub fn count(&self, name: &str) -> usize {
        self.tests.iter().filter(|t| t.name == name).count()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tests.iter().map(|t| t.name.as_str()).collect()
    }
}

/// Running copy count for one included test, by discovery index.
struct Included {
    index: usize,
    copies: u32,
}

/// Apply `criteria` to `tests` and compute the tests to run.
///
/// Tests are visited in discovery order for each criterion, criteria in
/// the given order. An including match raises the test's copy count to
/// `times` if it is lower; an excluding match removes the test from the
/// final result however many copies were included.
///
/// Tests are told apart by their position in `tests`, so two discovered
/// tests sharing a name are counted and excluded independently.
pub fn select(tests: &[TestCase], criteria: &[Criterion]) -> Selection {
    let mut included: Vec<Included> = Vec::new();
    let mut position: HashMap<usize, usize> = HashMap::new();
    let mut excluded: BTreeSet<usize> = BTreeSet::new();

    for criterion in criteria {
        debug!(criterion = %criterion, "Applying criterion");

        for (index, test) in tests.iter().enumerate() {
            if !test.has_selection_metadata() || !criterion.matches(test) {
                continue;
            }

            if criterion.exclude {
                debug!(test = %test.name, index, "Excluding test");
                excluded.insert(index);
                continue;
            }

            debug!(test = %test.name, index, times = criterion.times, "Including test");
            match position.get(&index) {
                Some(&slot) => {
                    let slot = &mut included[slot];
                    slot.copies = slot.copies.max(criterion.times);
                }
                None if criterion.times > 0 => {
                    position.insert(index, included.len());
                    included.push(Included {
                        index,
                        copies: criterion.times,
                    });
                }
                None => {}
            }
        }
    }

    let mut selection = Selection::default();

    if included.is_empty() {
        selection.fell_back = true;
        for (index, test) in tests.iter().enumerate() {
            if excluded.contains(&index) {
                selection
                    .dropped
                    .push((test.name.clone(), DropReason::Excluded));
            } else {
                selection.tests.push(test.clone());
            }
        }
        return selection;
    }

    for slot in &included {
        if excluded.contains(&slot.index) {
            continue;
        }
        let test = &tests[slot.index];
        for _ in 0..slot.copies {
            selection.tests.push(test.clone());
        }
    }

    for (index, test) in tests.iter().enumerate() {
        if !test.has_selection_metadata() {
            selection.tests.push(test.clone());
        } else if excluded.contains(&index) {
            selection
                .dropped
                .push((test.name.clone(), DropReason::Excluded));
        } else if !position.contains_key(&index) {
            selection
                .dropped
                .push((test.name.clone(), DropReason::NotSelected));
        }
    }

    selection
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::case::TestMetadata;
    use proptest::prelude::*;

    fn case(name: &str, area: &str, tags: &[&str]) -> TestCase {
        TestCase::lisa(
            name,
            TestMetadata::new(area, "functional", 2).with_tags(tags.iter().copied()),
        )
    }

    #[test]
    fn test_include_then_exclude_by_tag() {
        let tests = vec![
            case("A", "net", &[]),
            case("B", "net", &["slow"]),
            case("C", "disk", &[]),
        ];
        let criteria = vec![
            Criterion::default().area("net").times(3),
            Criterion::default().tags(["slow"]).excluding(),
        ];

        let selection = select(&tests, &criteria);

        assert_eq!(selection.names(), vec!["A", "A", "A"]);
        assert!(!selection.fell_back);
        assert!(selection
            .dropped
            .contains(&("B".to_string(), DropReason::Excluded)));
        assert!(selection
            .dropped
            .contains(&("C".to_string(), DropReason::NotSelected)));
    }

    #[test]
    fn test_empty_criteria_keeps_everything_once() {
        let tests = vec![case("A", "net", &[]), case("B", "disk", &[])];
        let selection = select(&tests, &[]);
        assert_eq!(selection.names(), vec!["A", "B"]);
        assert!(selection.fell_back);
        assert!(selection.dropped.is_empty());
    }

    #[test]
    fn test_times_is_a_target_count() {
        let tests = vec![case("A", "net", &["smoke"])];
        let criteria = vec![
            Criterion::default().area("net").times(2),
            Criterion::default().tags(["smoke"]).times(5),
        ];
        assert_eq!(select(&tests, &criteria).count("A"), 5);
    }

    #[test]
    fn test_lower_times_later_does_not_shrink() {
        let tests = vec![case("A", "net", &["smoke"])];
        let criteria = vec![
            Criterion::default().area("net").times(4),
            Criterion::default().tags(["smoke"]).times(1),
        ];
        assert_eq!(select(&tests, &criteria).count("A"), 4);
    }

    #[test]
    fn test_exclude_before_include_still_wins() {
        let tests = vec![case("A", "net", &["slow"]), case("B", "net", &[])];
        let criteria = vec![
            Criterion::default().tags(["slow"]).excluding(),
            Criterion::default().area("net").times(2),
        ];
        assert_eq!(select(&tests, &criteria).names(), vec!["B", "B"]);
    }

    #[test]
    fn test_only_exclusions_fall_back_minus_excluded() {
        let tests = vec![case("A", "net", &[]), case("B", "disk", &[])];
        let criteria = vec![Criterion::default().area("disk").excluding()];

        let selection = select(&tests, &criteria);
        assert!(selection.fell_back);
        assert_eq!(selection.names(), vec!["A"]);
    }

    #[test]
    fn test_repeats_stay_adjacent() {
        let tests = vec![case("A", "net", &["x"]), case("B", "net", &[])];
        let criteria = vec![
            Criterion::default().area("net"),
            Criterion::default().tags(["x"]).times(3),
        ];
        assert_eq!(select(&tests, &criteria).names(), vec!["A", "A", "A", "B"]);
    }

    #[test]
    fn test_first_inclusion_order_follows_criteria() {
        let tests = vec![case("A", "net", &[]), case("B", "disk", &[])];
        let criteria = vec![
            Criterion::default().area("disk"),
            Criterion::default().area("net"),
        ];
        assert_eq!(select(&tests, &criteria).names(), vec!["B", "A"]);
    }

    #[test]
    fn test_metadata_less_tests_are_kept() {
        let tests = vec![
            case("A", "net", &[]),
            TestCase::plain("flake8"),
            case("C", "disk", &[]),
        ];
        let criteria = vec![Criterion::default().area("net")];
        assert_eq!(select(&tests, &criteria).names(), vec!["A", "flake8"]);
    }

    #[test]
    fn test_zero_times_adds_nothing() {
        let tests = vec![case("A", "net", &[]), case("B", "disk", &[])];
        let criteria = vec![Criterion::default().area("net").times(0)];

        let selection = select(&tests, &criteria);
        assert!(selection.fell_back);
        assert_eq!(selection.names(), vec!["A", "B"]);
    }

    #[test]
    fn test_same_name_tests_are_distinct() {
        let tests = vec![
            case("test_boot", "network", &[]),
            case("test_boot", "storage", &["slow"]),
            case("test_ping", "network", &[]),
        ];

        // Only the network copy of test_boot is included, twice.
        let criteria = vec![Criterion::default().area("network").times(2)];
        let selection = select(&tests, &criteria);
        assert_eq!(
            selection.names(),
            vec!["test_boot", "test_boot", "test_ping", "test_ping"]
        );
        assert!(selection
            .tests
            .iter()
            .all(|t| t.metadata.as_ref().unwrap().area == "network"));
        assert_eq!(
            selection.dropped,
            vec![("test_boot".to_string(), DropReason::NotSelected)]
        );

        // Excluding the storage copy leaves the network copy running.
        let criteria = vec![Criterion::default().tags(["slow"]).excluding()];
        let selection = select(&tests, &criteria);
        assert_eq!(selection.names(), vec!["test_boot", "test_ping"]);
        assert_eq!(
            selection.tests[0].metadata.as_ref().unwrap().area,
            "network"
        );
        assert_eq!(
            selection.dropped,
            vec![("test_boot".to_string(), DropReason::Excluded)]
        );
    }

    fn arb_case() -> impl Strategy<Value = (String, Vec<String>)> {
        (
            prop::sample::select(vec!["net", "disk", "cpu"]),
            prop::collection::vec(prop::sample::select(vec!["slow", "smoke", "gpu"]), 0..3),
        )
            .prop_map(|(area, tags)| {
                (
                    area.to_string(),
                    tags.into_iter().map(String::from).collect::<Vec<String>>(),
                )
            })
    }

    fn arb_criterion() -> impl Strategy<Value = Criterion> {
        (
            prop::option::of(prop::sample::select(vec!["net", "disk", "cpu"])),
            prop::option::of(prop::sample::select(vec!["slow", "smoke", "gpu"])),
            0u32..6,
            any::<bool>(),
        )
            .prop_map(|(area, tag, times, exclude)| Criterion {
                area: area.map(String::from),
                tags: tag.map(|t| [t.to_string()].into_iter().collect()),
                times,
                exclude,
                ..Criterion::default()
            })
    }

    proptest! {
        #[test]
        fn excluded_tests_never_selected(
            specs in prop::collection::vec(arb_case(), 0..8),
            criteria in prop::collection::vec(arb_criterion(), 0..6),
        ) {
            let tests: Vec<TestCase> = specs
                .iter()
                .enumerate()
                .map(|(i, (area, tags))| {
                    TestCase::lisa(
                        format!("t{i}"),
                        TestMetadata::new(area.as_str(), "functional", 1)
                            .with_tags(tags.iter().cloned()),
                    )
                })
                .collect();

            let selection = select(&tests, &criteria);

            for test in &tests {
                let excluded = criteria.iter().any(|c| c.exclude && c.matches(test));
                let count = selection.count(&test.name);
                if excluded {
                    prop_assert_eq!(count, 0);
                } else {
                    let max_times = criteria
                        .iter()
                        .filter(|c| !c.exclude && c.matches(test))
                        .map(|c| c.times as usize)
                        .max();
                    match (selection.fell_back, max_times) {
                        (true, _) => prop_assert_eq!(count, 1),
                        (false, Some(times)) => prop_assert_eq!(count, times),
                        (false, None) => prop_assert_eq!(count, 0),
                    }
                }
            }
        }
    }
}
