
use std::time::Duration;

use harness::{
    catalog, lisa_test, mock_registry, playbook, session, Behavior, RecordingExecutor,
};
use lisa_playbook::{Playbook, TargetSpec};
use lisa_runner::{Outcome, RunConfig};
use lisa_selection::validate_catalog;

#[tokio::test]
async fn connection_closes_after_panicking_body() {
    let (registry, mock) = mock_registry();
    let mut s = session(RunConfig::default(), Playbook::default(), registry);
    let executor = RecordingExecutor::new().with("test_boom", Behavior::Panic);

    let tests = validate_catalog(catalog(vec![
        lisa_test("test_boom", "network", 1, &[]),
        lisa_test("test_after", "network", 1, &[]),
    ]))
    .unwrap();
    let plan = s.plan(&s.select(&tests).tests);
    let reports = s.execute(plan, &executor).await;

    assert!(matches!(
        &reports[0].outcome,
        Outcome::Errored { message } if message.contains("panicked")
    ));
    assert_eq!(reports[1].outcome, Outcome::Passed);

    // The same target served both invocations and is no longer connected.
    assert_eq!(reports[0].target_id, reports[1].target_id);
    let targets = s.pool().snapshot().await;
    assert_eq!(targets.len(), 1);
    assert!(!targets[0].connection().is_open());
    assert_eq!(targets[0].connection().times_opened(), 2);
    assert_eq!(mock.constructed(), 1);

    s.teardown().await.unwrap();
}

#[tokio::test]
async fn connection_closes_after_timeout() {
    let (registry, _mock) = mock_registry();
    let config = RunConfig {
        test_timeout: Some(Duration::from_millis(50)),
        ..RunConfig::default()
    };
    let mut s = session(config, Playbook::default(), registry);
    let executor = RecordingExecutor::new().with("test_hang", Behavior::Hang);

    let tests = validate_catalog(catalog(vec![lisa_test("test_hang", "network", 1, &[])]))
        .unwrap();
    let reports = s.execute(s.plan(&tests), &executor).await;

    assert!(matches!(
        &reports[0].outcome,
        Outcome::Errored { message } if message.contains("timed out")
    ));
    let targets = s.pool().snapshot().await;
    assert!(!targets[0].connection().is_open());

    s.teardown().await.unwrap();
}

#[tokio::test]
async fn concurrent_invocations_share_one_target() {
    let (registry, mock) = mock_registry();
    let config = RunConfig {
        jobs: 4,
        ..RunConfig::default()
    };
    let mut s = session(config, Playbook::default(), registry);

    let entries = (0..8)
        .map(|i| lisa_test(&format!("test_{i}"), "network", 1, &[]))
        .collect();
    let tests = validate_catalog(catalog(entries)).unwrap();
    let executor = (0..8).fold(RecordingExecutor::new(), |e, i| {
        e.with(format!("test_{i}"), Behavior::Sleep(Duration::from_millis(20)))
    });

    let reports = s.execute(s.plan(&tests), &executor).await;

    assert_eq!(reports.len(), 8);
    assert!(reports.iter().all(|r| r.outcome == Outcome::Passed));
    // Reports come back in plan order.
    let ids: Vec<String> = reports.iter().map(|r| r.id.clone()).collect();
    let expected: Vec<String> = (0..8).map(|i| format!("test_{i}[default]")).collect();
    assert_eq!(ids, expected);

    assert_eq!(mock.constructed(), 1);
    let targets = s.pool().snapshot().await;
    assert_eq!(targets.len(), 1);
    assert_eq!(targets[0].connection().times_opened(), 8);
    assert!(!targets[0].connection().is_open());

    let teardown = s.teardown().await.unwrap();
    assert_eq!(teardown.deprovisioned.len(), 1);
}

#[tokio::test]
async fn feature_requirements_split_targets() {
    let (registry, mock) = mock_registry();
    let book = playbook(vec![TargetSpec::new("vm", "mock")], vec![]);
    let mut s = session(RunConfig::default(), book, registry);

    let mut gpu = lisa_test("test_cuda", "gpu", 1, &[]);
    gpu["metadata"]["features"] = serde_json::json!(["gpu"]);
    let tests = validate_catalog(catalog(vec![
        lisa_test("test_ping", "network", 1, &[]),
        gpu,
        lisa_test("test_fio", "storage", 1, &[]),
    ]))
    .unwrap();

    let reports = s.execute(s.plan(&tests), &RecordingExecutor::new()).await;

    // test_ping's target lacks "gpu", so test_cuda gets a new one; test_fio
    // takes the first target that fits, which is still the first one.
    assert_eq!(mock.constructed(), 2);
    assert_ne!(reports[0].target_id, reports[1].target_id);
    assert_eq!(reports[0].target_id, reports[2].target_id);

    let report = s.teardown().await.unwrap();
    assert_eq!(report.deprovisioned.len(), 2);
}
