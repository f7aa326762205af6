//! One orchestration run.
//!
//! A session owns the playbook and the target pool for its lifetime:
//!
//! 1. `Session::new` loads and validates the playbook and checks every
//!    target spec names a registered platform. Nothing is provisioned.
//! 2. `Session::run` validates the discovered tests, selects, plans one
//!    invocation per (test, target spec), executes, then tears down.
//! 3. `Session::teardown` releases the pool exactly once.

use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use lisa_id::RunId;
use lisa_playbook::{Playbook, PlaybookError, TargetSpec};
use lisa_selection::{select, validate_catalog, CatalogEntry, DropReason, Selection, TestCase};
use thiserror::Error;
use tracing::{error, info, warn};

use crate::config::{RunConfig, CHECK_MARKERS};
use crate::executor::{Invocation, TestExecutor, Verdict};
use crate::platform::PlatformRegistry;
use crate::pool::{TargetPool, TeardownReport};
use crate::report::{InvocationReport, Outcome, RunReport};
use crate::target::Target;

/// Name of the implicit target used when the playbook declares none.
pub const DEFAULT_TARGET_NAME: &str = "default";

/// Session errors. All of them abort the run before anything runs.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Playbook(#[from] PlaybookError),

    #[error("target '{target}' uses unknown platform '{platform}' (registered: {registered})")]
    UnknownPlatform {
        target: String,
        platform: String,
        registered: String,
    },

    #[error("failed to read test catalog {}: {source}", path.display())]
    CatalogIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed test catalog: {0}")]
    CatalogFormat(#[from] serde_json::Error),

    #[error("session {0} has already been torn down")]
    TornDown(RunId),
}

/// Read the host engine's test catalog (a JSON array of tests).
pub fn load_catalog(path: &Path) -> Result<Vec<CatalogEntry>, SessionError> {
    let contents = std::fs::read_to_string(path).map_err(|source| SessionError::CatalogIo {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&contents)?)
}

pub struct Session {
    run_id: RunId,
    config: RunConfig,
    playbook: Playbook,
    pool: Arc<TargetPool>,
    torn_down: bool,
}

impl Session {
    /// Load the configured playbook and set up an empty pool.
    pub fn new(config: RunConfig, registry: PlatformRegistry) -> Result<Self, SessionError> {
        let playbook = Playbook::load(config.playbook.as_deref())?;
        Self::with_playbook(config, playbook, registry)
    }

    /// Set up a session for an already validated playbook.
    pub fn with_playbook(
        config: RunConfig,
        playbook: Playbook,
        registry: PlatformRegistry,
    ) -> Result<Self, SessionError> {
        let run_id = RunId::new();

        for spec in effective_targets(&playbook, &config) {
            if !registry.contains(&spec.platform) {
                return Err(SessionError::UnknownPlatform {
                    target: spec.name,
                    platform: spec.platform,
                    registered: registry.kinds().join(", "),
                });
            }
        }

        info!(
            run_id = %run_id,
            targets = ?playbook.target_names(),
            criteria = playbook.criteria.len(),
            keep_targets = config.keep_targets,
            check = config.check,
            demo = config.demo,
            "Session initialized"
        );

        let pool = Arc::new(TargetPool::new(registry, config.keep_targets));
        Ok(Self {
            run_id,
            config,
            playbook,
            pool,
            torn_down: false,
        })
    }

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn playbook(&self) -> &Playbook {
        &self.playbook
    }

    pub fn pool(&self) -> &Arc<TargetPool> {
        &self.pool
    }

    /// Target specs tests are parametrized over.
    pub fn target_specs(&self) -> Vec<TargetSpec> {
        effective_targets(&self.playbook, &self.config)
    }

    /// Apply the playbook criteria, then the run-mode filter.
    pub fn select(&self, tests: &[TestCase]) -> Selection {
        let mut selection = select(tests, &self.playbook.criteria);

        if self.config.check {
            let (kept, deselected): (Vec<TestCase>, Vec<TestCase>) = selection
                .tests
                .drain(..)
                .partition(|t| t.has_any_marker(CHECK_MARKERS));

            // Repeats of one test are reported once.
            let mut reported: Vec<&TestCase> = Vec::new();
            for test in &deselected {
                if !reported.contains(&test) {
                    reported.push(test);
                    selection
                        .dropped
                        .push((test.name.clone(), DropReason::Deselected));
                }
            }
            selection.tests = kept;
        }

        info!(
            selected = selection.tests.len(),
            dropped = selection.dropped.len(),
            fell_back = selection.fell_back,
            "Tests selected"
        );
        selection
    }

    /// One invocation per selected test, per target spec when the test
    /// needs a target. Order follows the selection.
    pub fn plan(&self, tests: &[TestCase]) -> Vec<Invocation> {
        let specs = self.target_specs();
        let mut plan = Vec::new();

        for test in tests {
            if test.requires_target {
                for spec in &specs {
                    plan.push(Invocation::new(test.clone(), Some(spec.clone())));
                }
            } else {
                plan.push(Invocation::new(test.clone(), None));
            }
        }

        plan
    }

    /// Execute invocations, at most `jobs` at a time, reporting in plan
    /// order.
    pub async fn execute(
        &self,
        invocations: Vec<Invocation>,
        executor: &dyn TestExecutor,
    ) -> Vec<InvocationReport> {
        stream::iter(invocations)
            .map(|invocation| self.execute_one(invocation, executor))
            .buffered(self.config.jobs())
            .collect()
            .await
    }

    async fn execute_one(
        &self,
        invocation: Invocation,
        executor: &dyn TestExecutor,
    ) -> InvocationReport {
        let started = Instant::now();
        let mut target_id = None;

        let outcome = match &invocation.target {
            None => self.run_body(&invocation, None, executor).await,
            Some(spec) => {
                let required = invocation.test.required_features();
                match self
                    .pool
                    .resolve(&spec.platform, &spec.parameters, &required)
                    .await
                {
                    Ok(lease) => {
                        target_id = Some(lease.id());
                        self.run_body(&invocation, Some(&*lease), executor).await
                    }
                    Err(err) => {
                        warn!(invocation = %invocation.id, error = %err, "No target for invocation");
                        Outcome::Errored {
                            message: err.to_string(),
                        }
                    }
                }
            }
        };

        InvocationReport {
            id: invocation.id.clone(),
            test: invocation.test.name.clone(),
            target: invocation.target.as_ref().map(|t| t.name.clone()),
            target_id,
            outcome,
            duration_ms: millis(started.elapsed()),
        }
    }

    async fn run_body(
        &self,
        invocation: &Invocation,
        target: Option<&Target>,
        executor: &dyn TestExecutor,
    ) -> Outcome {
        let body = AssertUnwindSafe(executor.execute(invocation, target)).catch_unwind();

        let result = match self.config.test_timeout {
            Some(limit) => match tokio::time::timeout(limit, body).await {
                Ok(result) => result,
                Err(_) => {
                    warn!(invocation = %invocation.id, ?limit, "Invocation timed out");
                    return Outcome::Errored {
                        message: format!("timed out after {limit:?}"),
                    };
                }
            },
            None => body.await,
        };

        match result {
            Ok(Ok(Verdict::Passed)) => Outcome::Passed,
            Ok(Ok(Verdict::Failed(message))) => Outcome::Failed { message },
            Ok(Ok(Verdict::Skipped(reason))) => Outcome::Skipped { reason },
            Ok(Err(err)) => Outcome::Errored {
                message: format!("{err:#}"),
            },
            Err(_) => {
                error!(invocation = %invocation.id, "Test body panicked");
                Outcome::Errored {
                    message: "test body panicked".to_string(),
                }
            }
        }
    }

    /// Validate, select, plan, execute and tear down.
    ///
    /// If any test's metadata is invalid the whole candidate set is
    /// discarded and the report names the offending test.
    pub async fn run(
        &mut self,
        catalog: Vec<CatalogEntry>,
        executor: &dyn TestExecutor,
    ) -> Result<RunReport, SessionError> {
        if self.torn_down {
            return Err(SessionError::TornDown(self.run_id));
        }

        let tests = match validate_catalog(catalog) {
            Ok(tests) => tests,
            Err(err) => {
                error!(test = %err.test_name(), error = %err, "Discarding all tests");
                let mut report = RunReport::discarded(self.run_id, err.to_string());
                let teardown = self.teardown().await?;
                report.finish(&teardown);
                return Ok(report);
            }
        };

        let mut report = RunReport::new(self.run_id);
        let selection = self.select(&tests);
        report.record_selection(&selection);

        let plan = self.plan(&selection.tests);
        info!(invocations = plan.len(), "Executing plan");
        report.invocations = self.execute(plan, executor).await;

        let teardown = self.teardown().await?;
        report.finish(&teardown);

        let counts = report.counts();
        info!(
            run_id = %self.run_id,
            passed = counts.passed,
            failed = counts.failed,
            errored = counts.errored,
            skipped = counts.skipped,
            "Run complete"
        );
        Ok(report)
    }

    /// Release every target in the pool. Only the first call does work.
    pub async fn teardown(&mut self) -> Result<TeardownReport, SessionError> {
        if self.torn_down {
            return Err(SessionError::TornDown(self.run_id));
        }
        self.torn_down = true;

        let report = self.pool.teardown().await;
        if !report.is_clean() {
            warn!(failures = report.failures.len(), "Teardown finished with failures");
        }
        Ok(report)
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.torn_down {
            warn!(run_id = %self.run_id, "Session dropped without teardown");
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("run_id", &self.run_id)
            .field("playbook", &self.playbook)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}

fn effective_targets(playbook: &Playbook, config: &RunConfig) -> Vec<TargetSpec> {
    if playbook.targets.is_empty() {
        vec![TargetSpec::new(
            DEFAULT_TARGET_NAME,
            config.default_platform.as_str(),
        )]
    } else {
        playbook.targets.clone()
    }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(elapsed: Duration) -> u64 {
    u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX)
}
