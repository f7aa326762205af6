//! Seam to the host test-execution engine.

use anyhow::Result;
use async_trait::async_trait;
use lisa_playbook::TargetSpec;
use lisa_selection::TestCase;
use tracing::info;

use crate::target::Target;

/// One planned execution of a test, against one target spec if it
/// needs a target.
#[derive(Debug, Clone, PartialEq)]
pub struct Invocation {
    /// `test_name[target_name]` for target-backed tests, else the name.
    pub id: String,
    pub test: TestCase,
    pub target: Option<TargetSpec>,
}

impl Invocation {
    pub fn new(test: TestCase, target: Option<TargetSpec>) -> Self {
        let id = match &target {
            Some(spec) => format!("{}[{}]", test.name, spec.name),
            None => test.name.clone(),
        };
        Self { id, test, target }
    }
}

/// Verdict the host engine returns for a completed invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Passed,
    Failed(String),
    Skipped(String),
}

/// Runs a test body. Implemented by the host engine adapter.
///
/// An `Err` means the invocation could not run to a verdict (setup
/// error, crash) and is reported as errored.
#[async_trait]
pub trait TestExecutor: Send + Sync {
    async fn execute(&self, invocation: &Invocation, target: Option<&Target>) -> Result<Verdict>;
}

/// Executor that runs nothing and passes every invocation.
///
/// Used by the binary to walk a plan end to end (selection, target
/// resolution, teardown) without a host engine attached.
#[derive(Debug, Default)]
pub struct DryRunExecutor;

#[async_trait]
impl TestExecutor for DryRunExecutor {
    async fn execute(&self, invocation: &Invocation, target: Option<&Target>) -> Result<Verdict> {
        match target {
            Some(target) => info!(
                invocation = %invocation.id,
                target_id = %target.id(),
                handle = %target.handle(),
                "[DRY RUN] Executing"
            ),
            None => info!(invocation = %invocation.id, "[DRY RUN] Executing"),
        }
        Ok(Verdict::Passed)
    }
}
