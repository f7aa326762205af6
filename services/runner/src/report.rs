//! Run reports.

use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use lisa_id::{RunId, TargetId};
use lisa_selection::{DropReason, Selection};
use serde::Serialize;

use crate::pool::TeardownReport;

/// Report title.
pub const REPORT_TITLE: &str = "LISAv3 Results";

/// Final state of one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Outcome {
    Passed,
    Failed { message: String },
    /// The invocation never reached a verdict: no target, timeout, or an
    /// executor error.
    Errored { message: String },
    Skipped { reason: String },
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. } | Self::Errored { .. })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InvocationReport {
    pub id: String,
    pub test: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_id: Option<TargetId>,

    pub outcome: Outcome,
    pub duration_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DroppedTest {
    pub name: String,
    pub reason: DropReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TeardownSummary {
    pub deprovisioned: usize,
    pub kept: usize,
    pub failures: Vec<String>,
}

impl From<&TeardownReport> for TeardownSummary {
    fn from(report: &TeardownReport) -> Self {
        Self {
            deprovisioned: report.deprovisioned.len(),
            kept: report.kept.len(),
            failures: report.failures.iter().map(|e| e.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
}

impl Counts {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.errored + self.skipped
    }
}

/// Everything that happened in one run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub title: String,
    pub run_id: RunId,
    pub started_at: DateTime<Utc>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,

    pub invocations: Vec<InvocationReport>,
    pub dropped: Vec<DroppedTest>,

    /// Why the run executed nothing, when the candidate set was discarded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub teardown: Option<TeardownSummary>,
}

impl RunReport {
    pub fn new(run_id: RunId) -> Self {
        Self {
            title: REPORT_TITLE.to_string(),
            run_id,
            started_at: Utc::now(),
            finished_at: None,
            invocations: Vec::new(),
            dropped: Vec::new(),
            diagnostic: None,
            teardown: None,
        }
    }

    /// A report for a run whose candidate tests were all discarded.
    pub fn discarded(run_id: RunId, diagnostic: impl Into<String>) -> Self {
        let mut report = Self::new(run_id);
        report.diagnostic = Some(diagnostic.into());
        report.finished_at = Some(Utc::now());
        report
    }

    pub fn record_selection(&mut self, selection: &Selection) {
        self.dropped = selection
            .dropped
            .iter()
            .map(|(name, reason)| DroppedTest {
                name: name.clone(),
                reason: *reason,
            })
            .collect();
    }

    pub fn finish(&mut self, teardown: &TeardownReport) {
        self.teardown = Some(TeardownSummary::from(teardown));
        self.finished_at = Some(Utc::now());
    }

    pub fn counts(&self) -> Counts {
        let mut counts = Counts::default();
        for invocation in &self.invocations {
            match invocation.outcome {
                Outcome::Passed => counts.passed += 1,
                Outcome::Failed { .. } => counts.failed += 1,
                Outcome::Errored { .. } => counts.errored += 1,
                Outcome::Skipped { .. } => counts.skipped += 1,
            }
        }
        counts
    }

    /// True when nothing failed, nothing errored, and the run was not
    /// discarded.
    pub fn is_success(&self) -> bool {
        self.diagnostic.is_none() && self.invocations.iter().all(|i| !i.outcome.is_failure())
    }

    /// Plain-text summary lines.
    pub fn summary_lines(&self, failures_only: bool) -> Vec<String> {
        let mut lines = Vec::new();

        if let Some(diagnostic) = &self.diagnostic {
            lines.push(format!("no tests executed: {diagnostic}"));
            return lines;
        }

        for invocation in &self.invocations {
            let line = match &invocation.outcome {
                Outcome::Passed if !failures_only => format!("PASSED  {}", invocation.id),
                Outcome::Skipped { reason } if !failures_only => {
                    format!("SKIPPED {} ({reason})", invocation.id)
                }
                Outcome::Failed { message } => format!("FAILED  {} - {message}", invocation.id),
                Outcome::Errored { message } => format!("ERROR   {} - {message}", invocation.id),
                _ => continue,
            };
            lines.push(line);
        }

        if let Some(teardown) = &self.teardown {
            for failure in &teardown.failures {
                lines.push(format!("TEARDOWN {failure}"));
            }
        }

        let counts = self.counts();
        lines.push(format!(
            "{} passed, {} failed, {} errors, {} skipped, {} deselected",
            counts.passed,
            counts.failed,
            counts.errored,
            counts.skipped,
            self.dropped.len()
        ));
        lines
    }

    /// Write the report as pretty JSON.
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write report to {}", path.display()))
    }
}
