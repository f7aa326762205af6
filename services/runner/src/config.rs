//! Run configuration.

use std::path::PathBuf;
use std::time::Duration;

use crate::platform::MOCK_PLATFORM;

/// Report file written in demo mode unless another path is given.
pub const DEMO_REPORT_PATH: &str = "demo.json";

/// Markers selected by check mode.
pub const CHECK_MARKERS: &[&str] = &["flake8", "mypy"];

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Playbook location. `None` runs with the empty playbook.
    pub playbook: Option<PathBuf>,

    /// Leave provisioned targets running after the run.
    pub keep_targets: bool,

    /// Semantic-analysis-only mode: run only static check tests.
    pub check: bool,

    /// Demo mode: human-readable logs and a report file.
    pub demo: bool,

    /// Platform of the implicit target used when the playbook lists none.
    pub default_platform: String,

    /// Maximum number of invocations in flight.
    pub jobs: usize,

    /// Per-invocation time limit.
    pub test_timeout: Option<Duration>,

    /// Where to write the run report, if anywhere.
    pub report_path: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            playbook: None,
            keep_targets: false,
            check: false,
            demo: false,
            default_platform: MOCK_PLATFORM.to_string(),
            jobs: 1,
            test_timeout: None,
            report_path: None,
            log_level: "info".to_string(),
        }
    }
}

impl RunConfig {
    /// Report destination after applying mode defaults.
    pub fn effective_report_path(&self) -> Option<PathBuf> {
        match (&self.report_path, self.demo) {
            (Some(path), _) => Some(path.clone()),
            (None, true) => Some(PathBuf::from(DEMO_REPORT_PATH)),
            (None, false) => None,
        }
    }

    /// Whether the summary lists only failures and errors.
    pub fn failures_only(&self) -> bool {
        self.check
    }

    pub fn jobs(&self) -> usize {
        self.jobs.max(1)
    }
}
