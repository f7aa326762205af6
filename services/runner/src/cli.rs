//! Command-line interface.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::config::RunConfig;
use crate::platform::MOCK_PLATFORM;

/// Select tests from a catalog and run them against pooled targets.
#[derive(Debug, Parser)]
#[command(name = "lisa")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Test catalog produced by the host engine (JSON array).
    #[arg(long, env = "LISA_TESTS")]
    pub tests: PathBuf,

    /// Playbook with targets and selection criteria.
    #[arg(long, env = "LISA_PLAYBOOK")]
    pub playbook: Option<PathBuf>,

    /// Keep provisioned targets after the run.
    #[arg(long, env = "LISA_KEEP_VMS")]
    pub keep_vms: bool,

    /// Run static checks only (flake8, mypy markers).
    #[arg(long)]
    pub check: bool,

    /// Human-readable logs and a report written to demo.json.
    #[arg(long)]
    pub demo: bool,

    /// Platform of the implicit target when the playbook lists none.
    #[arg(long, env = "LISA_DEFAULT_PLATFORM", default_value = MOCK_PLATFORM)]
    pub default_platform: String,

    /// Maximum number of invocations in flight.
    #[arg(short, long, default_value_t = 1)]
    pub jobs: usize,

    /// Per-invocation time limit in seconds.
    #[arg(long)]
    pub test_timeout_secs: Option<u64>,

    /// Write the run report as JSON to this path.
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Log level when RUST_LOG is unset.
    #[arg(long, env = "LISA_LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Cli {
    pub fn into_config(self) -> RunConfig {
        RunConfig {
            playbook: self.playbook,
            keep_targets: self.keep_vms,
            check: self.check,
            demo: self.demo,
            default_platform: self.default_platform,
            jobs: self.jobs,
            test_timeout: self.test_timeout_secs.map(Duration::from_secs),
            report_path: self.report,
            log_level: self.log_level,
        }
    }
}
