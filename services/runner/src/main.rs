//! lisa - test orchestration runner
//!
//! Loads the playbook, selects tests from the host engine's catalog,
//! runs them against pooled targets and tears the pool down.
//!
//! Exit codes: 0 all passed, 1 some invocation failed, 2 the run could
//! not start.

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use lisa_runner::cli::Cli;
use lisa_runner::{error, logging, load_catalog, DryRunExecutor, PlatformRegistry, Session};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let tests_path = cli.tests.clone();
    let config = cli.into_config();

    logging::init(&config.log_level, config.demo)?;
    info!("Starting LISA runner");

    let failures_only = config.failures_only();
    let report_path = config.effective_report_path();

    // Neither step provisions anything, so failures here need no teardown.
    let catalog = match load_catalog(&tests_path) {
        Ok(catalog) => catalog,
        Err(e) => {
            error::print_error(&e.into());
            std::process::exit(2);
        }
    };

    let mut session = match Session::new(config, PlatformRegistry::with_builtin()) {
        Ok(session) => session,
        Err(e) => {
            error::print_error(&e.into());
            std::process::exit(2);
        }
    };

    let report = match session.run(catalog, &DryRunExecutor).await {
        Ok(report) => report,
        Err(e) => {
            error::print_error(&e.into());
            std::process::exit(2);
        }
    };

    if let Some(path) = report_path {
        if let Err(e) = report
            .write_json(&path)
            .with_context(|| format!("failed to write report to {}", path.display()))
        {
            error::print_error(&e);
            std::process::exit(2);
        }
        info!(path = %path.display(), "Report written");
    }

    for line in report.summary_lines(failures_only) {
        println!("{line}");
    }

    if !report.is_success() {
        std::process::exit(1);
    }

    Ok(())
}
