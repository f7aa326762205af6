//! LISA test orchestration core.
//!
//! Decides which discovered tests run, how often and in what order, and
//! provides each target-backed test with a suitable target drawn from a
//! pool of reusable targets.
//!
//! ## Layout
//!
//! - **Session**: one run from playbook to teardown
//! - **Pool**: first-fit target reuse and best-effort teardown
//! - **Platform**: pluggable target provisioning (mock built in)
//! - **Executor**: seam to the host engine that runs test bodies
//! - **Report**: per-invocation outcomes and the run summary

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod logging;
pub mod platform;
pub mod pool;
pub mod report;
pub mod session;
pub mod target;

pub use config::RunConfig;
pub use executor::{DryRunExecutor, Invocation, TestExecutor, Verdict};
pub use platform::{MockPlatform, Platform, PlatformRegistry, MOCK_PLATFORM};
pub use pool::{PoolError, TargetPool, TeardownReport};
pub use report::{Outcome, RunReport};
pub use session::{load_catalog, Session, SessionError, DEFAULT_TARGET_NAME};
pub use target::{Target, TargetLease};
