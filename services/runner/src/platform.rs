//! Platform interface, registry, and the mock platform.
//!
//! A platform knows how to bring a target into existence and how to get
//! rid of it. The pool only ever talks to platforms through this trait:
//! - `construct`: provision a target with the given parameters
//! - `deprovision`: delete it at teardown
//!
//! The mock platform is provided for tests, demos and dry runs.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use lisa_playbook::Parameters;
use tracing::{debug, info};

use crate::target::Target;

/// Platform kind of the built-in mock platform.
pub const MOCK_PLATFORM: &str = "mock";

/// One kind of target provider (a cloud, a hypervisor, ...).
#[async_trait]
pub trait Platform: Send + Sync {
    /// Provision a target providing at least `features`.
    async fn construct(&self, parameters: &Parameters, features: &BTreeSet<String>)
        -> Result<Target>;

    /// Delete a target this platform constructed.
    async fn deprovision(&self, target: &Target) -> Result<()>;
}

/// Platforms keyed by platform kind.
#[derive(Clone, Default)]
pub struct PlatformRegistry {
    platforms: BTreeMap<String, Arc<dyn Platform>>,
}

impl PlatformRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with the built-in platforms.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register(MOCK_PLATFORM, Arc::new(MockPlatform::new()));
        registry
    }

    /// Register `platform` under `kind`, replacing any previous entry.
    pub fn register(&mut self, kind: impl Into<String>, platform: Arc<dyn Platform>) {
        self.platforms.insert(kind.into(), platform);
    }

    pub fn get(&self, kind: &str) -> Option<Arc<dyn Platform>> {
        self.platforms.get(kind).cloned()
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.platforms.contains_key(kind)
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.platforms.keys().map(String::as_str).collect()
    }
}

impl std::fmt::Debug for PlatformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlatformRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

/// In-process platform that only records what it was asked to do.
pub struct MockPlatform {
    /// Kind stamped on constructed targets.
    kind: String,

    /// Counter for generating resource handles.
    constructed: AtomicU64,
    deprovisioned: AtomicU64,

    /// Whether construction should fail.
    fail_construct: bool,

    /// Whether deprovisioning should fail.
    fail_deprovision: bool,
}

impl MockPlatform {
    pub fn new() -> Self {
        Self::with_kind(MOCK_PLATFORM)
    }

    /// A mock platform registered under another kind.
    pub fn with_kind(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            constructed: AtomicU64::new(0),
            deprovisioned: AtomicU64::new(0),
            fail_construct: false,
            fail_deprovision: false,
        }
    }

    /// A mock platform whose construction always fails.
    pub fn failing() -> Self {
        Self::new().with_failing_construct()
    }

    pub fn with_failing_construct(mut self) -> Self {
        self.fail_construct = true;
        self
    }

    pub fn with_failing_deprovision(mut self) -> Self {
        self.fail_deprovision = true;
        self
    }

    pub fn constructed(&self) -> u64 {
        self.constructed.load(Ordering::SeqCst)
    }

    pub fn deprovisioned(&self) -> u64 {
        self.deprovisioned.load(Ordering::SeqCst)
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Platform for MockPlatform {
    async fn construct(
        &self,
        parameters: &Parameters,
        features: &BTreeSet<String>,
    ) -> Result<Target> {
        if self.fail_construct {
            anyhow::bail!("Mock platform configured to fail");
        }

        let n = self.constructed.fetch_add(1, Ordering::SeqCst);
        let handle = format!("mock-vm-{n:04}");
        info!(
            platform = %self.kind,
            handle = %handle,
            features = ?features,
            "[MOCK] Provisioning target"
        );

        Ok(Target::new(
            self.kind.as_str(),
            parameters.clone(),
            features.clone(),
            handle,
        ))
    }

    async fn deprovision(&self, target: &Target) -> Result<()> {
        if self.fail_deprovision {
            anyhow::bail!("Mock platform failed to delete {}", target.handle());
        }

        self.deprovisioned.fetch_add(1, Ordering::SeqCst);
        debug!(
            target_id = %target.id(),
            handle = %target.handle(),
            "[MOCK] Target deleted"
        );
        Ok(())
    }
}
