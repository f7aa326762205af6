//! The session-wide target pool.
//!
//! The pool holds every target created during a run and answers one
//! question: given a platform kind, parameters, and required
//! capabilities, which target should this test use?
//!
//! Matching is first-fit in insertion order. The first target with the
//! same platform, equal parameters and a capability superset is reused;
//! otherwise a new one is constructed and appended. A less capable target
//! created earlier can therefore be reused while a more capable one sits
//! idle, which is accepted in exchange for deterministic reuse.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use lisa_id::TargetId;
use lisa_playbook::Parameters;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::platform::PlatformRegistry;
use crate::target::{Target, TargetLease};

/// Pool errors.
#[derive(Debug, Error)]
pub enum PoolError {
    /// No platform is registered under this kind.
    #[error("unknown platform '{platform}' (registered: {registered})")]
    UnknownPlatform {
        platform: String,
        registered: String,
    },

    /// The platform failed to provision a target.
    #[error("failed to construct target on platform '{platform}': {source}")]
    Construct {
        platform: String,
        #[source]
        source: anyhow::Error,
    },

    /// The platform failed to delete a target.
    #[error("failed to deprovision target {target_id}: {source}")]
    Deprovision {
        target_id: TargetId,
        #[source]
        source: anyhow::Error,
    },
}

impl PoolError {
    /// Returns true for errors caused by configuration, not resources.
    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::UnknownPlatform { .. })
    }
}

/// Outcome of tearing the pool down.
#[derive(Debug, Default)]
pub struct TeardownReport {
    /// Targets that were deleted.
    pub deprovisioned: Vec<TargetId>,

    /// Targets left running because targets are kept.
    pub kept: Vec<TargetId>,

    /// Targets whose deletion failed.
    pub failures: Vec<PoolError>,
}

impl TeardownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Serializes construction per `(platform, parameters)` shape.
type SlotKey = (String, String);

/// Targets created during one run.
pub struct TargetPool {
    registry: PlatformRegistry,

    /// Targets in creation order. Only held while scanning or appending.
    targets: Mutex<Vec<Arc<Target>>>,

    /// One construction lock per request shape. Held across construction
    /// so concurrent resolvers cannot both allocate for the same
    /// `(platform, parameters)`, while reuse and other shapes proceed.
    slots: Mutex<HashMap<SlotKey, Arc<Mutex<()>>>>,

    /// Skip deprovisioning at teardown.
    keep_targets: bool,
}

impl TargetPool {
    pub fn new(registry: PlatformRegistry, keep_targets: bool) -> Self {
        Self {
            registry,
            targets: Mutex::new(Vec::new()),
            slots: Mutex::new(HashMap::new()),
            keep_targets,
        }
    }

    /// Find or create a target for the request and lease it.
    pub async fn resolve(
        &self,
        platform: &str,
        parameters: &Parameters,
        required: &BTreeSet<String>,
    ) -> Result<TargetLease, PoolError> {
        let provider = self
            .registry
            .get(platform)
            .ok_or_else(|| PoolError::UnknownPlatform {
                platform: platform.to_string(),
                registered: self.registry.kinds().join(", "),
            })?;

        if let Some(lease) = self.reuse(platform, parameters, required).await {
            return Ok(lease);
        }

        let slot = self.slot(platform, parameters).await;
        let _constructing = slot.lock().await;

        // Another resolver for the same shape may have finished while we
        // waited on the slot.
        if let Some(lease) = self.reuse(platform, parameters, required).await {
            return Ok(lease);
        }

        let target = provider
            .construct(parameters, required)
            .await
            .map_err(|source| PoolError::Construct {
                platform: platform.to_string(),
                source,
            })?;

        if !target.satisfies(platform, parameters, required) {
            return Err(PoolError::Construct {
                platform: platform.to_string(),
                source: anyhow::anyhow!(
                    "platform returned target {} that does not match the request",
                    target.id()
                ),
            });
        }

        let target = Arc::new(target);
        let mut targets = self.targets.lock().await;
        targets.push(Arc::clone(&target));
        info!(
            target_id = %target.id(),
            platform = %platform,
            handle = %target.handle(),
            pool_size = targets.len(),
            "Created target"
        );

        Ok(TargetLease::acquire(target))
    }

    /// First-fit scan over existing targets.
    async fn reuse(
        &self,
        platform: &str,
        parameters: &Parameters,
        required: &BTreeSet<String>,
    ) -> Option<TargetLease> {
        let targets = self.targets.lock().await;
        let existing = targets
            .iter()
            .find(|t| t.satisfies(platform, parameters, required))?;

        info!(
            target_id = %existing.id(),
            platform = %platform,
            "Reusing target"
        );
        Some(TargetLease::acquire(Arc::clone(existing)))
    }

    async fn slot(&self, platform: &str, parameters: &Parameters) -> Arc<Mutex<()>> {
        // Parameters is a BTreeMap, so the JSON form is canonical.
        let shape = serde_json::to_string(parameters).unwrap_or_default();
        let mut slots = self.slots.lock().await;
        Arc::clone(
            slots
                .entry((platform.to_string(), shape))
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }

    /// Number of targets in the pool.
    pub async fn len(&self) -> usize {
        self.targets.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.targets.lock().await.is_empty()
    }

    /// Current targets in creation order.
    pub async fn snapshot(&self) -> Vec<Arc<Target>> {
        self.targets.lock().await.clone()
    }

    /// Drop every target, deprovisioning each unless targets are kept.
    ///
    /// A failure to delete one target is logged and recorded; the
    /// remaining targets are still attempted. Calling this again after
    /// the pool is drained does nothing.
    pub async fn teardown(&self) -> TeardownReport {
        let targets = std::mem::take(&mut *self.targets.lock().await);
        let mut report = TeardownReport::default();

        for target in targets {
            info!(
                target_id = %target.id(),
                features = ?target.capabilities(),
                parameters = ?target.parameters(),
                "Releasing target"
            );

            if target.connection().is_open() {
                warn!(target_id = %target.id(), "Target still leased at teardown");
            }

            if self.keep_targets {
                info!(target_id = %target.id(), handle = %target.handle(), "Keeping target");
                report.kept.push(target.id());
                continue;
            }

            let Some(provider) = self.registry.get(target.platform()) else {
                let err = PoolError::UnknownPlatform {
                    platform: target.platform().to_string(),
                    registered: self.registry.kinds().join(", "),
                };
                error!(target_id = %target.id(), error = %err, "Cannot deprovision target");
                report.failures.push(err);
                continue;
            };

            match provider.deprovision(&target).await {
                Ok(()) => report.deprovisioned.push(target.id()),
                Err(source) => {
                    let err = PoolError::Deprovision {
                        target_id: target.id(),
                        source,
                    };
                    error!(error = %err, "Failed to deprovision target");
                    report.failures.push(err);
                }
            }
        }

        report
    }
}

impl std::fmt::Debug for TargetPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetPool")
            .field("registry", &self.registry)
            .field("keep_targets", &self.keep_targets)
            .finish_non_exhaustive()
    }
}
