//! Targets and scoped connection leases.

use std::collections::BTreeSet;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use lisa_id::TargetId;
use lisa_playbook::Parameters;
use tracing::debug;

/// Connection state of a target.
///
/// Opened when a lease is taken and closed when the lease is dropped.
#[derive(Debug, Default)]
pub struct Connection {
    active: AtomicUsize,
    opened: AtomicU64,
}

impl Connection {
    fn open(&self) {
        self.active.fetch_add(1, Ordering::SeqCst);
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.active.fetch_sub(1, Ordering::SeqCst);
    }

    /// Whether any lease currently holds the connection.
    pub fn is_open(&self) -> bool {
        self.active.load(Ordering::SeqCst) > 0
    }

    /// Number of leases that have opened this connection.
    pub fn times_opened(&self) -> u64 {
        self.opened.load(Ordering::SeqCst)
    }
}

/// A provisioned remote resource.
#[derive(Debug)]
pub struct Target {
    id: TargetId,
    platform: String,
    parameters: Parameters,
    capabilities: BTreeSet<String>,
    /// Platform-side name of the resource, e.g. a VM name.
    handle: String,
    connection: Connection,
}

impl Target {
    pub fn new(
        platform: impl Into<String>,
        parameters: Parameters,
        capabilities: BTreeSet<String>,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            id: TargetId::new(),
            platform: platform.into(),
            parameters,
            capabilities,
            handle: handle.into(),
            connection: Connection::default(),
        }
    }

    pub fn id(&self) -> TargetId {
        self.id
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    pub fn capabilities(&self) -> &BTreeSet<String> {
        &self.capabilities
    }

    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Interchangeability check: same platform, equal parameters, and
    /// every required capability provided.
    pub fn satisfies(
        &self,
        platform: &str,
        parameters: &Parameters,
        required: &BTreeSet<String>,
    ) -> bool {
        self.platform == platform
            && &self.parameters == parameters
            && self.capabilities.is_superset(required)
    }
}

/// A target handed to one test invocation.
///
/// Holding the lease keeps the connection open. Dropping it closes the
/// connection on every exit path, including unwinding and cancellation
/// of the future that owns it; the target itself stays in the pool.
#[derive(Debug)]
pub struct TargetLease {
    target: Arc<Target>,
}

impl TargetLease {
    pub(crate) fn acquire(target: Arc<Target>) -> Self {
        target.connection.open();
        debug!(target_id = %target.id, handle = %target.handle, "Connection opened");
        Self { target }
    }

    pub fn target(&self) -> &Arc<Target> {
        &self.target
    }
}

impl Deref for TargetLease {
    type Target = Target;

    fn deref(&self) -> &Target {
        &self.target
    }
}

impl Drop for TargetLease {
    fn drop(&mut self) {
        self.target.connection.close();
        debug!(target_id = %self.target.id, "Connection closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn target() -> Target {
        let mut parameters = Parameters::new();
        parameters.insert("image".to_string(), "ubuntu".into());
        Target::new("mock", parameters, features(&["gpu", "sriov"]), "vm-0")
    }

    #[test]
    fn test_satisfies() {
        let t = target();
        let params = t.parameters().clone();

        assert!(t.satisfies("mock", &params, &features(&[])));
        assert!(t.satisfies("mock", &params, &features(&["gpu"])));
        assert!(t.satisfies("mock", &params, &features(&["gpu", "sriov"])));
        assert!(!t.satisfies("mock", &params, &features(&["infiniband"])));
        assert!(!t.satisfies("azure", &params, &features(&[])));
        assert!(!t.satisfies("mock", &Parameters::new(), &features(&[])));
    }

    #[test]
    fn test_lease_closes_on_drop() {
        let t = Arc::new(target());
        {
            let lease = TargetLease::acquire(Arc::clone(&t));
            assert!(lease.connection().is_open());
        }
        assert!(!t.connection().is_open());
        assert_eq!(t.connection().times_opened(), 1);
    }

    #[test]
    fn test_lease_closes_on_panic() {
        let t = Arc::new(target());
        let leased = Arc::clone(&t);
        let result = std::panic::catch_unwind(move || {
            let _lease = TargetLease::acquire(leased);
            panic!("test body failed");
        });
        assert!(result.is_err());
        assert!(!t.connection().is_open());
    }
}
