//! Per-bridge directory of live service handles.

use crate::binding::driver::DriverRegistration;
use crate::binding::driver_registry::DriverRegistry;
use crate::binding::lifecycle_binding::{
    bind_driver, bind_handle, release_driver, unbind_handle, BindReport,
};
use crate::control_plane::service_handle::{BindingState, ServiceHandle};
use crate::error::BridgeError;
use crate::observability::{events, fields};
use arc_swap::ArcSwap;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const COMPONENT: &str = "handle_registry";

type Snapshot = Arc<Vec<Arc<ServiceHandle>>>;

struct RegistryState {
    handles: BTreeMap<u32, Arc<ServiceHandle>>,
}

/// Result of a successful [`HandleRegistry::create`].
#[derive(Debug)]
pub struct CreatedHandle {
    pub handle: Arc<ServiceHandle>,
    pub binding: BindReport,
}

/// Owns the live [`ServiceHandle`]s of one bridge, keyed by port.
///
/// Mutations (create, destroy, destroy_all and driver (un)binding) are
/// serialized by one async mutex and may await driver callbacks while holding
/// it. Lookups never take that mutex: they read an immutable snapshot that is
/// republished after every mutation.
pub struct HandleRegistry {
    bridge: String,
    drivers: Arc<DriverRegistry>,
    state: Mutex<RegistryState>,
    snapshot: ArcSwap<Vec<Arc<ServiceHandle>>>,
    closed: AtomicBool,
}

impl HandleRegistry {
    /// Creates a registry and attaches it to `drivers` for matching.
    pub fn new(bridge: &str, drivers: Arc<DriverRegistry>) -> Arc<Self> {
        let registry = Arc::new(Self {
            bridge: bridge.to_string(),
            drivers: drivers.clone(),
            state: Mutex::new(RegistryState {
                handles: BTreeMap::new(),
            }),
            snapshot: ArcSwap::from_pointee(Vec::new()),
            closed: AtomicBool::new(false),
        });
        drivers.attach(&registry);
        registry
    }

    pub fn bridge(&self) -> &str {
        &self.bridge
    }

    /// `true` once [`HandleRegistry::destroy_all`] has run.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn publish(&self, state: &RegistryState) {
        self.snapshot
            .store(Arc::new(state.handles.values().cloned().collect()));
    }

    pub async fn create(
        &self,
        node: u32,
        port: u32,
        service: u16,
        instance: u16,
    ) -> Result<CreatedHandle, BridgeError> {
        let mut state = self.state.lock().await;

        if self.is_closed() {
            debug!(
                event = events::HANDLE_CREATE_AFTER_SHUTDOWN,
                component = COMPONENT,
                bridge = %self.bridge,
                node,
                port,
                "registry closed, ignoring create"
            );
            return Err(BridgeError::ShutDown);
        }

        if let Some(existing) = state.handles.get(&port) {
            warn!(
                event = events::HANDLE_CREATE_DUPLICATE,
                component = COMPONENT,
                bridge = %self.bridge,
                existing = %fields::format_handle(existing),
                node,
                port,
                "service handle already exists for port"
            );
            return Err(BridgeError::AlreadyExists { port });
        }

        let handle = Arc::new(ServiceHandle::new(
            &self.bridge,
            node,
            port,
            service,
            instance,
        ));
        state.handles.insert(port, handle.clone());
        self.publish(&state);

        info!(
            event = events::HANDLE_CREATED,
            component = COMPONENT,
            bridge = %self.bridge,
            handle = %fields::format_handle(&handle),
            modalias = %handle.modalias(),
            "service handle created"
        );

        let drivers = self.drivers.snapshot();
        let binding = bind_handle(&handle, &drivers).await;

        Ok(CreatedHandle { handle, binding })
    }

    /// Destroys the handle for `port`. Returns `false`, without touching the
    /// registry, when no such handle is live.
    pub async fn destroy(&self, port: u32) -> bool {
        let mut state = self.state.lock().await;

        let Some(handle) = state.handles.get(&port).cloned() else {
            debug!(
                event = events::HANDLE_DESTROY_NOT_FOUND,
                component = COMPONENT,
                bridge = %self.bridge,
                port,
                "no service handle for port"
            );
            return false;
        };

        unbind_handle(&handle).await;
        state.handles.remove(&port);
        self.publish(&state);
        handle.set_binding(BindingState::Released);

        info!(
            event = events::HANDLE_DESTROYED,
            component = COMPONENT,
            bridge = %self.bridge,
            handle = %fields::format_handle(&handle),
            "service handle destroyed"
        );
        true
    }

    /// Unbinds and releases every handle and refuses all later creates.
    pub async fn destroy_all(&self) -> usize {
        let mut state = self.state.lock().await;
        self.closed.store(true, Ordering::Release);

        let handles = std::mem::take(&mut state.handles);
        self.publish(&state);
        self.drivers.detach(self);

        for handle in handles.values() {
            unbind_handle(handle).await;
            handle.set_binding(BindingState::Released);
        }

        info!(
            event = events::HANDLE_DESTROY_ALL,
            component = COMPONENT,
            bridge = %self.bridge,
            destroyed = handles.len(),
            "all service handles destroyed"
        );
        handles.len()
    }

    pub fn find_by_port(&self, port: u32) -> Option<Arc<ServiceHandle>> {
        let snapshot = self.snapshot.load();
        snapshot
            .binary_search_by_key(&port, |handle| handle.port())
            .ok()
            .map(|index| snapshot[index].clone())
    }

    /// Lazily yields the handles accepted by `predicate`, in port order.
    ///
    /// The iterator walks the snapshot current at the time of the call, so
    /// concurrent mutations neither duplicate nor skip entries. Call again to
    /// observe later state.
    pub fn find_all_matching<P>(&self, predicate: P) -> Handles<P>
    where
        P: FnMut(&ServiceHandle) -> bool,
    {
        Handles {
            snapshot: self.snapshot.load_full(),
            next: 0,
            predicate,
        }
    }

    pub(crate) async fn bind_new_driver(&self, registration: &Arc<DriverRegistration>) -> BindReport {
        let state = self.state.lock().await;
        if self.is_closed() {
            return BindReport::default();
        }
        bind_driver(state.handles.values().cloned(), registration).await
    }

    pub(crate) async fn release_driver(&self, registration: &Arc<DriverRegistration>) -> usize {
        let state = self.state.lock().await;
        release_driver(state.handles.values().cloned(), registration).await
    }
}

/// Iterator returned by [`HandleRegistry::find_all_matching`].
pub struct Handles<P> {
    snapshot: Snapshot,
    next: usize,
    predicate: P,
}

impl<P> Iterator for Handles<P>
where
    P: FnMut(&ServiceHandle) -> bool,
{
    type Item = Arc<ServiceHandle>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(handle) = self.snapshot.get(self.next) {
            self.next += 1;
            if (self.predicate)(handle) {
                return Some(handle.clone());
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.snapshot.len() - self.next))
    }
}

#[cfg(test)]
mod tests {
    use super::HandleRegistry;
    use crate::binding::driver::{DriverRegistration, QrtrDriver};
    use crate::binding::driver_registry::DriverRegistry;
    use crate::binding::matcher::ServiceId;
    use crate::control_plane::service_handle::ServiceHandle;
    use crate::error::{BridgeError, ProbeError};
    use async_trait::async_trait;
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex as StdMutex};

    #[derive(Default)]
    struct RecordingDriver {
        fail_probe: bool,
        calls: StdMutex<Vec<String>>,
    }

    impl RecordingDriver {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().expect("lock calls").clone()
        }
    }

    #[async_trait]
    impl QrtrDriver for RecordingDriver {
        async fn probe(&self, handle: Arc<ServiceHandle>) -> Result<(), ProbeError> {
            self.calls
                .lock()
                .expect("lock calls")
                .push(format!("probe {}", handle.name()));
            if self.fail_probe {
                return Err(ProbeError::new("not today"));
            }
            Ok(())
        }

        async fn remove(&self, handle: Arc<ServiceHandle>) {
            assert!(
                !handle.is_released(),
                "remove must run before the handle is released"
            );
            self.calls
                .lock()
                .expect("lock calls")
                .push(format!("remove {}", handle.name()));
        }
    }

    #[derive(Default)]
    struct PanickingDriver {
        removes: AtomicUsize,
    }

    #[async_trait]
    impl QrtrDriver for PanickingDriver {
        async fn probe(&self, _handle: Arc<ServiceHandle>) -> Result<(), ProbeError> {
            Ok(())
        }

        async fn remove(&self, _handle: Arc<ServiceHandle>) {
            self.removes.fetch_add(1, Ordering::SeqCst);
            panic!("remove failed");
        }
    }

    async fn registry_with_panicking_driver() -> (Arc<HandleRegistry>, Arc<PanickingDriver>) {
        let drivers = Arc::new(DriverRegistry::new());
        let registry = HandleRegistry::new("test-bridge", drivers.clone());
        let driver = Arc::new(PanickingDriver::default());
        drivers
            .register(DriverRegistration::new("panicky", vec![], driver.clone()))
            .await;
        (registry, driver)
    }

    fn registry() -> Arc<HandleRegistry> {
        HandleRegistry::new("test-bridge", Arc::new(DriverRegistry::new()))
    }

    #[tokio::test]
    async fn duplicate_create_leaves_existing_handle_untouched() {
        let registry = registry();
        let first = registry.create(1, 10, 7, 3).await.expect("first create");

        let second = registry.create(2, 10, 9, 9).await;

        assert_eq!(second.unwrap_err(), BridgeError::AlreadyExists { port: 10 });
        let live = registry.find_by_port(10).expect("handle for port 10");
        assert_eq!(live.id(), first.handle.id());
        assert_eq!((live.node(), live.service(), live.instance()), (1, 7, 3));
    }

    #[tokio::test]
    async fn destroy_of_unknown_port_is_tolerated() {
        let registry = registry();
        registry.create(1, 10, 7, 3).await.expect("create");

        assert!(!registry.destroy(99).await);
        assert_eq!(registry.len(), 1);
        assert!(registry.find_by_port(10).is_some());
    }

    #[tokio::test]
    async fn destroy_removes_bound_driver_before_release() {
        let drivers = Arc::new(DriverRegistry::new());
        let registry = HandleRegistry::new("test-bridge", drivers.clone());
        let driver = Arc::new(RecordingDriver::default());
        drivers
            .register(DriverRegistration::new(
                "drv",
                vec![ServiceId::new(7, 3)],
                driver.clone(),
            ))
            .await;

        let created = registry.create(1, 10, 7, 3).await.expect("create");
        assert!(created.handle.is_bound());
        assert!(registry.destroy(10).await);

        assert!(created.handle.is_released());
        assert!(registry.find_by_port(10).is_none());
        assert_eq!(driver.calls(), vec!["probe 1-10", "remove 1-10"]);
    }

    #[tokio::test]
    async fn failed_probe_keeps_handle_listed_and_unbound() {
        let drivers = Arc::new(DriverRegistry::new());
        let registry = HandleRegistry::new("test-bridge", drivers.clone());
        let failing = Arc::new(RecordingDriver {
            fail_probe: true,
            ..Default::default()
        });
        drivers
            .register(DriverRegistration::new("failing", vec![], failing))
            .await;

        let created = registry.create(1, 10, 7, 3).await.expect("create");

        assert_eq!(created.binding.probe_failures.len(), 1);
        let handle = registry.find_by_port(10).expect("still listed");
        assert!(!handle.is_bound());
        assert!(!handle.is_released());
    }

    #[tokio::test]
    async fn destroy_all_closes_registry() {
        let registry = registry();
        registry.create(1, 10, 7, 3).await.expect("create");
        registry.create(1, 11, 7, 4).await.expect("create");
        let kept = registry.find_by_port(11).expect("handle");

        assert_eq!(registry.destroy_all().await, 2);

        assert!(registry.is_closed());
        assert!(registry.is_empty());
        assert!(registry.find_by_port(10).is_none());
        assert!(kept.is_released());
        assert_eq!(
            registry.create(1, 12, 7, 3).await.unwrap_err(),
            BridgeError::ShutDown
        );
    }

    #[tokio::test]
    async fn find_all_matching_iterates_a_stable_snapshot() {
        let registry = registry();
        for port in [30, 10, 20] {
            registry.create(1, port, 7, (port / 10) as u16).await.expect("create");
        }

        let mut iter = registry.find_all_matching(|handle| handle.service() == 7);
        let first = iter.next().expect("first");
        registry.create(1, 15, 7, 0).await.expect("create during iteration");
        registry.destroy(20).await;
        let rest: Vec<u32> = iter.map(|handle| handle.port()).collect();

        assert_eq!(first.port(), 10);
        assert_eq!(rest, vec![20, 30]);

        let restarted: Vec<u32> = registry
            .find_all_matching(|_| true)
            .map(|handle| handle.port())
            .collect();
        assert_eq!(restarted, vec![10, 15, 30]);
    }

    #[tokio::test]
    async fn panicking_remove_is_not_retried_by_next_destroy() {
        let (registry, driver) = registry_with_panicking_driver().await;
        let created = registry.create(1, 10, 7, 3).await.expect("create");
        assert!(created.handle.is_bound());

        let first = AssertUnwindSafe(registry.destroy(10)).catch_unwind().await;
        assert!(first.is_err());
        assert!(!created.handle.is_bound());
        assert!(registry.find_by_port(10).is_some());

        assert!(registry.destroy(10).await);
        assert_eq!(driver.removes.load(Ordering::SeqCst), 1);
        assert!(created.handle.is_released());
        assert!(registry.find_by_port(10).is_none());
    }

    #[tokio::test]
    async fn panicking_remove_during_destroy_all_leaves_registry_empty() {
        let (registry, driver) = registry_with_panicking_driver().await;
        registry.create(1, 10, 7, 3).await.expect("create");
        registry.create(1, 11, 7, 4).await.expect("create");

        let outcome = AssertUnwindSafe(registry.destroy_all()).catch_unwind().await;

        assert!(outcome.is_err());
        assert_eq!(driver.removes.load(Ordering::SeqCst), 1);
        assert!(registry.is_closed());
        assert!(registry.is_empty());
        assert!(registry.find_by_port(10).is_none());
        assert!(registry.find_by_port(11).is_none());
    }
}
