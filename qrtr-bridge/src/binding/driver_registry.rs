//! Explicit registry of drivers, shared by every bridge that should match against them.

use crate::binding::driver::{DriverId, DriverRegistration};
use crate::binding::lifecycle_binding::BindReport;
use crate::control_plane::handle_registry::HandleRegistry;
use crate::error::BridgeError;
use crate::observability::events;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use tracing::{debug, info};

const COMPONENT: &str = "driver_registry";

pub(crate) type DriverSnapshot = Arc<Vec<Arc<DriverRegistration>>>;

/// Set of registered drivers and the handle registries they are matched against.
///
/// Registration changes are serialized among themselves; matching against an
/// individual registry happens under that registry's mutation lock, so a handle
/// is never probed twice for the same appearance.
pub struct DriverRegistry {
    drivers: ArcSwap<Vec<Arc<DriverRegistration>>>,
    registries: Mutex<Vec<Weak<HandleRegistry>>>,
    membership: tokio::sync::Mutex<()>,
}

impl Default for DriverRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self {
            drivers: ArcSwap::from_pointee(Vec::new()),
            registries: Mutex::new(Vec::new()),
            membership: tokio::sync::Mutex::new(()),
        }
    }

    /// Registers a driver and offers it every unbound handle on every attached bridge.
    pub async fn register(&self, registration: DriverRegistration) -> (DriverId, BindReport) {
        let _membership = self.membership.lock().await;
        let registration = Arc::new(registration);
        let id = registration.id();

        self.drivers.rcu(|current| {
            let mut next = Vec::with_capacity(current.len() + 1);
            next.extend(current.iter().cloned());
            next.push(registration.clone());
            next
        });

        info!(
            event = events::DRIVER_REGISTERED,
            component = COMPONENT,
            driver = registration.name(),
            id_table = ?registration.id_table(),
            "driver registered"
        );

        let mut report = BindReport::default();
        for registry in self.live_registries() {
            report.merge(registry.bind_new_driver(&registration).await);
        }

        (id, report)
    }

    /// Unregisters a driver. Every handle bound to it is unbound before this returns.
    pub async fn unregister(&self, id: DriverId) -> Result<(), BridgeError> {
        let _membership = self.membership.lock().await;

        let current = self.drivers.load_full();
        let Some(registration) = current.iter().find(|reg| reg.id() == id).cloned() else {
            return Err(BridgeError::NotFound(format!("driver {id:?}")));
        };

        self.drivers.rcu(|current| {
            current
                .iter()
                .filter(|reg| reg.id() != id)
                .cloned()
                .collect::<Vec<_>>()
        });

        let mut released = 0;
        for registry in self.live_registries() {
            released += registry.release_driver(&registration).await;
        }

        info!(
            event = events::DRIVER_UNREGISTERED,
            component = COMPONENT,
            driver = registration.name(),
            released,
            "driver unregistered"
        );
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.drivers.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn snapshot(&self) -> DriverSnapshot {
        self.drivers.load_full()
    }

    pub(crate) fn attach(&self, registry: &Arc<HandleRegistry>) {
        let mut registries = self.registries.lock();
        registries.retain(|weak| weak.strong_count() > 0);
        registries.push(Arc::downgrade(registry));
        debug!(
            component = COMPONENT,
            bridge = registry.bridge(),
            attached = registries.len(),
            "handle registry attached"
        );
    }

    pub(crate) fn detach(&self, registry: &HandleRegistry) {
        let mut registries = self.registries.lock();
        registries.retain(|weak| {
            weak.upgrade()
                .map(|live| !std::ptr::eq(Arc::as_ptr(&live), registry))
                .unwrap_or(false)
        });
        debug!(
            component = COMPONENT,
            bridge = registry.bridge(),
            attached = registries.len(),
            "handle registry detached"
        );
    }

    fn live_registries(&self) -> Vec<Arc<HandleRegistry>> {
        self.registries
            .lock()
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }
}
