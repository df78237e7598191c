//! In-memory record of one discoverable remote service.

use crate::binding::driver::DriverRegistration;
use parking_lot::Mutex;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Prefix of every handle's module alias.
pub const MODULE_PREFIX: &str = "qrtr:";

static NEXT_HANDLE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`ServiceHandle`]. Never reused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandleId(u64);

impl HandleId {
    fn next() -> Self {
        Self(NEXT_HANDLE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl Display for HandleId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Clone)]
pub(crate) enum BindingState {
    Unbound,
    Bound(Arc<DriverRegistration>),
    /// Terminal: the registry let go of the handle.
    Released,
}

pub struct ServiceHandle {
    id: HandleId,
    bridge: String,
    node: u32,
    port: u32,
    service: u16,
    instance: u16,
    binding: Mutex<BindingState>,
}

impl ServiceHandle {
    pub(crate) fn new(bridge: &str, node: u32, port: u32, service: u16, instance: u16) -> Self {
        Self {
            id: HandleId::next(),
            bridge: bridge.to_string(),
            node,
            port,
            service,
            instance,
            binding: Mutex::new(BindingState::Unbound),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Name of the bridge that owns this handle.
    pub fn bridge(&self) -> &str {
        &self.bridge
    }

    pub fn node(&self) -> u32 {
        self.node
    }

    pub fn port(&self) -> u32 {
        self.port
    }

    pub fn service(&self) -> u16 {
        self.service
    }

    pub fn instance(&self) -> u16 {
        self.instance
    }

    /// Stable external name, `"{node}-{port}"`.
    pub fn name(&self) -> String {
        format!("{}-{}", self.node, self.port)
    }

    /// Alias drivers are looked up by, `"qrtr:{service:x}:{instance:x}"`.
    pub fn modalias(&self) -> String {
        format!("{}{:x}:{:x}", MODULE_PREFIX, self.service, self.instance)
    }

    /// Name of the driver currently bound, if any.
    pub fn bound_driver(&self) -> Option<String> {
        match &*self.binding.lock() {
            BindingState::Bound(registration) => Some(registration.name().to_string()),
            _ => None,
        }
    }

    pub fn is_bound(&self) -> bool {
        matches!(&*self.binding.lock(), BindingState::Bound(_))
    }

    /// `true` once the owning registry destroyed this handle.
    pub fn is_released(&self) -> bool {
        matches!(&*self.binding.lock(), BindingState::Released)
    }

    pub(crate) fn binding(&self) -> BindingState {
        self.binding.lock().clone()
    }

    pub(crate) fn set_binding(&self, state: BindingState) {
        *self.binding.lock() = state;
    }

    /// Moves a bound handle back to unbound and hands out the registration it
    /// was bound to. Any other state is left as is.
    pub(crate) fn take_bound(&self) -> Option<Arc<DriverRegistration>> {
        let mut binding = self.binding.lock();
        match std::mem::replace(&mut *binding, BindingState::Unbound) {
            BindingState::Bound(registration) => Some(registration),
            other => {
                *binding = other;
                None
            }
        }
    }
}

impl Debug for ServiceHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceHandle")
            .field("id", &self.id)
            .field("bridge", &self.bridge)
            .field("node", &self.node)
            .field("port", &self.port)
            .field("service", &self.service)
            .field("instance", &self.instance)
            .field("bound_driver", &self.bound_driver())
            .finish()
    }
}
