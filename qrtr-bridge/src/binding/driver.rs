//! Driver callbacks and the registration template they are matched through.

use crate::binding::matcher::ServiceId;
use crate::control_plane::service_handle::ServiceHandle;
use crate::error::ProbeError;
use async_trait::async_trait;
use std::fmt::{self, Debug, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

static NEXT_DRIVER_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DriverId(u64);

impl DriverId {
    fn next() -> Self {
        Self(NEXT_DRIVER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Component that wants to be attached to matching service handles.
///
/// Both callbacks may block. They run on the lifecycle worker of the handle's
/// bridge, or on the task registering/unregistering the driver, and must not
/// call back into [`crate::DriverRegistry`].
#[async_trait]
pub trait QrtrDriver: Send + Sync {
    async fn probe(&self, handle: Arc<ServiceHandle>) -> Result<(), ProbeError>;

    /// Called once before a bound handle is released or the driver is unregistered.
    async fn remove(&self, _handle: Arc<ServiceHandle>) {}
}

pub struct DriverRegistration {
    id: DriverId,
    name: String,
    id_table: Vec<ServiceId>,
    driver: Arc<dyn QrtrDriver>,
}

impl DriverRegistration {
    pub fn new(name: &str, id_table: Vec<ServiceId>, driver: Arc<dyn QrtrDriver>) -> Self {
        Self {
            id: DriverId::next(),
            name: name.to_string(),
            id_table,
            driver,
        }
    }

    pub fn id(&self) -> DriverId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn id_table(&self) -> &[ServiceId] {
        &self.id_table
    }

    pub(crate) fn driver(&self) -> &Arc<dyn QrtrDriver> {
        &self.driver
    }
}

impl Debug for DriverRegistration {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DriverRegistration")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("id_table", &self.id_table)
            .finish_non_exhaustive()
    }
}
