//! Service/instance matching between driver id tables and handles.

use crate::binding::driver::DriverRegistration;

/// One `(service, instance)` pair a driver accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ServiceId {
    pub service: u16,
    pub instance: u16,
}

impl ServiceId {
    /// Wildcard entry. A table containing it accepts every handle.
    pub const ANY: ServiceId = ServiceId {
        service: 0,
        instance: 0,
    };

    pub const fn new(service: u16, instance: u16) -> Self {
        Self { service, instance }
    }

    pub fn is_wildcard(&self) -> bool {
        self.service == 0
    }
}

/// Returns `true` when `id_table` accepts a handle announcing `(service, instance)`.
///
/// An empty table, or any entry with service `0`, accepts everything. Otherwise
/// some entry has to match both identifiers exactly.
pub fn table_matches(id_table: &[ServiceId], service: u16, instance: u16) -> bool {
    if id_table.is_empty() {
        return true;
    }

    id_table
        .iter()
        .any(|id| id.is_wildcard() || (id.service == service && id.instance == instance))
}

pub fn matches(registration: &DriverRegistration, service: u16, instance: u16) -> bool {
    table_matches(registration.id_table(), service, instance)
}
