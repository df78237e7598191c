//! Probe/remove orchestration between handles and driver registrations.
//!
//! Policy is first-match-wins: a handle is bound to at most one driver. Every
//! function here expects the caller to hold the owning registry's mutation
//! lock, which is what keeps probe and remove for one handle strictly ordered.

use crate::binding::driver::DriverRegistration;
use crate::binding::matcher::matches;
use crate::control_plane::service_handle::{BindingState, HandleId, ServiceHandle};
use crate::error::BridgeError;
use crate::observability::{events, fields};
use std::sync::Arc;
use tracing::{debug, warn};

const COMPONENT: &str = "lifecycle_binding";

/// Outcome of one round of matching.
#[derive(Debug, Default)]
pub struct BindReport {
    /// Handles that transitioned to bound, with the driver that accepted them.
    pub bound: Vec<(HandleId, String)>,
    /// Probes that failed. The handles involved stay unbound.
    pub probe_failures: Vec<BridgeError>,
}

impl BindReport {
    pub fn is_empty(&self) -> bool {
        self.bound.is_empty() && self.probe_failures.is_empty()
    }

    pub(crate) fn merge(&mut self, other: BindReport) {
        self.bound.extend(other.bound);
        self.probe_failures.extend(other.probe_failures);
    }
}

async fn try_probe(
    handle: &Arc<ServiceHandle>,
    registration: &Arc<DriverRegistration>,
    report: &mut BindReport,
) -> bool {
    match registration.driver().probe(handle.clone()).await {
        Ok(()) => {
            handle.set_binding(BindingState::Bound(registration.clone()));
            debug!(
                event = events::BIND_PROBE_OK,
                component = COMPONENT,
                handle = %fields::format_handle(handle),
                driver = registration.name(),
                "driver bound to service handle"
            );
            report
                .bound
                .push((handle.id(), registration.name().to_string()));
            true
        }
        Err(error) => {
            warn!(
                event = events::BIND_PROBE_FAILED,
                component = COMPONENT,
                handle = %fields::format_handle(handle),
                driver = registration.name(),
                err = %error,
                "driver probe failed, handle stays unbound"
            );
            report.probe_failures.push(BridgeError::ProbeFailure {
                driver: registration.name().to_string(),
                handle: handle.name(),
                error,
            });
            false
        }
    }
}

/// Offers a freshly created handle to `drivers` in registration order.
pub(crate) async fn bind_handle(
    handle: &Arc<ServiceHandle>,
    drivers: &[Arc<DriverRegistration>],
) -> BindReport {
    let mut report = BindReport::default();

    if !matches!(handle.binding(), BindingState::Unbound) {
        return report;
    }

    for registration in drivers
        .iter()
        .filter(|registration| matches(registration, handle.service(), handle.instance()))
    {
        if try_probe(handle, registration, &mut report).await {
            break;
        }
    }

    report
}

/// Offers every unbound handle in `handles` to a newly registered driver.
pub(crate) async fn bind_driver<I>(handles: I, registration: &Arc<DriverRegistration>) -> BindReport
where
    I: IntoIterator<Item = Arc<ServiceHandle>>,
{
    let mut report = BindReport::default();

    for handle in handles {
        if !matches!(handle.binding(), BindingState::Unbound) {
            continue;
        }
        if !matches(registration, handle.service(), handle.instance()) {
            continue;
        }
        try_probe(&handle, registration, &mut report).await;
    }

    report
}

/// Runs the bound driver's remove callback and returns the handle to unbound.
///
/// Returns `true` when a driver was bound. The handle is unbound before the
/// callback runs, so remove is attempted at most once even if it panics.
pub(crate) async fn unbind_handle(handle: &Arc<ServiceHandle>) -> bool {
    let Some(registration) = handle.take_bound() else {
        return false;
    };

    debug!(
        event = events::BIND_REMOVE,
        component = COMPONENT,
        handle = %fields::format_handle(handle),
        driver = registration.name(),
        "removing driver from service handle"
    );
    registration.driver().remove(handle.clone()).await;
    true
}

/// Unbinds every handle in `handles` currently bound to `registration`.
pub(crate) async fn release_driver<I>(handles: I, registration: &Arc<DriverRegistration>) -> usize
where
    I: IntoIterator<Item = Arc<ServiceHandle>>,
{
    let mut released = 0;

    for handle in handles {
        let bound_here = matches!(
            handle.binding(),
            BindingState::Bound(ref bound) if bound.id() == registration.id()
        );
        if bound_here && unbind_handle(&handle).await {
            released += 1;
        }
    }

    released
}
