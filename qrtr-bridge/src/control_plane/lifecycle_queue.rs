//! Deferred, ordered application of handle create/destroy requests.
//!
//! Requests are accepted on contexts that must not block (`try_send` only) and
//! applied by a single worker per bridge, in submission order. That single
//! consumer is what orders create and destroy for the same port.

use crate::control_plane::handle_registry::HandleRegistry;
use crate::error::BridgeError;
use crate::observability::{events, fields};
use crate::runtime::worker_runtime::{spawn_worker_loop, WorkerHandle};
use arc_swap::ArcSwapOption;
use futures::FutureExt;
use parking_lot::Mutex;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::mpsc::{self, Receiver, Sender};
use tokio::sync::oneshot;
use tracing::{debug, error, info, trace, warn};
use uuid::Uuid;

const COMPONENT: &str = "lifecycle_queue";

/// A queued intent against the bridge's handle registry.
#[derive(Debug)]
pub(crate) enum LifecycleRequest {
    Create {
        node: u32,
        port: u32,
        service: u16,
        instance: u16,
    },
    Destroy {
        port: u32,
    },
    /// Completes once every earlier request has been applied.
    Flush(oneshot::Sender<()>),
}

pub(crate) struct LifecycleQueue {
    bridge: String,
    sender: ArcSwapOption<Sender<LifecycleRequest>>,
    worker: Mutex<Option<WorkerHandle>>,
}

impl LifecycleQueue {
    /// Spawns the worker draining into `registry`.
    pub(crate) fn start(registry: Arc<HandleRegistry>, capacity: usize) -> Result<Self, BridgeError> {
        let bridge = registry.bridge().to_string();
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        let worker_id = Uuid::new_v4().hyphenated().to_string();

        info!(
            event = events::LIFECYCLE_WORKER_START,
            component = COMPONENT,
            bridge = %bridge,
            worker_id = %worker_id,
            capacity,
            "starting lifecycle worker"
        );

        let worker = spawn_worker_loop(format!("qrtr-lifecycle:{bridge}"), move || {
            drain(worker_id, registry, receiver)
        })?;

        Ok(Self {
            bridge,
            sender: ArcSwapOption::from_pointee(sender),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Queues `request` without blocking.
    ///
    /// A full queue is reported as [`BridgeError::ResourceExhausted`], never
    /// dropped. Submitting after [`LifecycleQueue::close`] is a no-op.
    pub(crate) fn submit(&self, request: LifecycleRequest) -> Result<(), BridgeError> {
        let Some(sender) = self.sender.load_full() else {
            debug!(
                event = events::LIFECYCLE_SUBMIT_AFTER_TEARDOWN,
                component = COMPONENT,
                bridge = %self.bridge,
                request = %fields::format_request(&request),
                "bridge torn down, discarding request"
            );
            return Ok(());
        };

        match sender.try_send(request) {
            Ok(()) => {
                trace!(
                    event = events::LIFECYCLE_SUBMIT,
                    component = COMPONENT,
                    bridge = %self.bridge,
                    "request queued"
                );
                Ok(())
            }
            Err(TrySendError::Full(request)) => {
                warn!(
                    event = events::LIFECYCLE_SUBMIT_REJECTED,
                    component = COMPONENT,
                    bridge = %self.bridge,
                    request = %fields::format_request(&request),
                    reason = "queue_full",
                    "lifecycle queue full"
                );
                Err(BridgeError::ResourceExhausted(format!(
                    "lifecycle queue of {} is full",
                    self.bridge
                )))
            }
            Err(TrySendError::Closed(request)) => {
                error!(
                    event = events::LIFECYCLE_SUBMIT_REJECTED,
                    component = COMPONENT,
                    bridge = %self.bridge,
                    request = %fields::format_request(&request),
                    reason = "worker_gone",
                    "lifecycle worker is not running"
                );
                Err(BridgeError::ResourceExhausted(format!(
                    "lifecycle worker of {} is not running",
                    self.bridge
                )))
            }
        }
    }

    /// Waits until every request submitted before this call has been applied.
    pub(crate) async fn flush(&self) -> Result<(), BridgeError> {
        let Some(sender) = self.sender.load_full() else {
            return Ok(());
        };

        let (done_tx, done_rx) = oneshot::channel();
        let worker_gone = || {
            BridgeError::ResourceExhausted(format!(
                "lifecycle worker of {} is not running",
                self.bridge
            ))
        };

        sender
            .send(LifecycleRequest::Flush(done_tx))
            .await
            .map_err(|_| worker_gone())?;
        drop(sender);

        done_rx.await.map_err(|_| worker_gone())
    }

    /// Stops accepting requests. Returns `false` if already closed.
    pub(crate) fn close(&self) -> bool {
        self.sender.swap(None).is_some()
    }

    /// Waits for the worker to drain what was queued before [`LifecycleQueue::close`].
    pub(crate) async fn join(&self) {
        let worker = self.worker.lock().take();
        if let Some(worker) = worker {
            worker.join().await;
        }
    }
}

async fn drain(
    worker_id: String,
    registry: Arc<HandleRegistry>,
    mut receiver: Receiver<LifecycleRequest>,
) {
    while let Some(request) = receiver.recv().await {
        let label = fields::format_request(&request);
        let applied = AssertUnwindSafe(apply(&registry, request))
            .catch_unwind()
            .await;

        if applied.is_err() {
            error!(
                event = events::LIFECYCLE_APPLY_FAILED,
                component = COMPONENT,
                bridge = registry.bridge(),
                worker_id = %worker_id,
                request = %label,
                "lifecycle request panicked, continuing with next request"
            );
        }
    }

    info!(
        event = events::LIFECYCLE_WORKER_STOP,
        component = COMPONENT,
        bridge = registry.bridge(),
        worker_id = %worker_id,
        "lifecycle worker stopped"
    );
}

pub(crate) async fn apply(registry: &HandleRegistry, request: LifecycleRequest) {
    debug!(
        event = events::LIFECYCLE_APPLY,
        component = COMPONENT,
        bridge = registry.bridge(),
        request = %fields::format_request(&request),
        "applying lifecycle request"
    );

    match request {
        LifecycleRequest::Create {
            node,
            port,
            service,
            instance,
        } => match registry.create(node, port, service, instance).await {
            Ok(created) => {
                for failure in &created.binding.probe_failures {
                    debug!(
                        component = COMPONENT,
                        bridge = registry.bridge(),
                        err = %failure,
                        "probe failure reported while creating handle"
                    );
                }
            }
            Err(BridgeError::ShutDown) => {
                debug!(
                    component = COMPONENT,
                    bridge = registry.bridge(),
                    port,
                    "bridge torn down, create discarded"
                );
            }
            Err(err) => {
                warn!(
                    event = events::LIFECYCLE_APPLY_FAILED,
                    component = COMPONENT,
                    bridge = registry.bridge(),
                    port,
                    err = %err,
                    "unable to create service handle"
                );
            }
        },
        LifecycleRequest::Destroy { port } => {
            registry.destroy(port).await;
        }
        LifecycleRequest::Flush(done) => {
            let _ = done.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{LifecycleQueue, LifecycleRequest};
    use crate::binding::driver_registry::DriverRegistry;
    use crate::control_plane::handle_registry::HandleRegistry;
    use crate::error::BridgeError;
    use std::sync::Arc;

    fn create(port: u32, service: u16) -> LifecycleRequest {
        LifecycleRequest::Create {
            node: 1,
            port,
            service,
            instance: 1,
        }
    }

    #[tokio::test]
    async fn requests_for_one_port_apply_in_submission_order() {
        let registry = HandleRegistry::new("queue-test", Arc::new(DriverRegistry::new()));
        let queue = LifecycleQueue::start(registry.clone(), 64).expect("start queue");

        queue.submit(create(10, 1)).expect("submit");
        queue
            .submit(LifecycleRequest::Destroy { port: 10 })
            .expect("submit");
        queue.submit(create(10, 2)).expect("submit");
        queue.flush().await.expect("flush");

        let handle = registry.find_by_port(10).expect("recreated handle");
        assert_eq!(handle.service(), 2);

        queue
            .submit(LifecycleRequest::Destroy { port: 10 })
            .expect("submit");
        queue.flush().await.expect("flush");
        assert!(registry.find_by_port(10).is_none());

        queue.close();
        queue.join().await;
    }

    #[tokio::test]
    async fn submit_after_close_is_a_no_op() {
        let registry = HandleRegistry::new("queue-test", Arc::new(DriverRegistry::new()));
        let queue = LifecycleQueue::start(registry.clone(), 4).expect("start queue");

        assert!(queue.close());
        assert!(!queue.close());
        queue.join().await;

        assert_eq!(queue.submit(create(10, 1)), Ok(()));
        assert_eq!(queue.flush().await, Ok(()));
        assert!(registry.is_empty());
    }

    #[test]
    fn full_queue_reports_resource_exhaustion() {
        let registry = HandleRegistry::new("queue-test", Arc::new(DriverRegistry::new()));
        let (sender, _receiver) = tokio::sync::mpsc::channel(1);
        let queue = LifecycleQueue {
            bridge: registry.bridge().to_string(),
            sender: arc_swap::ArcSwapOption::from_pointee(sender),
            worker: parking_lot::Mutex::new(None),
        };

        assert_eq!(queue.submit(create(10, 1)), Ok(()));
        assert!(matches!(
            queue.submit(create(11, 1)),
            Err(BridgeError::ResourceExhausted(_))
        ));
    }
}
