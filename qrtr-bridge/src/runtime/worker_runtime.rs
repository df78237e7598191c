//! Runtime helper for spawning lifecycle worker loops.

use crate::error::BridgeError;
use std::future::Future;
use std::thread;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use tracing::error;

const COMPONENT: &str = "worker_runtime";

/// Completion signal of a worker thread.
pub(crate) struct WorkerHandle {
    done: oneshot::Receiver<()>,
}

impl WorkerHandle {
    /// Resolves once the worker loop returned, or its thread died.
    pub(crate) async fn join(self) {
        let _ = self.done.await;
    }
}

/// Runs `run_loop` to completion on a dedicated thread with its own
/// current-thread runtime, so blocking driver callbacks never stall the
/// caller's runtime.
pub(crate) fn spawn_worker_loop<F, Fut>(
    thread_name: String,
    run_loop: F,
) -> Result<WorkerHandle, BridgeError>
where
    F: FnOnce() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + 'static,
{
    let (done_tx, done_rx) = oneshot::channel();
    let name = thread_name.clone();

    thread::Builder::new()
        .name(thread_name)
        .spawn(move || {
            let runtime = match Builder::new_current_thread().enable_all().build() {
                Ok(runtime) => runtime,
                Err(err) => {
                    error!(
                        component = COMPONENT,
                        worker = %name,
                        err = %err,
                        "unable to create worker runtime"
                    );
                    return;
                }
            };

            runtime.block_on(run_loop());
            let _ = done_tx.send(());
        })
        .map_err(|err| {
            BridgeError::ResourceExhausted(format!("unable to spawn worker thread: {err}"))
        })?;

    Ok(WorkerHandle { done: done_rx })
}
