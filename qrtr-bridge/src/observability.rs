//! Stable event names and field formatting shared by all tracing call sites.
//!
//! Every event emitted by this crate carries an `event` field taken from
//! [`events`] and a `component` field naming the emitting module, so log
//! pipelines can filter on them without parsing messages.

pub mod events {
    pub const BRIDGE_PROBED: &str = "bridge_probed";
    pub const BRIDGE_REMOVED: &str = "bridge_removed";
    pub const BRIDGE_REGISTER_FAILED: &str = "bridge_register_failed";

    pub const LINK_RECEIVE: &str = "link_receive";
    pub const LINK_RECEIVE_NOT_READY: &str = "link_receive_not_ready";
    pub const LINK_RECEIVE_MALFORMED: &str = "link_receive_malformed";
    pub const LINK_RECEIVE_FAILED: &str = "link_receive_failed";
    pub const LINK_SEND_ATTEMPT: &str = "link_send_attempt";
    pub const LINK_SEND_OK: &str = "link_send_ok";
    pub const LINK_SEND_FAILED: &str = "link_send_failed";

    pub const LIFECYCLE_SUBMIT: &str = "lifecycle_submit";
    pub const LIFECYCLE_SUBMIT_REJECTED: &str = "lifecycle_submit_rejected";
    pub const LIFECYCLE_SUBMIT_AFTER_TEARDOWN: &str = "lifecycle_submit_after_teardown";
    pub const LIFECYCLE_APPLY: &str = "lifecycle_apply";
    pub const LIFECYCLE_APPLY_FAILED: &str = "lifecycle_apply_failed";
    pub const LIFECYCLE_WORKER_START: &str = "lifecycle_worker_start";
    pub const LIFECYCLE_WORKER_STOP: &str = "lifecycle_worker_stop";

    pub const HANDLE_CREATED: &str = "handle_created";
    pub const HANDLE_CREATE_DUPLICATE: &str = "handle_create_duplicate";
    pub const HANDLE_CREATE_AFTER_SHUTDOWN: &str = "handle_create_after_shutdown";
    pub const HANDLE_DESTROYED: &str = "handle_destroyed";
    pub const HANDLE_DESTROY_NOT_FOUND: &str = "handle_destroy_not_found";
    pub const HANDLE_DESTROY_ALL: &str = "handle_destroy_all";

    pub const DRIVER_REGISTERED: &str = "driver_registered";
    pub const DRIVER_UNREGISTERED: &str = "driver_unregistered";
    pub const BIND_PROBE_OK: &str = "bind_probe_ok";
    pub const BIND_PROBE_FAILED: &str = "bind_probe_failed";
    pub const BIND_REMOVE: &str = "bind_remove";
}

pub mod fields {
    use crate::control_plane::lifecycle_queue::LifecycleRequest;
    use crate::control_plane::service_handle::ServiceHandle;

    pub fn format_handle(handle: &ServiceHandle) -> String {
        format!(
            "{}[{}:{}]",
            handle.name(),
            handle.service(),
            handle.instance()
        )
    }

    pub(crate) fn format_request(request: &LifecycleRequest) -> String {
        match request {
            LifecycleRequest::Create {
                node,
                port,
                service,
                instance,
            } => format!("create({node}-{port} {service}:{instance})"),
            LifecycleRequest::Destroy { port } => format!("destroy({port})"),
            LifecycleRequest::Flush(_) => "flush".to_string(),
        }
    }

    pub fn format_frame_len(len: usize) -> String {
        format!("{len}B")
    }
}
