//! Bridge configuration.

use serde::Deserialize;

pub const DEFAULT_LIFECYCLE_QUEUE_CAPACITY: usize = 64;

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Name used in logs and as the owner tag of every handle.
    pub name: String,
    /// Node id to register with the router. `None` lets the router pick one.
    pub node_id: Option<u32>,
    /// Pending create/destroy requests accepted before submissions fail.
    pub lifecycle_queue_capacity: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            name: "qrtr-bridge".to_string(),
            node_id: None,
            lifecycle_queue_capacity: DEFAULT_LIFECYCLE_QUEUE_CAPACITY,
        }
    }
}

impl BridgeConfig {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }
}
