use qrtr_bridge::{BridgeConfig, ServiceId};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoopbackConfig {
    pub bridge: BridgeConfig,
    pub drivers: Vec<DriverConfig>,
    pub services: Vec<AnnouncedService>,
    pub messages: Vec<String>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriverConfig {
    pub name: String,
    /// `[service, instance]` pairs; empty matches every service.
    #[serde(default)]
    pub ids: Vec<(u16, u16)>,
    #[serde(default)]
    pub fail_probe: bool,
}

impl DriverConfig {
    pub fn id_table(&self) -> Vec<ServiceId> {
        self.ids
            .iter()
            .map(|&(service, instance)| ServiceId::new(service, instance))
            .collect()
    }
}

#[derive(Clone, Copy, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AnnouncedService {
    pub node: u32,
    pub port: u32,
    pub service: u16,
    pub instance: u16,
}

#[derive(Debug)]
pub enum ConfigError {
    Read(std::io::Error),
    Parse(json5::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::Read(err) => write!(f, "unable to read config: {err}"),
            ConfigError::Parse(err) => write!(f, "unable to parse config: {err}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl LoopbackConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Read)?;
        json5::from_str(&text).map_err(ConfigError::Parse)
    }
}
