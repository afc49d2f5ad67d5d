use std::collections::HashMap;
use std::fs;
use std::path::Path;

use alloy::primitives::Address;
use serde::Deserialize;

use crate::error::ConfigError;

/// Endpoint and contract addresses for one network in `config.json`
#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NetworkConfig {
    pub url: String,
    pub app_address: Address,
    pub data_address: Address,
}

impl NetworkConfig {
    pub fn load(path: impl AsRef<Path>, network: &str) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content, network)
    }

    pub fn from_json(content: &str, network: &str) -> Result<Self, ConfigError> {
        let mut networks: HashMap<String, NetworkConfig> = serde_json::from_str(content)?;
        networks
            .remove(network)
            .ok_or_else(|| ConfigError::UnknownNetwork(network.to_string()))
    }
}
