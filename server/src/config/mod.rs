//! Runtime configuration
//!
//! Environment variables (optionally loaded from `.env`) select a network in
//! the networks file and tune the oracle pool.

pub mod contracts;

use std::env;
use std::str::FromStr;
use std::time::Duration;

use alloy::primitives::Address;

pub use contracts::NetworkConfig;

use crate::error::ConfigError;
use crate::event_listener::ListenerConfig;
use crate::oracle_server::OracleSettings;

/// Accounts 0..=10 belong to the contract owner, airlines and passengers.
const DEFAULT_FIRST_ORACLE_ACCOUNT: usize = 11;

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub network: String,
    pub networks_file: String,
    pub rpc_url_override: Option<String>,
    pub app_address_override: Option<Address>,
    pub oracle_count: usize,
    pub first_oracle_account: usize,
    pub status_seed: Option<u64>,
    pub registration_gas: u64,
    pub response_gas: u64,
    pub from_block: u64,
    pub poll_interval: Duration,
    pub receipt_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup. Unset or empty
    /// keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        Ok(Self {
            network: get("FLIGHTSURETY_NETWORK").unwrap_or_else(|| "localhost".to_string()),
            networks_file: get("FLIGHTSURETY_CONFIG").unwrap_or_else(|| "config.json".to_string()),
            rpc_url_override: get("FLIGHTSURETY_RPC_URL"),
            app_address_override: parse_optional(
                "FLIGHTSURETY_APP_ADDRESS",
                get("FLIGHTSURETY_APP_ADDRESS"),
            )?,
            oracle_count: parse_or("ORACLE_COUNT", get("ORACLE_COUNT"), 30)?,
            first_oracle_account: parse_or(
                "ORACLE_FIRST_ACCOUNT",
                get("ORACLE_FIRST_ACCOUNT"),
                DEFAULT_FIRST_ORACLE_ACCOUNT,
            )?,
            status_seed: parse_optional("ORACLE_STATUS_SEED", get("ORACLE_STATUS_SEED"))?,
            registration_gas: parse_or(
                "ORACLE_REGISTRATION_GAS",
                get("ORACLE_REGISTRATION_GAS"),
                3_000_000,
            )?,
            response_gas: parse_or("ORACLE_RESPONSE_GAS", get("ORACLE_RESPONSE_GAS"), 5_555_555)?,
            from_block: parse_or("ORACLE_FROM_BLOCK", get("ORACLE_FROM_BLOCK"), 0)?,
            poll_interval: Duration::from_millis(parse_or(
                "RPC_POLL_INTERVAL_MS",
                get("RPC_POLL_INTERVAL_MS"),
                1_000,
            )?),
            receipt_timeout: Duration::from_secs(parse_or(
                "RPC_RECEIPT_TIMEOUT_SECS",
                get("RPC_RECEIPT_TIMEOUT_SECS"),
                60,
            )?),
            shutdown_grace: Duration::from_secs(parse_or(
                "SHUTDOWN_GRACE_SECS",
                get("SHUTDOWN_GRACE_SECS"),
                5,
            )?),
        })
    }

    /// The selected network with any environment overrides applied.
    pub fn network_config(&self) -> Result<NetworkConfig, ConfigError> {
        let mut network = NetworkConfig::load(&self.networks_file, &self.network)?;
        if let Some(url) = &self.rpc_url_override {
            network.url = url.clone();
        }
        if let Some(address) = self.app_address_override {
            network.app_address = address;
        }
        Ok(network)
    }

    pub fn oracle_settings(&self) -> OracleSettings {
        OracleSettings {
            oracle_count: self.oracle_count,
            first_account: self.first_oracle_account,
            registration_gas: self.registration_gas,
            response_gas: self.response_gas,
            status_seed: self.status_seed,
            listener: ListenerConfig {
                from_block: self.from_block,
                shutdown_grace: self.shutdown_grace,
            },
        }
    }
}

fn parse_optional<T: FromStr>(key: &'static str, raw: Option<String>) -> Result<Option<T>, ConfigError> {
    raw.map(|value| {
        value
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidEnv { key, value })
    })
    .transpose()
}

fn parse_or<T: FromStr>(key: &'static str, raw: Option<String>, default: T) -> Result<T, ConfigError> {
    Ok(parse_optional(key, raw)?.unwrap_or(default))
}
