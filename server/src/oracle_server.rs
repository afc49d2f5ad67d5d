//! Setup and run of the oracle service
//!
//! Registration runs to completion before the listener subscribes, so the
//! registry it matches against is already frozen.

use std::future::Future;
use std::sync::Arc;

use alloy::primitives::Address;
use tracing::{info, warn};

use crate::error::SetupError;
use crate::event_listener::{ListenerConfig, ListenerReport, OracleEventListener};
use crate::gateway::SharedGateway;
use crate::services::dispatcher::ResponseDispatcher;
use crate::services::registry::{OracleRegistry, Registrar, RegistryBuilder, StatusSampler};

#[derive(Debug, Clone)]
pub struct OracleSettings {
    pub oracle_count: usize,
    /// Node account index of the first oracle identity.
    pub first_account: usize,
    pub registration_gas: u64,
    pub response_gas: u64,
    pub status_seed: Option<u64>,
    pub listener: ListenerConfig,
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            oracle_count: 30,
            first_account: 11,
            registration_gas: 3_000_000,
            response_gas: 5_555_555,
            status_seed: None,
            listener: ListenerConfig::default(),
        }
    }
}

pub struct OracleServer {
    gateway: SharedGateway,
    settings: OracleSettings,
}

impl OracleServer {
    pub fn new(gateway: SharedGateway, settings: OracleSettings) -> Self {
        Self { gateway, settings }
    }

    /// Picks the pool from the node's accounts, registers every identity and
    /// freezes the result. Individual registration failures are logged and
    /// skipped.
    pub async fn register_oracles(&self) -> Result<OracleRegistry, SetupError> {
        let accounts = self.gateway.accounts().await.map_err(SetupError::Accounts)?;
        let pool = oracle_pool(&accounts, self.settings.first_account, self.settings.oracle_count)?;

        if pool.len() < self.settings.oracle_count {
            warn!(
                requested = self.settings.oracle_count,
                available = pool.len(),
                "node exposes fewer accounts than the configured pool size"
            );
        }

        let registrar = Registrar::new(
            Arc::clone(&self.gateway),
            self.settings.registration_gas,
            StatusSampler::new(self.settings.status_seed),
        );
        let fee = registrar
            .registration_fee(pool[0])
            .await
            .map_err(SetupError::RegistrationFee)?;
        info!(fee = %fee, oracles = pool.len(), "registering oracles");

        let mut builder = RegistryBuilder::new();
        registrar.register_pool(&mut builder, pool, fee).await;
        Ok(builder.freeze())
    }

    /// Registers the pool, then listens until `shutdown` resolves.
    pub async fn run<S>(self, shutdown: S) -> Result<ListenerReport, SetupError>
    where
        S: Future<Output = ()>,
    {
        let registry = Arc::new(self.register_oracles().await?);
        let dispatcher = ResponseDispatcher::new(Arc::clone(&self.gateway), self.settings.response_gas);
        let listener = OracleEventListener::new(self.gateway, registry, dispatcher, self.settings.listener);

        let report = listener.run(shutdown).await?;
        info!(
            events = report.events_received,
            unmatched = report.events_unmatched,
            malformed = report.events_malformed,
            started = report.submissions_started,
            accepted = report.submissions_accepted,
            rejected = report.submissions_rejected,
            abandoned = report.submissions_abandoned,
            "oracle listener stopped"
        );
        Ok(report)
    }
}

fn oracle_pool(accounts: &[Address], first: usize, count: usize) -> Result<&[Address], SetupError> {
    let start = first.min(accounts.len());
    let end = first.saturating_add(count).min(accounts.len());
    if start == end {
        return Err(SetupError::NoIdentities {
            first,
            available: accounts.len(),
        });
    }
    Ok(&accounts[start..end])
}
