use alloy::primitives::utils::UnitsError;
use alloy::primitives::U256;
use thiserror::Error;

use flightsurety_oracles::error::GatewayError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error("client is not initialized; call initialize() first")]
    NotInitialized,

    #[error("node exposes {available} accounts, {needed} are required")]
    NotEnoughAccounts { needed: usize, available: usize },

    #[error("unexpected {method} output: {reason}")]
    UnexpectedOutput { method: &'static str, reason: String },

    #[error("contract reports {count} flights, more than the {max} the client reads")]
    TooManyFlights { count: U256, max: usize },

    #[error("invalid ether amount {amount:?}: {source}")]
    InvalidAmount {
        amount: String,
        #[source]
        source: UnitsError,
    },
}
