use alloy::primitives::{Address, B256};
use alloy::transports::TransportError;
use thiserror::Error;

/// Failures talking to the chain
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("invalid rpc endpoint {0:?}")]
    InvalidEndpoint(String),

    #[error("rpc transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("node unavailable: {0}")]
    Unavailable(String),

    #[error("transaction {tx_hash} reverted")]
    Reverted { tx_hash: B256 },

    #[error("transaction rejected: {0}")]
    Rejected(String),

    #[error("timed out waiting for receipt of {tx_hash}")]
    ReceiptTimeout { tx_hash: B256 },

    #[error("abi decoding failed: {0}")]
    Abi(#[from] alloy::sol_types::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read networks file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse networks file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("network `{0}` is not defined in the networks file")]
    UnknownNetwork(String),

    #[error("invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("oracle {0} is already registered")]
    AlreadyRegistered(Address),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

/// An `OracleRequest` log that cannot be read as a status request
#[derive(Debug, Error)]
pub enum MalformedRequest {
    #[error("log has no topics")]
    Anonymous,

    #[error("unexpected event topic {0}")]
    UnexpectedEvent(B256),

    #[error("undecodable OracleRequest: {0}")]
    Decode(#[from] alloy::sol_types::Error),
}

/// Fatal listener conditions
#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to subscribe to oracle requests: {0}")]
    Subscribe(#[source] GatewayError),

    #[error("oracle request subscription failed: {0}")]
    Subscription(#[source] GatewayError),

    #[error("oracle request stream closed")]
    StreamClosed,
}

/// Unrecoverable setup failures
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("failed to list node accounts: {0}")]
    Accounts(#[source] GatewayError),

    #[error("no oracle identities available: node has {available} accounts, pool starts at {first}")]
    NoIdentities { first: usize, available: usize },

    #[error("failed to read registration fee: {0}")]
    RegistrationFee(#[source] GatewayError),

    #[error(transparent)]
    Listener(#[from] ListenerError),
}
