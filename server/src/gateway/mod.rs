//! Chain gateway
//!
//! The narrow boundary between the oracle server and the ledger: read-only
//! calls, state-changing transactions and contract event subscriptions.
//! Gateways move raw calldata and log data; typed access goes through the
//! `sol!` bindings in [`crate::contract`].

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, LogData, B256, U256};
use alloy::sol_types::SolCall;
use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::GatewayError;

#[cfg(any(test, feature = "testutils"))]
pub mod memory;
pub mod rpc;

pub use rpc::JsonRpcGateway;

/// Sender and payment details of a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOptions {
    pub from: Address,
    pub value: Option<U256>,
    pub gas: Option<u64>,
}

impl TxOptions {
    pub fn sender(from: Address) -> Self {
        Self {
            from,
            value: None,
            gas: None,
        }
    }

    /// Wei attached to the transaction.
    pub fn value(mut self, wei: U256) -> Self {
        self.value = Some(wei);
        self
    }

    pub fn gas(mut self, gas: u64) -> Self {
        self.gas = Some(gas);
        self
    }
}

/// Receipt of a successfully mined transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
}

/// A contract log, still undecoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainEvent {
    pub block_number: u64,
    pub tx_hash: Option<B256>,
    pub data: LogData,
}

impl ChainEvent {
    /// The event signature hash, if the log carries one.
    pub fn topic0(&self) -> Option<B256> {
        self.data.topics().first().copied()
    }
}

pub type EventStream = BoxStream<'static, Result<ChainEvent, GatewayError>>;

pub type SharedGateway = Arc<dyn ChainGateway>;

#[async_trait]
pub trait ChainGateway: Send + Sync {
    /// Accounts the node can sign for.
    async fn accounts(&self) -> Result<Vec<Address>, GatewayError>;

    /// Read-only call of the contract evaluated against the latest block.
    async fn call(&self, input: Bytes, from: Address) -> Result<Bytes, GatewayError>;

    /// Submits a transaction to the contract and resolves once it has a
    /// successful receipt.
    async fn send(&self, input: Bytes, options: TxOptions) -> Result<TxReceipt, GatewayError>;

    /// Streams every contract log whose first topic is `topic`, from
    /// `from_block` onwards. An `Err` item means the subscription is broken;
    /// the stream ends after it. Logs are delivered undecoded, so one bad
    /// payload never breaks the stream.
    async fn subscribe(&self, topic: B256, from_block: u64) -> Result<EventStream, GatewayError>;
}

impl dyn ChainGateway {
    /// Calls a view function and decodes its return value.
    pub async fn read<C: SolCall>(&self, call: &C, from: Address) -> Result<C::Return, GatewayError> {
        let output = self.call(Bytes::from(call.abi_encode()), from).await?;
        Ok(C::abi_decode_returns(&output)?)
    }

    /// Sends a state-changing call.
    pub async fn submit<C: SolCall>(&self, call: &C, options: TxOptions) -> Result<TxReceipt, GatewayError> {
        self.send(Bytes::from(call.abi_encode()), options).await
    }
}
