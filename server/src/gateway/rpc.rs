//! Ethereum JSON-RPC gateway
//!
//! An alloy HTTP provider against a node that signs for its own unlocked
//! accounts (`eth_sendTransaction`). Event subscriptions poll `eth_getLogs`
//! behind a block cursor.

use std::collections::VecDeque;
use std::time::Duration;

use alloy::network::{ReceiptResponse, TransactionBuilder};
use alloy::primitives::{Address, Bytes, B256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::{Filter, TransactionRequest};
use alloy::transports::http::reqwest::Url;
use async_trait::async_trait;
use futures_util::stream;
use tokio::time::{sleep, Instant};
use tracing::{debug, info};

use super::{ChainEvent, ChainGateway, EventStream, TxOptions, TxReceipt};
use crate::error::GatewayError;

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const DEFAULT_RECEIPT_TIMEOUT: Duration = Duration::from_secs(60);

/// Number of blocks covered by a single `eth_getLogs` request.
const MAX_LOG_RANGE: u64 = 1_000;

#[derive(Clone)]
pub struct JsonRpcGateway {
    provider: DynProvider,
    contract: Address,
    poll_interval: Duration,
    receipt_timeout: Duration,
}

impl JsonRpcGateway {
    /// Gas, nonce and chain id are left to the node, which signs for its own
    /// accounts.
    pub fn new(rpc_url: &str, contract: Address) -> Result<Self, GatewayError> {
        let url: Url = rpc_url
            .parse()
            .map_err(|_| GatewayError::InvalidEndpoint(rpc_url.to_string()))?;
        let provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .connect_http(url)
            .erased();

        Ok(Self {
            provider,
            contract,
            poll_interval: DEFAULT_POLL_INTERVAL,
            receipt_timeout: DEFAULT_RECEIPT_TIMEOUT,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_receipt_timeout(mut self, receipt_timeout: Duration) -> Self {
        self.receipt_timeout = receipt_timeout;
        self
    }

    pub fn contract(&self) -> Address {
        self.contract
    }

    /// Contract logs with `topic` in `from_block..=to_block`. Logs are not
    /// decoded here; a payload that fails to decode is the consumer's
    /// per-event problem, not a transport failure.
    async fn logs(&self, topic: B256, from_block: u64, to_block: u64) -> Result<Vec<ChainEvent>, GatewayError> {
        let filter = Filter::new()
            .address(self.contract)
            .event_signature(topic)
            .from_block(from_block)
            .to_block(to_block);

        let logs = self.provider.get_logs(&filter).await?;
        Ok(logs
            .into_iter()
            .filter(|log| !log.removed)
            .map(|log| ChainEvent {
                block_number: log.block_number.unwrap_or(from_block),
                tx_hash: log.transaction_hash,
                data: log.inner.data,
            })
            .collect())
    }

    async fn wait_for_receipt(&self, tx_hash: B256) -> Result<TxReceipt, GatewayError> {
        let deadline = Instant::now() + self.receipt_timeout;

        loop {
            if let Some(receipt) = self.provider.get_transaction_receipt(tx_hash).await? {
                if !receipt.status() {
                    return Err(GatewayError::Reverted { tx_hash });
                }
                return Ok(TxReceipt {
                    tx_hash,
                    block_number: receipt.block_number(),
                });
            }

            if Instant::now() >= deadline {
                return Err(GatewayError::ReceiptTimeout { tx_hash });
            }

            sleep(self.poll_interval).await;
        }
    }
}

#[async_trait]
impl ChainGateway for JsonRpcGateway {
    async fn accounts(&self) -> Result<Vec<Address>, GatewayError> {
        Ok(self.provider.get_accounts().await?)
    }

    async fn call(&self, input: Bytes, from: Address) -> Result<Bytes, GatewayError> {
        let tx = TransactionRequest::default()
            .with_from(from)
            .with_to(self.contract)
            .with_input(input);
        Ok(self.provider.call(tx).await?)
    }

    async fn send(&self, input: Bytes, options: TxOptions) -> Result<TxReceipt, GatewayError> {
        let mut tx = TransactionRequest::default()
            .with_from(options.from)
            .with_to(self.contract)
            .with_input(input);
        if let Some(value) = options.value {
            tx.set_value(value);
        }
        if let Some(gas) = options.gas {
            tx.set_gas_limit(gas);
        }

        let pending = self.provider.send_transaction(tx).await?;
        let tx_hash = *pending.tx_hash();
        debug!(from = %options.from, tx_hash = %tx_hash, "transaction submitted");

        self.wait_for_receipt(tx_hash).await
    }

    async fn subscribe(&self, topic: B256, from_block: u64) -> Result<EventStream, GatewayError> {
        // An unreachable node fails the subscription itself.
        let latest = self.provider.get_block_number().await?;
        info!(topic = %topic, from_block, latest, "subscribed to contract events");

        let poller = LogPoller {
            gateway: self.clone(),
            topic,
            next_block: from_block,
            backlog: VecDeque::new(),
        };

        Ok(Box::pin(stream::unfold(Some(poller), |state| async move {
            let mut poller = state?;
            match poller.next_event().await {
                Ok(event) => Some((Ok(event), Some(poller))),
                Err(err) => Some((Err(err), None)),
            }
        })))
    }
}

struct LogPoller {
    gateway: JsonRpcGateway,
    topic: B256,
    next_block: u64,
    backlog: VecDeque<ChainEvent>,
}

impl LogPoller {
    /// Hands out buffered logs first; polls the next block range only once
    /// the backlog is empty, and sleeps when the chain has not moved.
    async fn next_event(&mut self) -> Result<ChainEvent, GatewayError> {
        loop {
            if let Some(event) = self.backlog.pop_front() {
                return Ok(event);
            }

            let latest = self.gateway.provider.get_block_number().await?;
            if latest >= self.next_block {
                let to_block = latest.min(self.next_block.saturating_add(MAX_LOG_RANGE - 1));
                let events = self.gateway.logs(self.topic, self.next_block, to_block).await?;
                debug!(
                    from_block = self.next_block,
                    to_block,
                    found = events.len(),
                    "polled contract logs"
                );

                self.backlog.extend(events);
                self.next_block = to_block + 1;

                if !self.backlog.is_empty() || to_block < latest {
                    continue;
                }
            }

            sleep(self.gateway.poll_interval).await;
        }
    }
}
