//! In-process chain double
//!
//! Calls are scripted per function selector with typed closures; every
//! transaction attempt is recorded so tests can assert on what was
//! submitted, and by whom.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use alloy::primitives::{Address, Bytes, LogData, B256, U256};
use alloy::sol_types::{SolCall, SolEvent};
use async_trait::async_trait;
use futures_util::stream;
use tokio::sync::mpsc;
use tokio::time::{sleep, Instant};

use super::{ChainEvent, ChainGateway, EventStream, TxOptions, TxReceipt};
use crate::contract::FlightSuretyApp;
use crate::error::GatewayError;

/// One `call` or `send` as seen by the chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub input: Bytes,
    pub from: Address,
    pub value: Option<U256>,
    pub gas: Option<u64>,
}

impl Invocation {
    pub fn selector(&self) -> Option<[u8; 4]> {
        self.input.get(..4).and_then(|head| head.try_into().ok())
    }

    pub fn is<C: SolCall>(&self) -> bool {
        self.selector() == Some(C::SELECTOR)
    }

    /// The call's arguments, if this invocation is a `C`.
    pub fn decode<C: SolCall>(&self) -> Option<C> {
        C::abi_decode(&self.input).ok()
    }
}

type Handler = Arc<dyn Fn(&Invocation) -> Result<Bytes, GatewayError> + Send + Sync>;
type Subscriber = mpsc::UnboundedSender<Result<ChainEvent, GatewayError>>;

#[derive(Default)]
struct ChainState {
    accounts: Vec<Address>,
    calls: HashMap<[u8; 4], Handler>,
    sends: HashMap<[u8; 4], Handler>,
    stalled: HashSet<Address>,
    sent: Vec<Invocation>,
    emitted: Vec<ChainEvent>,
    subscribers: Vec<(B256, Subscriber)>,
    subscribe_failure: Option<String>,
    block_number: u64,
    tx_count: u64,
}

#[derive(Clone, Default)]
pub struct MemoryGateway {
    state: Arc<Mutex<ChainState>>,
}

/// Deterministic test account number `n`.
pub fn account(n: u64) -> Address {
    let mut bytes = [0x11; 20];
    bytes[12..].copy_from_slice(&n.to_be_bytes());
    Address::new(bytes)
}

fn typed<C, F, R>(handler: F, encode: fn(&R) -> Bytes) -> Handler
where
    C: SolCall + 'static,
    F: Fn(C, &Invocation) -> Result<R, GatewayError> + Send + Sync + 'static,
    R: 'static,
{
    Arc::new(move |invocation: &Invocation| {
        let call = C::abi_decode(&invocation.input)?;
        handler(call, invocation).map(|ret| encode(&ret))
    })
}

impl MemoryGateway {
    pub fn new(accounts: Vec<Address>) -> Self {
        let gateway = Self::default();
        gateway.lock().accounts = accounts;
        gateway
    }

    /// A chain exposing `count` accounts built with [`account`].
    pub fn with_accounts(count: u64) -> Self {
        Self::new((0..count).map(account).collect())
    }

    fn lock(&self) -> MutexGuard<'_, ChainState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Scripts the view function `C`.
    pub fn on_call<C, F>(&self, handler: F)
    where
        C: SolCall + 'static,
        F: Fn(C, &Invocation) -> Result<C::Return, GatewayError> + Send + Sync + 'static,
    {
        let encode: fn(&C::Return) -> Bytes = |ret| Bytes::from(C::abi_encode_returns(ret));
        self.lock().calls.insert(C::SELECTOR, typed(handler, encode));
    }

    /// Scripts the transaction `C`; an `Err` rejects it.
    pub fn on_send<C, F>(&self, handler: F)
    where
        C: SolCall + 'static,
        F: Fn(C, &Invocation) -> Result<(), GatewayError> + Send + Sync + 'static,
    {
        let encode: fn(&()) -> Bytes = |_| Bytes::new();
        self.lock().sends.insert(C::SELECTOR, typed(handler, encode));
    }

    /// Transactions from `address` are recorded but never confirmed.
    pub fn stall_sends_from(&self, address: Address) {
        self.lock().stalled.insert(address);
    }

    pub fn fail_subscriptions(&self, message: impl Into<String>) {
        self.lock().subscribe_failure = Some(message.into());
    }

    /// Installs the oracle half of `FlightSuretyApp`: a fixed registration
    /// fee, index triples preassigned per address, and an accepting
    /// `submitOracleResponse`. Addresses without an assignment, repeated
    /// registrations and underpaid fees revert.
    pub fn with_oracle_contract(self, fee: U256, assignments: Vec<(Address, [u8; 3])>) -> Self {
        let assignments: Arc<HashMap<Address, [u8; 3]>> = Arc::new(assignments.into_iter().collect());
        let registered: Arc<Mutex<HashSet<Address>>> = Arc::default();

        self.on_call(move |_: FlightSuretyApp::REGISTRATION_FEECall, _| Ok(fee));

        let (known, enrolled) = (Arc::clone(&assignments), Arc::clone(&registered));
        self.on_send(move |_: FlightSuretyApp::registerOracleCall, tx| {
            if tx.value.unwrap_or_default() < fee {
                return Err(GatewayError::Rejected("registration fee is required".into()));
            }
            if !known.contains_key(&tx.from) {
                return Err(GatewayError::Rejected(format!("no index assignment for {}", tx.from)));
            }
            let mut enrolled = enrolled.lock().unwrap_or_else(PoisonError::into_inner);
            if !enrolled.insert(tx.from) {
                return Err(GatewayError::Rejected("oracle already registered".into()));
            }
            Ok(())
        });

        let enrolled = Arc::clone(&registered);
        self.on_call(move |_: FlightSuretyApp::getMyIndexesCall, tx| {
            let is_registered = enrolled
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .contains(&tx.from);
            match assignments.get(&tx.from) {
                Some(indexes) if is_registered => Ok(*indexes),
                _ => Err(GatewayError::Rejected("not registered as an oracle".into())),
            }
        });

        self.on_send(|_: FlightSuretyApp::submitOracleResponseCall, _| Ok(()));
        self
    }

    /// Emits a log into the next block and delivers it to live subscribers.
    pub fn emit(&self, data: LogData) {
        let mut state = self.lock();
        state.block_number += 1;
        let event = ChainEvent {
            block_number: state.block_number,
            tx_hash: None,
            data,
        };
        let topic = event.topic0();
        state
            .subscribers
            .retain(|(subscribed, tx)| Some(*subscribed) != topic || tx.send(Ok(event.clone())).is_ok());
        state.emitted.push(event);
    }

    pub fn emit_oracle_request(&self, index: u8, airline: Address, flight: &str, timestamp: u64) {
        self.emit(
            FlightSuretyApp::OracleRequest {
                index,
                airline,
                flight: flight.to_string(),
                timestamp: U256::from(timestamp),
            }
            .encode_log_data(),
        );
    }

    /// Pushes a transport failure into every live subscription.
    pub fn break_subscriptions(&self, message: &str) {
        let mut state = self.lock();
        for (_, tx) in state.subscribers.drain(..) {
            let _ = tx.send(Err(GatewayError::Unavailable(message.to_string())));
        }
    }

    /// Every transaction attempt so far, confirmed or not.
    pub fn sent(&self) -> Vec<Invocation> {
        self.lock().sent.clone()
    }

    pub fn sent_to<C: SolCall>(&self) -> Vec<Invocation> {
        self.lock()
            .sent
            .iter()
            .filter(|invocation| invocation.is::<C>())
            .cloned()
            .collect()
    }

    /// Waits until at least `count` attempts of `C` were recorded.
    pub async fn wait_for_sent<C: SolCall>(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.sent_to::<C>().len() >= count {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            sleep(Duration::from_millis(5)).await;
        }
    }
}

#[async_trait]
impl ChainGateway for MemoryGateway {
    async fn accounts(&self) -> Result<Vec<Address>, GatewayError> {
        Ok(self.lock().accounts.clone())
    }

    async fn call(&self, input: Bytes, from: Address) -> Result<Bytes, GatewayError> {
        let invocation = Invocation {
            input,
            from,
            value: None,
            gas: None,
        };
        let handler = invocation
            .selector()
            .and_then(|selector| self.lock().calls.get(&selector).cloned());
        match handler {
            Some(handler) => handler(&invocation),
            None => Err(GatewayError::Rejected(format!(
                "call {:?} is not scripted",
                invocation.selector()
            ))),
        }
    }

    async fn send(&self, input: Bytes, options: TxOptions) -> Result<TxReceipt, GatewayError> {
        let invocation = Invocation {
            input,
            from: options.from,
            value: options.value,
            gas: options.gas,
        };

        let (handler, stalled) = {
            let mut state = self.lock();
            state.sent.push(invocation.clone());
            (
                invocation
                    .selector()
                    .and_then(|selector| state.sends.get(&selector).cloned()),
                state.stalled.contains(&options.from),
            )
        };

        if stalled {
            std::future::pending::<()>().await;
        }

        match handler {
            Some(handler) => handler(&invocation)?,
            None => {
                return Err(GatewayError::Rejected(format!(
                    "transaction {:?} is not scripted",
                    invocation.selector()
                )))
            }
        };

        let mut state = self.lock();
        state.tx_count += 1;
        state.block_number += 1;
        Ok(TxReceipt {
            tx_hash: B256::from(U256::from(state.tx_count)),
            block_number: Some(state.block_number),
        })
    }

    async fn subscribe(&self, topic: B256, from_block: u64) -> Result<EventStream, GatewayError> {
        let mut state = self.lock();
        if let Some(message) = state.subscribe_failure.clone() {
            return Err(GatewayError::Unavailable(message));
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for past in state
            .emitted
            .iter()
            .filter(|past| past.topic0() == Some(topic) && past.block_number >= from_block)
        {
            let _ = tx.send(Ok(past.clone()));
        }
        state.subscribers.push((topic, tx));

        Ok(Box::pin(stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}
