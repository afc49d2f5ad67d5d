//! Oracle event listener
//!
//! Receives `OracleRequest` events one at a time and, for each, matches the
//! request against the registry and starts the eligible oracles' responses.
//! Responses run in the background; the listener goes back to `Idle` as soon
//! as they are started.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alloy::sol_types::SolEvent;
use futures_util::StreamExt;
use tokio::task::{JoinError, JoinSet};
use tracing::{debug, error, info, warn};

use crate::contract::FlightSuretyApp;
use crate::error::ListenerError;
use crate::gateway::{ChainEvent, SharedGateway};
use crate::models::StatusRequest;
use crate::services::dispatcher::{ResponseDispatcher, SubmissionOutcome};
use crate::services::matcher;
use crate::services::registry::OracleRegistry;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Subscribed, no request being processed.
    Idle,
    /// A request was received and its responses are being started.
    Dispatching { index: u8 },
}

#[derive(Debug, Clone, Copy)]
pub struct ListenerConfig {
    pub from_block: u64,
    /// How long in-flight responses may still finish after shutdown.
    pub shutdown_grace: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            from_block: 0,
            shutdown_grace: Duration::from_secs(5),
        }
    }
}

/// Counters accumulated over a listener run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListenerReport {
    pub events_received: u64,
    pub events_unmatched: u64,
    pub events_malformed: u64,
    pub submissions_started: u64,
    pub submissions_accepted: u64,
    pub submissions_rejected: u64,
    pub submissions_abandoned: u64,
}

pub struct OracleEventListener {
    gateway: SharedGateway,
    registry: Arc<OracleRegistry>,
    dispatcher: ResponseDispatcher,
    config: ListenerConfig,
    state: ListenerState,
    in_flight: JoinSet<SubmissionOutcome>,
    report: ListenerReport,
}

impl OracleEventListener {
    pub fn new(
        gateway: SharedGateway,
        registry: Arc<OracleRegistry>,
        dispatcher: ResponseDispatcher,
        config: ListenerConfig,
    ) -> Self {
        Self {
            gateway,
            registry,
            dispatcher,
            config,
            state: ListenerState::Idle,
            in_flight: JoinSet::new(),
            report: ListenerReport::default(),
        }
    }

    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Responses started but not yet finished.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn report(&self) -> &ListenerReport {
        &self.report
    }

    fn transition(&mut self, next: ListenerState) {
        debug!(from = ?self.state, to = ?next, "listener state change");
        self.state = next;
    }

    /// Processes one inbound log. Never waits on a submission; a log that
    /// does not decode is counted and skipped.
    pub fn handle_event(&mut self, event: ChainEvent) {
        self.report.events_received += 1;

        let request = match StatusRequest::try_from(&event) {
            Ok(request) => request,
            Err(err) => {
                self.report.events_malformed += 1;
                warn!(block = event.block_number, error = %err, "ignoring malformed oracle request");
                return;
            }
        };

        self.transition(ListenerState::Dispatching {
            index: request.index,
        });
        info!(
            index = request.index,
            airline = %request.airline,
            flight = %request.flight,
            timestamp = %request.timestamp,
            block = event.block_number,
            "new flight status request"
        );

        let eligible = matcher::eligible(&self.registry, request.index);
        if eligible.is_empty() {
            self.report.events_unmatched += 1;
            info!(index = request.index, "no registered oracle holds this index; nothing to submit");
        } else {
            info!(index = request.index, matching = eligible.len(), "matching oracles will respond");
            let started = self
                .dispatcher
                .dispatch(&request, &eligible, &mut self.in_flight);
            self.report.submissions_started += started as u64;
        }

        self.transition(ListenerState::Idle);
    }

    fn record_completion(&mut self, joined: Result<SubmissionOutcome, JoinError>) {
        match joined {
            Ok(outcome) if outcome.is_accepted() => self.report.submissions_accepted += 1,
            Ok(_) => self.report.submissions_rejected += 1,
            Err(err) if err.is_cancelled() => self.report.submissions_abandoned += 1,
            Err(err) => {
                error!(error = %err, "oracle response task panicked");
                self.report.submissions_rejected += 1;
            }
        }
    }

    /// Lets in-flight responses finish within the grace period, then aborts
    /// the rest.
    async fn drain(&mut self) {
        if self.in_flight.is_empty() {
            return;
        }

        info!(
            pending = self.in_flight.len(),
            grace_ms = self.config.shutdown_grace.as_millis() as u64,
            "waiting for in-flight oracle responses"
        );

        let deadline = tokio::time::sleep(self.config.shutdown_grace);
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                _ = &mut deadline => break,
                joined = self.in_flight.join_next() => match joined {
                    Some(joined) => self.record_completion(joined),
                    None => return,
                },
            }
        }

        let abandoned = self.in_flight.len();
        self.in_flight.shutdown().await;
        self.report.submissions_abandoned += abandoned as u64;
        warn!(abandoned, "abandoned oracle responses still in flight at shutdown");
    }

    /// Subscribes to `OracleRequest` and processes events until `shutdown`
    /// resolves or the subscription fails.
    pub async fn run<S>(mut self, shutdown: S) -> Result<ListenerReport, ListenerError>
    where
        S: Future<Output = ()>,
    {
        let mut events = self
            .gateway
            .subscribe(FlightSuretyApp::OracleRequest::SIGNATURE_HASH, self.config.from_block)
            .await
            .map_err(ListenerError::Subscribe)?;

        if self.registry.is_empty() {
            warn!("no oracles registered; requests will be received but never answered");
        }
        info!(
            oracles = self.registry.len(),
            from_block = self.config.from_block,
            "listening for oracle requests"
        );

        tokio::pin!(shutdown);

        let failure = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("shutdown requested");
                    break None;
                }
                Some(joined) = self.in_flight.join_next(), if !self.in_flight.is_empty() => {
                    self.record_completion(joined);
                }
                next = events.next() => match next {
                    Some(Ok(event)) => self.handle_event(event),
                    Some(Err(err)) => break Some(ListenerError::Subscription(err)),
                    None => break Some(ListenerError::StreamClosed),
                },
            }
        };

        self.drain().await;

        match failure {
            Some(err) => {
                error!(error = %err, "oracle listener stopped");
                Err(err)
            }
            None => Ok(self.report),
        }
    }
}
