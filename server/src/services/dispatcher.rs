//! Response dispatch
//!
//! Every eligible oracle answers in its own task. Tasks share nothing but the
//! gateway, so one rejected or stuck transaction never holds up another.

use std::sync::Arc;

use alloy::primitives::Address;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::gateway::{SharedGateway, TxOptions, TxReceipt};
use crate::models::{FlightStatus, OracleIdentity, StatusRequest};

/// Result of one oracle's `submitOracleResponse`
#[derive(Debug)]
pub struct SubmissionOutcome {
    pub oracle: Address,
    pub index: u8,
    pub status: FlightStatus,
    pub result: Result<TxReceipt, GatewayError>,
}

impl SubmissionOutcome {
    pub fn is_accepted(&self) -> bool {
        self.result.is_ok()
    }
}

#[derive(Clone)]
pub struct ResponseDispatcher {
    gateway: SharedGateway,
    gas: u64,
}

impl ResponseDispatcher {
    pub fn new(gateway: SharedGateway, gas: u64) -> Self {
        Self { gateway, gas }
    }

    /// Starts one submission per eligible oracle in `in_flight` and returns
    /// how many were started. Does not wait for any of them.
    ///
    /// No retries: the contract tolerates missing and duplicate answers.
    pub fn dispatch(
        &self,
        request: &StatusRequest,
        eligible: &[&OracleIdentity],
        in_flight: &mut JoinSet<SubmissionOutcome>,
    ) -> usize {
        for identity in eligible {
            let gateway = Arc::clone(&self.gateway);
            let oracle = identity.address();
            let status = identity.status();
            let index = request.index;
            let response = request.response(status);
            let options = TxOptions::sender(oracle).gas(self.gas);

            in_flight.spawn(async move {
                let result = gateway.submit(&response, options).await;

                match &result {
                    Ok(receipt) => info!(
                        oracle = %oracle,
                        index,
                        status = status.code(),
                        tx_hash = %receipt.tx_hash,
                        "oracle responded"
                    ),
                    Err(err) => warn!(
                        oracle = %oracle,
                        index,
                        status = status.code(),
                        error = %err,
                        "oracle response rejected"
                    ),
                }

                SubmissionOutcome {
                    oracle,
                    index,
                    status,
                    result,
                }
            });
        }

        eligible.len()
    }
}
