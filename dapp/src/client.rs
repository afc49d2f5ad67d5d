//! FlightSurety contract client
//!
//! Reads go out as calls from the owner account and writes as transactions
//! signed by the node. Call [`FlightSuretyClient::initialize`] before anything
//! else: it assigns the owner, airline and passenger roles from the node's
//! accounts.

use std::sync::Arc;

use alloy::primitives::utils::{format_ether, parse_ether};
use alloy::primitives::{Address, U256};
use alloy::sol_types::SolCall;
use chrono::Utc;
use futures_util::future::join_all;
use tracing::{debug, info};

use flightsurety_oracles::config::NetworkConfig;
use flightsurety_oracles::contract::{FlightSuretyApp, FlightSuretyData};
use flightsurety_oracles::gateway::{JsonRpcGateway, SharedGateway, TxOptions, TxReceipt};

use crate::error::ClientError;
use crate::models::{Flight, PassengerInsurance, StatusQuery};

const AIRLINES: usize = 5;
const PASSENGERS: usize = 5;

/// Most flights [`FlightSuretyClient::get_flights`] will read, one call each.
pub const MAX_FLIGHTS: usize = 1_000;

/// Accounts used by the client, taken in order from the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roster {
    pub owner: Address,
    pub airlines: Vec<Address>,
    pub passengers: Vec<Address>,
}

impl Roster {
    /// Account 0 owns the contracts, the next five are airlines and the five
    /// after that passengers.
    pub fn from_accounts(accounts: &[Address]) -> Result<Self, ClientError> {
        let needed = 1 + AIRLINES + PASSENGERS;
        if accounts.len() < needed {
            return Err(ClientError::NotEnoughAccounts {
                needed,
                available: accounts.len(),
            });
        }
        Ok(Self {
            owner: accounts[0],
            airlines: accounts[1..=AIRLINES].to_vec(),
            passengers: accounts[1 + AIRLINES..needed].to_vec(),
        })
    }
}

pub struct FlightSuretyClient {
    app: SharedGateway,
    data: SharedGateway,
    app_address: Address,
    roster: Option<Roster>,
}

impl FlightSuretyClient {
    pub fn new(app: SharedGateway, data: SharedGateway, app_address: Address) -> Self {
        Self {
            app,
            data,
            app_address,
            roster: None,
        }
    }

    /// JSON-RPC client for the network's app and data contracts.
    pub fn connect(network: &NetworkConfig) -> Result<Self, ClientError> {
        Ok(Self::new(
            Arc::new(JsonRpcGateway::new(&network.url, network.app_address)?),
            Arc::new(JsonRpcGateway::new(&network.url, network.data_address)?),
            network.app_address,
        ))
    }

    pub async fn initialize(&mut self) -> Result<&Roster, ClientError> {
        let accounts = self.app.accounts().await?;
        let roster = Roster::from_accounts(&accounts)?;
        info!(owner = %roster.owner, "client initialized");
        Ok(self.roster.insert(roster))
    }

    pub fn roster(&self) -> Option<&Roster> {
        self.roster.as_ref()
    }

    fn owner(&self) -> Result<Address, ClientError> {
        self.roster
            .as_ref()
            .map(|roster| roster.owner)
            .ok_or(ClientError::NotInitialized)
    }

    /// Ensures the data contract accepts calls from the app contract.
    /// Returns `true` once authorized.
    pub async fn authorize_app_contract(&self) -> Result<bool, ClientError> {
        let owner = self.owner()?;
        let status = FlightSuretyData::getAppContractAuthorizationStatusCall {
            appContract: self.app_address,
        };
        if self.data.read(&status, owner).await? {
            debug!(app = %self.app_address, "app contract already authorized");
            return Ok(true);
        }

        let authorize = FlightSuretyData::setAppContractAuthorizationStatusCall {
            appContract: self.app_address,
            status: true,
        };
        let receipt = self.data.submit(&authorize, TxOptions::sender(owner)).await?;
        info!(app = %self.app_address, tx_hash = %receipt.tx_hash, "app contract authorized");
        Ok(true)
    }

    pub async fn is_operational(&self) -> Result<bool, ClientError> {
        let owner = self.owner()?;
        Ok(self.app.read(&FlightSuretyApp::isOperationalCall {}, owner).await?)
    }

    /// Owner balance held by the app contract, in ether.
    pub async fn get_balance(&self) -> Result<String, ClientError> {
        let owner = self.owner()?;
        let wei = self.app.read(&FlightSuretyApp::getBalanceCall {}, owner).await?;
        Ok(ether(wei))
    }

    pub async fn withdraw_balance(&self) -> Result<TxReceipt, ClientError> {
        self.send_as_owner(&FlightSuretyApp::withdrawBalanceCall {}, None)
            .await
    }

    /// Every registered flight, in contract order. A count above
    /// [`MAX_FLIGHTS`] is refused before any flight is read.
    pub async fn get_flights(&self) -> Result<Vec<Flight>, ClientError> {
        let owner = self.owner()?;
        let reported = self
            .app
            .read(&FlightSuretyApp::getFlightsCountCall {}, owner)
            .await?;
        let count = usize::try_from(reported)
            .ok()
            .filter(|count| *count <= MAX_FLIGHTS)
            .ok_or(ClientError::TooManyFlights {
                count: reported,
                max: MAX_FLIGHTS,
            })?;

        let mut flights = Vec::with_capacity(count);
        for index in 0..count {
            let call = FlightSuretyApp::getFlightCall {
                index: U256::from(index),
            };
            let flight = self.app.read(&call, owner).await?;
            flights.push(Flight {
                airline: flight.airline,
                flight: flight.flight,
                timestamp: u64::try_from(flight.timestamp).map_err(|_| ClientError::UnexpectedOutput {
                    method: "getFlight",
                    reason: format!("timestamp {} out of range", flight.timestamp),
                })?,
                status_code: flight.statusCode,
            });
        }
        Ok(flights)
    }

    pub async fn buy_insurance(
        &self,
        airline: Address,
        flight: &str,
        timestamp: u64,
        amount_ether: &str,
    ) -> Result<TxReceipt, ClientError> {
        let value = parse_ether(amount_ether).map_err(|source| ClientError::InvalidAmount {
            amount: amount_ether.to_string(),
            source,
        })?;
        let call = FlightSuretyApp::buyInsuranceCall {
            airline,
            flight: flight.to_string(),
            timestamp: U256::from(timestamp),
        };
        self.send_as_owner(&call, Some(value)).await
    }

    pub async fn claim_insurance(
        &self,
        airline: Address,
        flight: &str,
        timestamp: u64,
    ) -> Result<TxReceipt, ClientError> {
        let call = FlightSuretyApp::claimInsuranceCall {
            airline,
            flight: flight.to_string(),
            timestamp: U256::from(timestamp),
        };
        self.send_as_owner(&call, None).await
    }

    /// Policies held on `flights`. Flights without a purchase are left out.
    pub async fn get_passenger_insurances(
        &self,
        flights: &[Flight],
    ) -> Result<Vec<PassengerInsurance>, ClientError> {
        let owner = self.owner()?;
        let lookups = flights.iter().map(|flight| async move {
            let call = FlightSuretyApp::getInsuranceCall {
                flight: flight.flight.clone(),
            };
            let insurance = self.app.read(&call, owner).await?;
            let policy = (!insurance.amount.is_zero()).then(|| PassengerInsurance {
                amount: ether(insurance.amount),
                payout_amount: ether(insurance.payoutAmount),
                state: insurance.state,
                flight: flight.clone(),
            });
            Ok::<_, ClientError>(policy)
        });

        let mut insurances = Vec::new();
        for insurance in join_all(lookups).await {
            if let Some(insurance) = insurance? {
                insurances.push(insurance);
            }
        }
        Ok(insurances)
    }

    /// Asks the oracles for the status of `flight` operated by the first
    /// airline, as of now. Returns the submitted key.
    pub async fn fetch_flight_status(&self, flight: &str) -> Result<StatusQuery, ClientError> {
        let airline = self
            .roster
            .as_ref()
            .ok_or(ClientError::NotInitialized)?
            .airlines[0];
        let query = StatusQuery {
            airline,
            flight: flight.to_string(),
            timestamp: u64::try_from(Utc::now().timestamp()).unwrap_or_default(),
        };

        let call = FlightSuretyApp::fetchFlightStatusCall {
            airline: query.airline,
            flight: query.flight.clone(),
            timestamp: U256::from(query.timestamp),
        };
        let receipt = self.send_as_owner(&call, None).await?;
        info!(
            airline = %query.airline,
            flight = %query.flight,
            timestamp = query.timestamp,
            tx_hash = %receipt.tx_hash,
            "flight status requested"
        );
        Ok(query)
    }

    async fn send_as_owner<C: SolCall>(&self, call: &C, value: Option<U256>) -> Result<TxReceipt, ClientError> {
        let mut options = TxOptions::sender(self.owner()?);
        if let Some(wei) = value {
            options = options.value(wei);
        }
        let receipt = self.app.submit(call, options).await?;
        debug!(method = C::SIGNATURE, tx_hash = %receipt.tx_hash, "transaction confirmed");
        Ok(receipt)
    }
}

/// Wei as a decimal ether string without trailing zeros.
fn ether(wei: U256) -> String {
    let formatted = format_ether(wei);
    if !formatted.contains('.') {
        return formatted;
    }
    formatted.trim_end_matches('0').trim_end_matches('.').to_string()
}

#[cfg(test)]
mod tests {
    use flightsurety_oracles::contract::FlightSuretyApp::{
        buyInsuranceCall, claimInsuranceCall, fetchFlightStatusCall, getBalanceCall, getFlightCall,
        getFlightReturn, getFlightsCountCall, getInsuranceCall, getInsuranceReturn, isOperationalCall,
        withdrawBalanceCall,
    };
    use flightsurety_oracles::contract::FlightSuretyData::{
        getAppContractAuthorizationStatusCall, setAppContractAuthorizationStatusCall,
    };
    use flightsurety_oracles::error::GatewayError;
    use flightsurety_oracles::gateway::memory::{account, MemoryGateway};

    use super::*;

    const ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);

    fn client(app_chain: &MemoryGateway, data_chain: &MemoryGateway) -> FlightSuretyClient {
        FlightSuretyClient::new(Arc::new(app_chain.clone()), Arc::new(data_chain.clone()), account(500))
    }

    async fn initialized(app_chain: &MemoryGateway, data_chain: &MemoryGateway) -> FlightSuretyClient {
        let mut client = client(app_chain, data_chain);
        client.initialize().await.unwrap();
        client
    }

    fn flight(n: u64, name: &str) -> Flight {
        Flight {
            airline: account(n),
            flight: name.to_string(),
            timestamp: 1_700_000_000 + n,
            status_code: 0,
        }
    }

    #[test]
    fn test_ether_display_drops_trailing_zeros() {
        assert_eq!(ether(ETHER * U256::from(3) / U256::from(2)), "1.5");
        assert_eq!(ether(ETHER * U256::from(10)), "10");
        assert_eq!(ether(U256::ZERO), "0");
        assert_eq!(ether(U256::from(1)), "0.000000000000000001");
    }

    #[tokio::test]
    async fn test_initialize_assigns_roles_in_account_order() {
        let app_chain = MemoryGateway::with_accounts(12);
        let data_chain = MemoryGateway::default();
        let mut client = client(&app_chain, &data_chain);

        let roster = client.initialize().await.unwrap().clone();
        assert_eq!(roster.owner, account(0));
        assert_eq!(roster.airlines, (1..=5).map(account).collect::<Vec<_>>());
        assert_eq!(roster.passengers, (6..=10).map(account).collect::<Vec<_>>());
        assert_eq!(client.roster(), Some(&roster));
    }

    #[tokio::test]
    async fn test_initialize_needs_eleven_accounts() {
        let app_chain = MemoryGateway::with_accounts(10);
        let mut client = client(&app_chain, &MemoryGateway::default());

        let err = client.initialize().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::NotEnoughAccounts {
                needed: 11,
                available: 10
            }
        ));
    }

    #[tokio::test]
    async fn test_operations_require_initialize() {
        let app_chain = MemoryGateway::with_accounts(11);
        let client = client(&app_chain, &MemoryGateway::default());

        assert!(matches!(client.is_operational().await, Err(ClientError::NotInitialized)));
        assert!(matches!(
            client.fetch_flight_status("ND1309").await,
            Err(ClientError::NotInitialized)
        ));
        assert!(app_chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_authorize_skips_transaction_when_already_authorized() {
        let app_chain = MemoryGateway::with_accounts(11);
        let data_chain = MemoryGateway::default();
        data_chain.on_call(|_: getAppContractAuthorizationStatusCall, _| Ok(true));
        let client = initialized(&app_chain, &data_chain).await;

        assert!(client.authorize_app_contract().await.unwrap());
        assert!(data_chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_authorize_sends_from_owner_when_not_authorized() {
        let app_chain = MemoryGateway::with_accounts(11);
        let data_chain = MemoryGateway::default();
        data_chain.on_call(|call: getAppContractAuthorizationStatusCall, _| {
            assert_eq!(call.appContract, account(500));
            Ok(false)
        });
        data_chain.on_send(|_: setAppContractAuthorizationStatusCall, _| Ok(()));
        let client = initialized(&app_chain, &data_chain).await;

        assert!(client.authorize_app_contract().await.unwrap());
        let sent = data_chain.sent_to::<setAppContractAuthorizationStatusCall>();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, account(0));
        assert_eq!(
            sent[0].decode::<setAppContractAuthorizationStatusCall>(),
            Some(setAppContractAuthorizationStatusCall {
                appContract: account(500),
                status: true,
            })
        );
    }

    #[tokio::test]
    async fn test_balance_is_reported_in_ether_and_withdrawn_by_owner() {
        let app_chain = MemoryGateway::with_accounts(11);
        app_chain.on_call(|_: isOperationalCall, _| Ok(true));
        app_chain.on_call(|_: getBalanceCall, _| Ok(ETHER * U256::from(3) / U256::from(2)));
        app_chain.on_send(|_: withdrawBalanceCall, _| Ok(()));
        let client = initialized(&app_chain, &MemoryGateway::default()).await;

        assert!(client.is_operational().await.unwrap());
        assert_eq!(client.get_balance().await.unwrap(), "1.5");
        client.withdraw_balance().await.unwrap();

        let sent = app_chain.sent_to::<withdrawBalanceCall>();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].from, account(0));
        assert_eq!(sent[0].value, None);
    }

    #[tokio::test]
    async fn test_get_flights_reads_every_index() {
        let app_chain = MemoryGateway::with_accounts(11);
        app_chain.on_call(|_: getFlightsCountCall, _| Ok(U256::from(2)));
        app_chain.on_call(|call: getFlightCall, _| {
            let index = u64::try_from(call.index).unwrap();
            Ok(getFlightReturn {
                airline: account(1),
                flight: format!("ND130{index}"),
                timestamp: U256::from(1_700_000_000 + index),
                statusCode: 10 * index as u8,
            })
        });
        let client = initialized(&app_chain, &MemoryGateway::default()).await;

        let flights = client.get_flights().await.unwrap();
        assert_eq!(flights.len(), 2);
        assert_eq!(flights[1].flight, "ND1301");
        assert_eq!(flights[1].timestamp, 1_700_000_001);
        assert_eq!(flights[1].status_code, 10);
    }

    #[tokio::test]
    async fn test_flight_count_is_bounded() {
        let app_chain = MemoryGateway::with_accounts(11);
        app_chain.on_call(|_: getFlightsCountCall, _| Ok(U256::MAX));
        let client = initialized(&app_chain, &MemoryGateway::default()).await;

        let err = client.get_flights().await.unwrap_err();
        assert!(matches!(
            err,
            ClientError::TooManyFlights { count, max: MAX_FLIGHTS } if count == U256::MAX
        ));

        app_chain.on_call(|_: getFlightsCountCall, _| Ok(U256::from(MAX_FLIGHTS + 1)));
        assert!(matches!(
            client.get_flights().await,
            Err(ClientError::TooManyFlights { .. })
        ));
    }

    #[tokio::test]
    async fn test_out_of_range_flight_timestamp_is_reported() {
        let app_chain = MemoryGateway::with_accounts(11);
        app_chain.on_call(|_: getFlightsCountCall, _| Ok(U256::from(1)));
        app_chain.on_call(|_: getFlightCall, _| {
            Ok(getFlightReturn {
                airline: account(1),
                flight: "ND1309".to_string(),
                timestamp: U256::MAX,
                statusCode: 0,
            })
        });
        let client = initialized(&app_chain, &MemoryGateway::default()).await;

        assert!(matches!(
            client.get_flights().await,
            Err(ClientError::UnexpectedOutput { method: "getFlight", .. })
        ));
    }

    #[tokio::test]
    async fn test_buy_insurance_converts_ether_to_wei() {
        let app_chain = MemoryGateway::with_accounts(11);
        app_chain.on_send(|_: buyInsuranceCall, _| Ok(()));
        app_chain.on_send(|_: claimInsuranceCall, _| Ok(()));
        let client = initialized(&app_chain, &MemoryGateway::default()).await;

        client
            .buy_insurance(account(1), "ND1309", 1_700_000_000, "0.5")
            .await
            .unwrap();
        client
            .claim_insurance(account(1), "ND1309", 1_700_000_000)
            .await
            .unwrap();

        let bought = app_chain.sent_to::<buyInsuranceCall>();
        assert_eq!(bought[0].value, Some(ETHER / U256::from(2)));
        assert_eq!(
            bought[0].decode::<buyInsuranceCall>(),
            Some(buyInsuranceCall {
                airline: account(1),
                flight: "ND1309".to_string(),
                timestamp: U256::from(1_700_000_000u64),
            })
        );
        assert_eq!(app_chain.sent_to::<claimInsuranceCall>()[0].value, None);
    }

    #[tokio::test]
    async fn test_invalid_amount_sends_nothing() {
        let app_chain = MemoryGateway::with_accounts(11);
        let client = initialized(&app_chain, &MemoryGateway::default()).await;

        let err = client
            .buy_insurance(account(1), "ND1309", 1, "one ether")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::InvalidAmount { ref amount, .. } if amount == "one ether"));
        assert!(app_chain.sent().is_empty());
    }

    #[tokio::test]
    async fn test_passenger_insurances_skip_unbought_flights() {
        let app_chain = MemoryGateway::with_accounts(11);
        app_chain.on_call(|call: getInsuranceCall, _| {
            let amount = if call.flight == "ND1309" { ETHER } else { U256::ZERO };
            Ok(getInsuranceReturn {
                amount,
                payoutAmount: amount * U256::from(3) / U256::from(2),
                state: 1,
            })
        });
        let client = initialized(&app_chain, &MemoryGateway::default()).await;

        let flights = [flight(1, "ND1309"), flight(2, "ND1310")];
        let insurances = client.get_passenger_insurances(&flights).await.unwrap();

        assert_eq!(
            insurances,
            vec![PassengerInsurance {
                amount: "1".to_string(),
                payout_amount: "1.5".to_string(),
                state: 1,
                flight: flights[0].clone(),
            }]
        );
    }

    #[tokio::test]
    async fn test_fetch_flight_status_uses_first_airline_and_current_time() {
        let app_chain = MemoryGateway::with_accounts(11);
        app_chain.on_send(|_: fetchFlightStatusCall, _| Ok(()));
        let client = initialized(&app_chain, &MemoryGateway::default()).await;

        let before = Utc::now().timestamp() as u64;
        let query = client.fetch_flight_status("ND1309").await.unwrap();
        let after = Utc::now().timestamp() as u64;

        assert_eq!(query.airline, account(1));
        assert_eq!(query.flight, "ND1309");
        assert!((before..=after).contains(&query.timestamp));

        let sent = app_chain.sent_to::<fetchFlightStatusCall>();
        assert_eq!(sent[0].from, account(0));
        assert_eq!(
            sent[0].decode::<fetchFlightStatusCall>(),
            Some(fetchFlightStatusCall {
                airline: account(1),
                flight: "ND1309".to_string(),
                timestamp: U256::from(query.timestamp),
            })
        );
    }

    #[tokio::test]
    async fn test_rejected_transaction_is_returned() {
        let app_chain = MemoryGateway::with_accounts(11);
        app_chain.on_send(|_: claimInsuranceCall, _| {
            Err(GatewayError::Rejected("no payout available".into()))
        });
        let client = initialized(&app_chain, &MemoryGateway::default()).await;

        let err = client
            .claim_insurance(account(1), "ND1309", 1)
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Gateway(GatewayError::Rejected(_))));
    }
}
