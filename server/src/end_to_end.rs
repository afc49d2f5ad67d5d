//! Registration through response against the in-process chain.

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolEvent;
use tokio::sync::oneshot;

use crate::contract::FlightSuretyApp::{self, registerOracleCall, submitOracleResponseCall};
use crate::event_listener::{ListenerConfig, ListenerState, OracleEventListener};
use crate::gateway::memory::{account, MemoryGateway};
use crate::gateway::{ChainEvent, SharedGateway};
use crate::oracle_server::{OracleServer, OracleSettings};
use crate::services::dispatcher::ResponseDispatcher;

const FEE: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);
const WAIT: Duration = Duration::from_secs(2);

fn settings(count: usize) -> OracleSettings {
    OracleSettings {
        oracle_count: count,
        first_account: 1,
        status_seed: Some(2024),
        listener: ListenerConfig {
            from_block: 0,
            shutdown_grace: Duration::from_millis(100),
        },
        ..OracleSettings::default()
    }
}

#[tokio::test]
async fn test_request_reaches_every_holder_of_the_index() {
    // pool positions 0, 2 and 4 hold index 2
    let gateway = MemoryGateway::with_accounts(6).with_oracle_contract(
        FEE,
        vec![
            (account(1), [2, 0, 1]),
            (account(2), [3, 4, 5]),
            (account(3), [6, 2, 7]),
            (account(4), [8, 9, 0]),
            (account(5), [1, 3, 2]),
        ],
    );
    let shared: SharedGateway = Arc::new(gateway.clone());

    let server = OracleServer::new(Arc::clone(&shared), settings(5));
    let registry = Arc::new(server.register_oracles().await.unwrap());
    assert_eq!(registry.len(), 5);

    let listener = OracleEventListener::new(
        Arc::clone(&shared),
        Arc::clone(&registry),
        ResponseDispatcher::new(shared, 5_555_555),
        settings(5).listener,
    );
    let (stop, stopped) = oneshot::channel::<()>();
    let running = tokio::spawn(listener.run(async move {
        let _ = stopped.await;
    }));

    gateway.emit_oracle_request(2, account(100), "ND1309", 1_700_000_000);
    assert!(gateway.wait_for_sent::<submitOracleResponseCall>(3, WAIT).await);
    tokio::time::sleep(Duration::from_millis(50)).await;

    let submissions = gateway.sent_to::<submitOracleResponseCall>();
    assert_eq!(submissions.len(), 3);

    let mut senders: Vec<Address> = submissions.iter().map(|tx| tx.from).collect();
    senders.sort();
    assert_eq!(senders, vec![account(1), account(3), account(5)]);

    for submission in &submissions {
        let oracle = registry.get(&submission.from).unwrap();
        assert_eq!(
            submission.decode::<submitOracleResponseCall>(),
            Some(submitOracleResponseCall {
                index: 2,
                airline: account(100),
                flight: "ND1309".to_string(),
                timestamp: U256::from(1_700_000_000u64),
                statusCode: oracle.status().code(),
            })
        );
    }

    stop.send(()).unwrap();
    let report = running.await.unwrap().unwrap();
    assert_eq!(report.events_received, 1);
    assert_eq!(report.submissions_started, 3);
    assert_eq!(report.submissions_accepted, 3);
}

#[tokio::test]
async fn test_request_for_unheld_index_submits_nothing() {
    let gateway = MemoryGateway::with_accounts(4).with_oracle_contract(
        FEE,
        vec![
            (account(1), [0, 1, 2]),
            (account(2), [3, 4, 5]),
            (account(3), [6, 7, 8]),
        ],
    );
    let shared: SharedGateway = Arc::new(gateway.clone());
    let registry = Arc::new(
        OracleServer::new(Arc::clone(&shared), settings(3))
            .register_oracles()
            .await
            .unwrap(),
    );

    let mut listener = OracleEventListener::new(
        Arc::clone(&shared),
        registry,
        ResponseDispatcher::new(shared, 5_555_555),
        settings(3).listener,
    );
    listener.handle_event(ChainEvent {
        block_number: 10,
        tx_hash: None,
        data: FlightSuretyApp::OracleRequest {
            index: 9,
            airline: account(100),
            flight: "ND1309".to_string(),
            timestamp: U256::from(1_700_000_000u64),
        }
        .encode_log_data(),
    });

    assert_eq!(listener.state(), ListenerState::Idle);
    assert_eq!(listener.in_flight(), 0);
    assert_eq!(listener.report().events_unmatched, 1);
    assert!(gateway.sent_to::<submitOracleResponseCall>().is_empty());
}

#[tokio::test]
async fn test_failed_registration_leaves_remaining_pool_listening() {
    // account 2 has no assignment, so its registration reverts
    let gateway = MemoryGateway::with_accounts(4).with_oracle_contract(
        FEE,
        vec![(account(1), [5, 1, 2]), (account(3), [5, 6, 7])],
    );

    let (stop, stopped) = oneshot::channel::<()>();
    let server = OracleServer::new(Arc::new(gateway.clone()), settings(3));
    let running = tokio::spawn(server.run(async move {
        let _ = stopped.await;
    }));

    assert!(gateway.wait_for_sent::<registerOracleCall>(3, WAIT).await);
    gateway.emit_oracle_request(5, account(100), "ND1309", 1_700_000_000);
    assert!(gateway.wait_for_sent::<submitOracleResponseCall>(2, WAIT).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!running.is_finished());

    let mut senders: Vec<Address> = gateway
        .sent_to::<submitOracleResponseCall>()
        .into_iter()
        .map(|tx| tx.from)
        .collect();
    senders.sort();
    assert_eq!(senders, vec![account(1), account(3)]);

    stop.send(()).unwrap();
    let report = running.await.unwrap().unwrap();
    assert_eq!(report.events_received, 1);
    assert_eq!(report.submissions_started, 2);
}
