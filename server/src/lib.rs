//! FlightSurety oracle service
//!
//! Registers a pool of simulated oracles with the FlightSuretyApp contract
//! and answers its `OracleRequest` events with each oracle's status code.

pub mod config;
pub mod contract;
pub mod error;
pub mod event_listener;
pub mod gateway;
pub mod models;
pub mod oracle_server;
pub mod services;

#[cfg(test)]
mod end_to_end;
