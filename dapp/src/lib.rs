//! FlightSurety query client
//!
//! Typed access to the FlightSuretyApp and FlightSuretyData contracts for
//! the owner, airline and passenger accounts of a development node.

pub mod client;
pub mod error;
pub mod models;

pub use client::{FlightSuretyClient, Roster, MAX_FLIGHTS};
pub use error::ClientError;
pub use models::{Flight, PassengerInsurance, StatusQuery};
