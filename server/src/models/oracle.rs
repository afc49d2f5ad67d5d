use std::fmt;

use alloy::primitives::{Address, U256};
use alloy::sol_types::SolEvent;
use serde::{Deserialize, Serialize};

use crate::contract::FlightSuretyApp;
use crate::error::MalformedRequest;
use crate::gateway::ChainEvent;

/// Flight status codes understood by `FlightSuretyApp`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum FlightStatus {
    Unknown = 0,
    OnTime = 10,
    LateAirline = 20,
    LateWeather = 30,
    LateTechnical = 40,
    LateOther = 50,
}

impl FlightStatus {
    /// Codes a simulated oracle may answer with.
    pub const SIMULATED: [FlightStatus; 5] = [
        FlightStatus::OnTime,
        FlightStatus::LateAirline,
        FlightStatus::LateWeather,
        FlightStatus::LateTechnical,
        FlightStatus::LateOther,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(FlightStatus::Unknown),
            10 => Some(FlightStatus::OnTime),
            20 => Some(FlightStatus::LateAirline),
            30 => Some(FlightStatus::LateWeather),
            40 => Some(FlightStatus::LateTechnical),
            50 => Some(FlightStatus::LateOther),
            _ => None,
        }
    }
}

impl fmt::Display for FlightStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            FlightStatus::Unknown => "unknown",
            FlightStatus::OnTime => "on time",
            FlightStatus::LateAirline => "late (airline)",
            FlightStatus::LateWeather => "late (weather)",
            FlightStatus::LateTechnical => "late (technical)",
            FlightStatus::LateOther => "late (other)",
        };
        write!(f, "{label} [{}]", self.code())
    }
}

/// The three request indexes the contract assigns to an oracle. Entries may
/// repeat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IndexTriple([u8; 3]);

impl IndexTriple {
    pub fn new(indexes: [u8; 3]) -> Self {
        Self(indexes)
    }

    pub fn as_array(&self) -> [u8; 3] {
        self.0
    }

    pub fn contains(&self, index: u8) -> bool {
        self.0.contains(&index)
    }
}

impl fmt::Display for IndexTriple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "[{a}, {b}, {c}]")
    }
}

/// A registered simulated oracle. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OracleIdentity {
    address: Address,
    indexes: IndexTriple,
    status: FlightStatus,
}

impl OracleIdentity {
    pub fn new(address: Address, indexes: IndexTriple, status: FlightStatus) -> Self {
        Self {
            address,
            indexes,
            status,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn indexes(&self) -> IndexTriple {
        self.indexes
    }

    /// The canned answer this oracle gives for the whole session.
    pub fn status(&self) -> FlightStatus {
        self.status
    }

    pub fn answers(&self, index: u8) -> bool {
        self.indexes.contains(index)
    }
}

/// Payload of an `OracleRequest` event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRequest {
    pub index: u8,
    pub airline: Address,
    pub flight: String,
    pub timestamp: U256,
}

impl StatusRequest {
    /// The `submitOracleResponse` call answering this request with `status`.
    pub fn response(&self, status: FlightStatus) -> FlightSuretyApp::submitOracleResponseCall {
        FlightSuretyApp::submitOracleResponseCall {
            index: self.index,
            airline: self.airline,
            flight: self.flight.clone(),
            timestamp: self.timestamp,
            statusCode: status.code(),
        }
    }
}

impl From<FlightSuretyApp::OracleRequest> for StatusRequest {
    fn from(event: FlightSuretyApp::OracleRequest) -> Self {
        Self {
            index: event.index,
            airline: event.airline,
            flight: event.flight,
            timestamp: event.timestamp,
        }
    }
}

impl TryFrom<&ChainEvent> for StatusRequest {
    type Error = MalformedRequest;

    fn try_from(event: &ChainEvent) -> Result<Self, Self::Error> {
        match event.topic0() {
            None => return Err(MalformedRequest::Anonymous),
            Some(topic) if topic != FlightSuretyApp::OracleRequest::SIGNATURE_HASH => {
                return Err(MalformedRequest::UnexpectedEvent(topic))
            }
            Some(_) => {}
        }

        let decoded = FlightSuretyApp::OracleRequest::decode_log_data(&event.data)?;
        Ok(decoded.into())
    }
}
