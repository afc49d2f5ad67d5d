use alloy::primitives::Address;
use serde::Serialize;

/// A flight as returned by `getFlight`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Flight {
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
    pub status_code: u8,
}

/// A passenger's policy on one flight, amounts in ether
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PassengerInsurance {
    pub amount: String,
    pub payout_amount: String,
    pub state: u8,
    pub flight: Flight,
}

/// Flight key submitted with `fetchFlightStatus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusQuery {
    pub airline: Address,
    pub flight: String,
    pub timestamp: u64,
}
