//! Data types shared by the registry, matcher, dispatcher and listener

pub mod oracle;

pub use oracle::{FlightStatus, IndexTriple, OracleIdentity, StatusRequest};
