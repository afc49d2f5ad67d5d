//! Request matching

use crate::models::OracleIdentity;
use crate::services::registry::OracleRegistry;

/// Oracles allowed to answer a request carrying `index`.
///
/// Pure and deterministic for a given registry snapshot. An oracle holding
/// the index in more than one slot is still returned once, so it submits a
/// single response.
pub fn eligible(registry: &OracleRegistry, index: u8) -> Vec<&OracleIdentity> {
    registry.matching_entries(index)
}
