//! Oracle registry
//!
//! Registration is the only window in which the pool changes: a
//! [`RegistryBuilder`] is appended to while oracles enroll, then frozen into
//! an [`OracleRegistry`] that the listener shares read-only.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

use alloy::primitives::{Address, U256};
use futures_util::future::join_all;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, warn};

use crate::contract::FlightSuretyApp;
use crate::error::{GatewayError, RegistrationError};
use crate::gateway::{SharedGateway, TxOptions};
use crate::models::{FlightStatus, IndexTriple, OracleIdentity};

/// Draws the fixed answer of each newly registered oracle.
pub struct StatusSampler {
    rng: Mutex<StdRng>,
}

impl StatusSampler {
    /// Seeded samplers reproduce the same answers across runs.
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            rng: Mutex::new(rng),
        }
    }

    pub fn sample(&self) -> FlightStatus {
        let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
        FlightStatus::SIMULATED[rng.gen_range(0..FlightStatus::SIMULATED.len())]
    }
}

/// Append-only pool used during registration
#[derive(Debug, Default)]
pub struct RegistryBuilder {
    entries: Vec<OracleIdentity>,
    addresses: HashSet<Address>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, identity: OracleIdentity) -> Result<(), RegistrationError> {
        if !self.addresses.insert(identity.address()) {
            return Err(RegistrationError::AlreadyRegistered(identity.address()));
        }
        self.entries.push(identity);
        Ok(())
    }

    /// Registers a single oracle. An address already in the pool is rejected
    /// before anything is sent to the chain.
    pub async fn register(
        &mut self,
        registrar: &Registrar,
        address: Address,
        fee: U256,
    ) -> Result<OracleIdentity, RegistrationError> {
        if self.contains(&address) {
            return Err(RegistrationError::AlreadyRegistered(address));
        }
        let identity = registrar.enroll(address, fee).await?;
        self.insert(identity.clone())?;
        Ok(identity)
    }

    pub fn freeze(self) -> OracleRegistry {
        let positions = self
            .entries
            .iter()
            .enumerate()
            .map(|(position, identity)| (identity.address(), position))
            .collect();
        OracleRegistry {
            entries: self.entries,
            positions,
        }
    }
}

/// Frozen pool of registered oracles, in registration order
#[derive(Debug, Clone, Default)]
pub struct OracleRegistry {
    entries: Vec<OracleIdentity>,
    positions: HashMap<Address, usize>,
}

impl OracleRegistry {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OracleIdentity> {
        self.entries.iter()
    }

    pub fn get(&self, address: &Address) -> Option<&OracleIdentity> {
        self.positions
            .get(address)
            .and_then(|position| self.entries.get(*position))
    }

    /// Every oracle whose triple holds `index`, once each, in registration
    /// order.
    pub fn matching_entries(&self, index: u8) -> Vec<&OracleIdentity> {
        self.entries
            .iter()
            .filter(|identity| identity.answers(index))
            .collect()
    }
}

/// Outcome of a registration phase
#[derive(Debug, Default)]
pub struct RegistrationSummary {
    pub requested: usize,
    pub registered: usize,
    pub skipped: usize,
    pub failures: Vec<(Address, RegistrationError)>,
}

/// Chain side of oracle registration
pub struct Registrar {
    gateway: SharedGateway,
    gas: u64,
    sampler: StatusSampler,
}

impl Registrar {
    pub fn new(gateway: SharedGateway, gas: u64, sampler: StatusSampler) -> Self {
        Self {
            gateway,
            gas,
            sampler,
        }
    }

    pub async fn registration_fee(&self, from: Address) -> Result<U256, GatewayError> {
        self.gateway
            .read(&FlightSuretyApp::REGISTRATION_FEECall {}, from)
            .await
    }

    /// Pays the fee for `address`, reads back its assigned indexes and draws
    /// its status code. Does not touch any registry.
    pub async fn enroll(&self, address: Address, fee: U256) -> Result<OracleIdentity, RegistrationError> {
        let receipt = self
            .gateway
            .submit(
                &FlightSuretyApp::registerOracleCall {},
                TxOptions::sender(address).value(fee).gas(self.gas),
            )
            .await?;
        debug!(oracle = %address, tx_hash = %receipt.tx_hash, "registration fee paid");

        let indexes = self
            .gateway
            .read(&FlightSuretyApp::getMyIndexesCall {}, address)
            .await?;

        Ok(OracleIdentity::new(address, IndexTriple::new(indexes), self.sampler.sample()))
    }

    /// Enrolls every address concurrently and appends the successes to
    /// `builder` in input order. Failed or duplicate addresses are left out;
    /// the phase itself never fails.
    pub async fn register_pool(
        &self,
        builder: &mut RegistryBuilder,
        addresses: &[Address],
        fee: U256,
    ) -> RegistrationSummary {
        let mut summary = RegistrationSummary {
            requested: addresses.len(),
            ..RegistrationSummary::default()
        };

        let mut seen = HashSet::new();
        let candidates: Vec<Address> = addresses
            .iter()
            .copied()
            .filter(|address| {
                let fresh = !builder.contains(address) && seen.insert(*address);
                if !fresh {
                    warn!(oracle = %address, "oracle already registered; skipping");
                    summary.skipped += 1;
                }
                fresh
            })
            .collect();

        let results = join_all(candidates.iter().map(|address| self.enroll(*address, fee))).await;

        for (address, result) in candidates.into_iter().zip(results) {
            match result.and_then(|identity| builder.insert(identity.clone()).map(|()| identity)) {
                Ok(identity) => {
                    summary.registered += 1;
                    info!(
                        oracle = %address,
                        indexes = %identity.indexes(),
                        status = identity.status().code(),
                        "oracle registered"
                    );
                }
                Err(err) => {
                    warn!(oracle = %address, error = %err, "oracle registration failed");
                    summary.failures.push((address, err));
                }
            }
        }

        info!(
            requested = summary.requested,
            registered = summary.registered,
            failed = summary.failures.len(),
            skipped = summary.skipped,
            "{} oracles registered",
            builder.len()
        );

        summary
    }
}
