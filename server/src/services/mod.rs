//! Oracle services: registration, matching and response dispatch

pub mod dispatcher;
pub mod matcher;
pub mod registry;

pub use dispatcher::{ResponseDispatcher, SubmissionOutcome};
pub use registry::{OracleRegistry, Registrar, RegistrationSummary, RegistryBuilder, StatusSampler};
