//! Idempotent batch deployment of beneficiary timelocks through a deterministic factory.
//!
//! A run resolves the chain configuration, loads the beneficiary file, plans which
//! timelocks still need deploying (see [`orchestrator::DeploymentOrchestrator`]) and
//! hands the resulting transactions to a [`sink::TransactionSink`]: either broadcast
//! and recorded right away, or collected into a batch file for a multisig to sign.

pub mod allowance;
pub mod beneficiaries;
pub mod chain;
pub mod config;
pub mod contracts;
pub mod error;
pub mod export;
pub mod factory;
pub mod oracle;
pub mod orchestrator;
pub mod registrar;
pub mod sink;
pub mod types;

pub use error::DeployerError;
pub use orchestrator::{DeploymentOrchestrator, OrchestratorSettings, RunReport};
pub use types::{
    BeneficiaryRecord, ConstructorArgs, DeploymentIntent, DeploymentMode, DeploymentRecord,
    TransactionRecord,
};
