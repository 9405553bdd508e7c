use timelocks_common::{Address, H256, calldata::CalldataEncodeError};
use timelocks_rpc::EthClientError;

use crate::{config::ConfigError, registrar::RegistrarError};

#[derive(Debug, thiserror::Error)]
pub enum DeployerError {
    #[error("Unsupported chain id {0}")]
    UnsupportedChain(u64),
    #[error("Timelock factory not deployed on chain {chain_id}: {reason}")]
    FactoryNotDeployed { chain_id: u64, reason: String },
    #[error("Deterministic deployment proxy {0:#x} has no code on this chain")]
    Create2DeployerMissing(Address),
    #[error("Failed to derive the timelock address of {beneficiary:#x}: {reason}")]
    AddressDerivation { beneficiary: Address, reason: String },
    #[error("Malformed beneficiary record at line {line}: {reason}")]
    MalformedRecord { line: u64, reason: String },
    #[error("No receipt obtained for transaction {0:#x}")]
    ReceiptMissing(H256),
    #[error("Transaction {0:#x} reverted")]
    TransactionReverted(H256),
    #[error("Transaction {0:#x} was mined but the factory emitted no TimelockDeployed event")]
    EventNotEmitted(H256),
    #[error("Transaction {tx_hash:#x} was mined but {address:#x} has no code")]
    DeploymentMissing { tx_hash: H256, address: Address },
    #[error("{name} was deployed at {actual:#x} but {expected:#x} was expected")]
    AddressMismatch {
        name: String,
        expected: Address,
        actual: Address,
    },
    #[error("Direct broadcast needs a private key")]
    MissingSigner,
    #[error("Sum of funding amounts overflows uint256")]
    FundingOverflow,
    #[error("Invalid contract artifact: {0}")]
    Artifact(String),
    #[error("Verification of {name} failed: {reason}")]
    VerificationFailed { name: String, reason: String },
    #[error("Deployer EthClient error: {0}")]
    EthClientError(#[from] EthClientError),
    #[error("Failed to encode calldata: {0}")]
    CalldataEncodeError(#[from] CalldataEncodeError),
    #[error("Deployment registrar error: {0}")]
    Registrar(#[from] RegistrarError),
    #[error("Deploy config error: {0}")]
    Config(#[from] ConfigError),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
