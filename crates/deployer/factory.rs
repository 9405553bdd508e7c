//! Deterministic deployment of the timelock factory and lookup of the deployed one.

use std::{fs, path::Path};

use bytes::Bytes;
use serde::Deserialize;
use timelocks_common::{
    Address, H256,
    utils::{create2_address, keccak},
};
use tracing::{info, warn};

use crate::{
    chain::ChainReader,
    contracts::{CREATE2_DEPLOYER_ADDRESS, FACTORY_DEPLOYMENT_NAME},
    error::DeployerError,
    registrar::DeploymentRegistrar,
    sink::{DispatchOutcome, PendingTransaction, SinkReport, TransactionSink},
    types::{DeploymentRecord, TransactionRecord},
};

/// Creation bytecode read from a compiler artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryArtifact {
    pub init_code: Bytes,
}

#[derive(Deserialize)]
struct RawArtifact {
    bytecode: RawBytecode,
}

/// Hardhat stores the bytecode as a string, forge nests it under `object`.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBytecode {
    Hex(String),
    Object { object: String },
}

impl FactoryArtifact {
    pub fn load(path: &Path) -> Result<Self, DeployerError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, DeployerError> {
        let artifact: RawArtifact = serde_json::from_str(raw)?;
        let hex_code = match artifact.bytecode {
            RawBytecode::Hex(code) | RawBytecode::Object { object: code } => code,
        };
        let init_code = hex::decode(hex_code.trim_start_matches("0x"))
            .map_err(|err| DeployerError::Artifact(format!("bytecode is not hex: {err}")))?;
        if init_code.is_empty() {
            return Err(DeployerError::Artifact("bytecode is empty".to_owned()));
        }
        Ok(Self {
            init_code: init_code.into(),
        })
    }
}

pub fn expected_factory_address(salt: H256, init_code: &[u8]) -> Address {
    create2_address(CREATE2_DEPLOYER_ADDRESS, salt, keccak(init_code))
}

/// Call to the deployment proxy creating the factory: `salt ++ init_code`.
pub fn build_factory_deployment(salt: H256, init_code: &[u8]) -> PendingTransaction {
    let mut calldata = Vec::with_capacity(32 + init_code.len());
    calldata.extend_from_slice(salt.as_bytes());
    calldata.extend_from_slice(init_code);
    PendingTransaction::Factory {
        expected_address: expected_factory_address(salt, init_code),
        tx: TransactionRecord::call(CREATE2_DEPLOYER_ADDRESS, calldata),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FactoryDeployment {
    pub address: Address,
    /// `None` when the factory already existed.
    pub outcome: Option<DispatchOutcome>,
    pub sink: SinkReport,
}

pub async fn deploy_factory<S: TransactionSink>(
    reader: &dyn ChainReader,
    registrar: &dyn DeploymentRegistrar,
    mut sink: S,
    salt: H256,
    artifact: &FactoryArtifact,
) -> Result<FactoryDeployment, DeployerError> {
    if reader.get_code(CREATE2_DEPLOYER_ADDRESS).await?.is_empty() {
        return Err(DeployerError::Create2DeployerMissing(CREATE2_DEPLOYER_ADDRESS));
    }

    let address = expected_factory_address(salt, &artifact.init_code);
    let address_hex = format!("{address:#x}");

    if !reader.get_code(address).await?.is_empty() {
        info!(address = %address_hex, "Timelock factory already deployed, skipping");
        if registrar.get(FACTORY_DEPLOYMENT_NAME)?.is_none() {
            warn!(address = %address_hex, "Recording existing factory without its creation transaction");
            registrar.save(&DeploymentRecord {
                name: FACTORY_DEPLOYMENT_NAME.to_owned(),
                address,
                transaction_hash: H256::zero(),
                receipt: None,
                args: None,
            })?;
        }
        return Ok(FactoryDeployment {
            address,
            outcome: None,
            sink: sink.finish().await?,
        });
    }

    info!(address = %address_hex, salt = %format!("{salt:#x}"), "Deploying timelock factory");
    let outcome = sink
        .dispatch(build_factory_deployment(salt, &artifact.init_code))
        .await?;
    Ok(FactoryDeployment {
        address,
        outcome: Some(outcome),
        sink: sink.finish().await?,
    })
}

/// Factory used by a timelock run: `explicit` when given, the recorded one otherwise.
/// Either way code must exist at the address.
pub async fn resolve_factory(
    reader: &dyn ChainReader,
    registrar: &dyn DeploymentRegistrar,
    explicit: Option<Address>,
    chain_id: u64,
) -> Result<Address, DeployerError> {
    let address = match explicit {
        Some(address) => address,
        None => registrar
            .get(FACTORY_DEPLOYMENT_NAME)?
            .map(|record| record.address)
            .ok_or_else(|| DeployerError::FactoryNotDeployed {
                chain_id,
                reason: format!("no address given and no {FACTORY_DEPLOYMENT_NAME} record"),
            })?,
    };
    if reader.get_code(address).await?.is_empty() {
        return Err(DeployerError::FactoryNotDeployed {
            chain_id,
            reason: format!("no code at {address:#x}"),
        });
    }
    Ok(address)
}
