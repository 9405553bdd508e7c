//! Export of recorded deployments and source verification of the deployed timelocks.

use std::{collections::BTreeMap, fs, path::Path, process::Command};

use serde::Serialize;
use timelocks_common::{
    Address, H256, U256,
    calldata::{Value, encode_tuple},
};
use tracing::{info, warn};

use crate::{
    contracts::TIMELOCK_DEPLOYMENT_PREFIX,
    error::DeployerError,
    registrar::DeploymentRegistrar,
    types::{ConstructorArgs, DeploymentRecord},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedContract {
    pub address: Address,
    pub transaction_hash: H256,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub args: Option<ConstructorArgs>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedDeployments {
    pub chain_id: u64,
    pub name: String,
    pub contracts: BTreeMap<String, ExportedContract>,
}

pub fn collect_deployments(
    registrar: &dyn DeploymentRegistrar,
    chain_id: u64,
    network: &str,
) -> Result<ExportedDeployments, DeployerError> {
    let contracts = registrar
        .all()?
        .into_iter()
        .map(|record| {
            (
                record.name,
                ExportedContract {
                    address: record.address,
                    transaction_hash: record.transaction_hash,
                    args: record.args,
                },
            )
        })
        .collect();
    Ok(ExportedDeployments {
        chain_id,
        name: network.to_owned(),
        contracts,
    })
}

/// Writes every record of the network into a single JSON document at `path`.
pub fn export_deployments(
    registrar: &dyn DeploymentRegistrar,
    chain_id: u64,
    network: &str,
    path: &Path,
) -> Result<ExportedDeployments, DeployerError> {
    let exported = collect_deployments(registrar, chain_id, network)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("{}\n", serde_json::to_string_pretty(&exported)?))?;
    info!(
        contracts = exported.contracts.len(),
        path = %path.display(),
        "Exported deployments"
    );
    Ok(exported)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationJob {
    pub name: String,
    pub address: Address,
    pub constructor_args: Vec<u8>,
}

/// ABI encoding of the vesting contract constructor, without selector.
pub fn encode_timelock_constructor_args(args: &ConstructorArgs) -> Vec<u8> {
    encode_tuple(&[
        Value::Address(args.token),
        Value::Address(args.beneficiary),
        Value::Address(args.admin),
        Value::Uint(U256::from(args.cliff_duration)),
        Value::Uint(U256::from(args.start_time)),
        Value::Uint(U256::from(args.duration)),
    ])
}

/// Timelock records that carry constructor arguments. Everything else is skipped.
pub fn verification_jobs(records: &[DeploymentRecord]) -> Vec<VerificationJob> {
    let mut jobs = Vec::new();
    for record in records {
        if !record.name.starts_with(TIMELOCK_DEPLOYMENT_PREFIX) {
            info!(name = %record.name, "Not a timelock, skipping verification");
            continue;
        }
        let Some(args) = &record.args else {
            warn!(name = %record.name, "No constructor args recorded, skipping verification");
            continue;
        };
        jobs.push(VerificationJob {
            name: record.name.clone(),
            address: record.address,
            constructor_args: encode_timelock_constructor_args(args),
        });
    }
    jobs
}

pub fn forge_verify_command(chain_id: u64, job: &VerificationJob, contract: &str) -> Command {
    let mut command = Command::new("forge");
    command
        .arg("verify-contract")
        .arg("--chain-id")
        .arg(chain_id.to_string())
        .arg("--constructor-args")
        .arg(format!("0x{}", hex::encode(&job.constructor_args)))
        .arg(format!("{:#x}", job.address))
        .arg(contract);
    command
}

pub fn render_command(command: &Command) -> String {
    std::iter::once(command.get_program())
        .chain(command.get_args())
        .map(|part| part.to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Runs `forge verify-contract` for every job, stopping at the first failure. With `dry_run`
/// the commands are only returned.
pub fn run_verification(
    jobs: &[VerificationJob],
    chain_id: u64,
    contract: &str,
    dry_run: bool,
) -> Result<Vec<String>, DeployerError> {
    let mut rendered = Vec::with_capacity(jobs.len());
    for job in jobs {
        let mut command = forge_verify_command(chain_id, job, contract);
        let line = render_command(&command);
        if dry_run {
            rendered.push(line);
            continue;
        }

        info!(name = %job.name, address = %format!("{:#x}", job.address), "Verifying");
        let output = command
            .output()
            .map_err(|err| DeployerError::VerificationFailed {
                name: job.name.clone(),
                reason: format!("failed to run forge: {err}"),
            })?;
        if !output.status.success() {
            return Err(DeployerError::VerificationFailed {
                name: job.name.clone(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
            });
        }
        info!(
            name = %job.name,
            stdout = %String::from_utf8_lossy(&output.stdout).trim(),
            "Verification submitted"
        );
        rendered.push(line);
    }
    Ok(rendered)
}
