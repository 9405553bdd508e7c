use bytes::Bytes;
use serde::{Deserialize, Serialize};
use timelocks_common::{Address, H256, U256, calldata::Value, serde_utils};
use timelocks_rpc::types::receipt::RpcReceipt;

use crate::contracts::TIMELOCK_DEPLOYMENT_PREFIX;

/// One row of the beneficiary file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BeneficiaryRecord {
    pub beneficiary: Address,
    pub cliff_duration: u64,
    pub start_time: u64,
    pub duration: u64,
    #[serde(with = "serde_utils::u256::dec_str")]
    pub amount: U256,
}

impl BeneficiaryRecord {
    /// Name under which the deployment is recorded. Start time is part of the key so the
    /// same beneficiary can hold several schedules.
    pub fn deployment_name(&self) -> String {
        format!(
            "{TIMELOCK_DEPLOYMENT_PREFIX}{:#x}-{}",
            self.beneficiary, self.start_time
        )
    }
}

/// How the transactions of a run leave the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentMode {
    /// Sign, send and wait for every transaction, recording deployments as they land.
    DirectBroadcast,
    /// Collect unsigned transactions into a batch file for offline co-signing.
    OfflineBatch,
}

impl DeploymentMode {
    pub fn from_submit_flag(submit: bool) -> Self {
        if submit {
            Self::DirectBroadcast
        } else {
            Self::OfflineBatch
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstructorArgs {
    pub token: Address,
    pub beneficiary: Address,
    pub admin: Address,
    pub cliff_duration: u64,
    pub start_time: u64,
    pub duration: u64,
    #[serde(with = "serde_utils::u256::dec_str")]
    pub amount: U256,
    #[serde(with = "serde_utils::u256::dec_str")]
    pub funding_amount: U256,
}

impl ConstructorArgs {
    /// Argument list of the factory's deploy entry point, in order.
    pub fn to_calldata_values(&self) -> Vec<Value> {
        vec![
            Value::Address(self.token),
            Value::Address(self.beneficiary),
            Value::Address(self.admin),
            Value::Uint(U256::from(self.cliff_duration)),
            Value::Uint(U256::from(self.start_time)),
            Value::Uint(U256::from(self.duration)),
            Value::Uint(self.amount),
            Value::Uint(self.funding_amount),
        ]
    }
}

/// A beneficiary that still needs its timelock, as planned for the current run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentIntent {
    pub record: BeneficiaryRecord,
    pub expected_address: Address,
    pub args: ConstructorArgs,
}

impl DeploymentIntent {
    pub fn funding_amount(&self) -> U256 {
        self.args.funding_amount
    }
}

/// Unsigned call, in the `{to, value, data}` shape multisig transaction builders import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub to: Address,
    #[serde(with = "serde_utils::u256::dec_str")]
    pub value: U256,
    #[serde(with = "serde_utils::bytes")]
    pub data: Bytes,
}

impl TransactionRecord {
    pub fn call(to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            to,
            value: U256::zero(),
            data: data.into(),
        }
    }
}

/// Persisted outcome of a confirmed deployment. Addresses serialize lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeploymentRecord {
    pub name: String,
    pub address: Address,
    pub transaction_hash: H256,
    #[serde(default)]
    pub receipt: Option<RpcReceipt>,
    #[serde(default)]
    pub args: Option<ConstructorArgs>,
}
