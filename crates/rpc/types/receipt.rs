use bytes::Bytes;
use serde::{Deserialize, Serialize};
use timelocks_common::{Address, H256, U256, serde_utils};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcReceipt {
    pub transaction_hash: H256,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub transaction_index: u64,
    pub block_hash: H256,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub block_number: u64,
    pub from: Address,
    pub to: Option<Address>,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub cumulative_gas_used: u64,
    #[serde(with = "serde_utils::u64::hex_str")]
    pub gas_used: u64,
    #[serde(default, with = "serde_utils::u256::hex_str")]
    pub effective_gas_price: U256,
    pub contract_address: Option<Address>,
    pub logs: Vec<RpcLog>,
    #[serde(with = "status")]
    pub status: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RpcLog {
    pub address: Address,
    pub topics: Vec<H256>,
    #[serde(with = "serde_utils::bytes")]
    pub data: Bytes,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub block_number: Option<u64>,
    #[serde(default)]
    pub transaction_hash: Option<H256>,
    #[serde(default, with = "serde_utils::u64::hex_str_opt")]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub removed: bool,
}

/// `status` is `"0x1"` for success and `"0x0"` for a reverted transaction.
mod status {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *value { "0x1" } else { "0x0" })
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        match String::deserialize(deserializer)?.as_str() {
            "0x1" => Ok(true),
            "0x0" => Ok(false),
            other => Err(D::Error::custom(format!("invalid receipt status {other}"))),
        }
    }
}
