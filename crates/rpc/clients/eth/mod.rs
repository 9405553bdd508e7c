use std::time::Duration;

use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use timelocks_common::{
    Address, H256, U256,
    types::{EIP1559Transaction, TxKind},
};
use tracing::{debug, trace};
use url::Url;

use crate::{
    signer::LocalSigner,
    types::{
        block_identifier::{BlockIdentifier, BlockTag},
        receipt::RpcReceipt,
    },
};

use errors::{EthClientError, RpcRequestError};

pub mod errors;

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Percentage added on top of node estimates, for both gas limit and fees.
pub const GAS_ESTIMATION_BUMP_PERCENT: u64 = 20;

#[derive(Debug, Clone)]
pub struct EthClient {
    client: Client,
    pub url: Url,
    pub maximum_allowed_max_fee_per_gas: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub from: Option<Address>,
    pub value: Option<U256>,
    pub chain_id: Option<u64>,
    pub nonce: Option<u64>,
    pub gas_limit: Option<u64>,
    pub max_fee_per_gas: Option<u64>,
    pub max_priority_fee_per_gas: Option<u64>,
    pub block: Option<BlockIdentifier>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RpcResponse {
    Success { result: Value },
    Error { error: RpcErrorMetadata },
}

#[derive(Deserialize)]
struct RpcErrorMetadata {
    code: i64,
    message: String,
}

impl EthClient {
    pub fn new(url: Url) -> Self {
        Self {
            client: Client::new(),
            url,
            maximum_allowed_max_fee_per_gas: None,
        }
    }

    pub fn new_with_config(
        url: Url,
        maximum_allowed_max_fee_per_gas: Option<u64>,
    ) -> Result<Self, EthClientError> {
        let client = Client::builder().timeout(DEFAULT_REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            url,
            maximum_allowed_max_fee_per_gas,
        })
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, EthClientError> {
        trace!(method, %params, "Sending JSON-RPC request");
        let response = self
            .client
            .post(self.url.clone())
            .json(&json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await?
            .json::<RpcResponse>()
            .await?;

        match response {
            RpcResponse::Success { result } => Ok(result),
            RpcResponse::Error { error } => Err(RpcRequestError::RPCError {
                method: method.to_owned(),
                code: error.code,
                message: error.message,
            }
            .into()),
        }
    }

    pub async fn get_chain_id(&self) -> Result<U256, EthClientError> {
        let result = self.send_request("eth_chainId", json!([])).await?;
        parse_u256("eth_chainId", &result)
    }

    pub async fn get_code(
        &self,
        address: Address,
        block: BlockIdentifier,
    ) -> Result<Bytes, EthClientError> {
        let result = self
            .send_request("eth_getCode", json!([address, Value::from(block)]))
            .await?;
        parse_bytes("eth_getCode", &result)
    }

    /// Read-only `eth_call`, returning the raw return data.
    pub async fn call(
        &self,
        to: Address,
        calldata: Bytes,
        overrides: Overrides,
    ) -> Result<Bytes, EthClientError> {
        let mut call = json!({
            "to": to,
            "data": format!("0x{}", hex::encode(&calldata)),
        });
        if let Some(from) = overrides.from {
            call["from"] = json!(from);
        }
        if let Some(value) = overrides.value {
            call["value"] = json!(format!("{value:#x}"));
        }
        let block = overrides.block.unwrap_or_default();
        let result = self
            .send_request("eth_call", json!([call, Value::from(block)]))
            .await?;
        parse_bytes("eth_call", &result)
    }

    pub async fn get_nonce(
        &self,
        address: Address,
        block: BlockIdentifier,
    ) -> Result<u64, EthClientError> {
        let result = self
            .send_request(
                "eth_getTransactionCount",
                json!([address, Value::from(block)]),
            )
            .await?;
        parse_u64("eth_getTransactionCount", &result)
    }

    pub async fn get_gas_price(&self) -> Result<U256, EthClientError> {
        let result = self.send_request("eth_gasPrice", json!([])).await?;
        parse_u256("eth_gasPrice", &result)
    }

    pub async fn get_gas_price_with_extra(&self, bump_percent: u64) -> Result<U256, EthClientError> {
        let gas_price = self.get_gas_price().await?;
        gas_price
            .checked_mul(U256::from(bump_percent))
            .and_then(|extra| gas_price.checked_add(extra / 100))
            .ok_or_else(|| bump_overflow(gas_price, bump_percent))
    }

    pub async fn estimate_gas(&self, tx: &EIP1559Transaction, from: Address) -> Result<u64, EthClientError> {
        let mut call = json!({
            "from": from,
            "value": format!("{:#x}", tx.value),
            "data": format!("0x{}", hex::encode(&tx.data)),
        });
        if let TxKind::Call(to) = tx.to {
            call["to"] = json!(to);
        }
        let result = self.send_request("eth_estimateGas", json!([call])).await?;
        parse_u64("eth_estimateGas", &result)
    }

    pub async fn send_raw_transaction(&self, encoded: &[u8]) -> Result<H256, EthClientError> {
        let result = self
            .send_request(
                "eth_sendRawTransaction",
                json!([format!("0x{}", hex::encode(encoded))]),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    pub async fn get_transaction_receipt(
        &self,
        tx_hash: H256,
    ) -> Result<Option<RpcReceipt>, EthClientError> {
        let result = self
            .send_request("eth_getTransactionReceipt", json!([tx_hash]))
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    /// Polls for the receipt of `tx_hash`, giving up after `max_retries` empty answers.
    pub async fn wait_for_transaction_receipt(
        &self,
        tx_hash: H256,
        max_retries: u64,
        interval: Duration,
    ) -> Result<Option<RpcReceipt>, EthClientError> {
        for attempt in 0..max_retries {
            if let Some(receipt) = self.get_transaction_receipt(tx_hash).await? {
                return Ok(Some(receipt));
            }
            debug!(tx_hash = %format!("{tx_hash:#x}"), attempt, "Receipt not available yet");
            tokio::time::sleep(interval).await;
        }
        Ok(None)
    }

    /// Fills nonce, fees and gas limit of a dynamic fee call from the node, unless overridden.
    pub async fn build_eip1559_transaction(
        &self,
        to: Address,
        from: Address,
        calldata: Bytes,
        overrides: Overrides,
    ) -> Result<EIP1559Transaction, EthClientError> {
        let chain_id = match overrides.chain_id {
            Some(chain_id) => chain_id,
            None => to_u64(self.get_chain_id().await?)?,
        };
        let nonce = match overrides.nonce {
            Some(nonce) => nonce,
            None => {
                self.get_nonce(from, BlockIdentifier::Tag(BlockTag::Pending))
                    .await?
            }
        };
        let max_fee_per_gas = match overrides.max_fee_per_gas {
            Some(fee) => fee,
            None => to_u64(
                self.get_gas_price_with_extra(GAS_ESTIMATION_BUMP_PERCENT)
                    .await?,
            )?,
        };
        if let Some(maximum_allowed) = self.maximum_allowed_max_fee_per_gas {
            if max_fee_per_gas > maximum_allowed {
                return Err(EthClientError::GasPriceAboveCap {
                    max_fee_per_gas,
                    maximum_allowed,
                });
            }
        }

        let mut tx = EIP1559Transaction {
            chain_id,
            nonce,
            max_priority_fee_per_gas: overrides.max_priority_fee_per_gas.unwrap_or(max_fee_per_gas),
            max_fee_per_gas,
            gas_limit: 0,
            to: TxKind::Call(to),
            value: overrides.value.unwrap_or_default(),
            data: calldata,
            ..Default::default()
        };
        tx.gas_limit = match overrides.gas_limit {
            Some(gas_limit) => gas_limit,
            None => {
                let estimate = self.estimate_gas(&tx, from).await?;
                estimate
                    .checked_mul(GAS_ESTIMATION_BUMP_PERCENT)
                    .and_then(|extra| estimate.checked_add(extra / 100))
                    .ok_or_else(|| bump_overflow(estimate, GAS_ESTIMATION_BUMP_PERCENT))?
            }
        };
        Ok(tx)
    }

    pub async fn send_eip1559_transaction(
        &self,
        tx: &EIP1559Transaction,
        signer: &LocalSigner,
    ) -> Result<H256, EthClientError> {
        let mut signed = tx.clone();
        signer.sign_transaction(&mut signed);
        self.send_raw_transaction(&signed.encode_canonical_to_vec())
            .await
    }
}

fn to_u64(value: U256) -> Result<u64, EthClientError> {
    value
        .try_into()
        .map_err(|_| EthClientError::InternalError(format!("{value} does not fit in a u64")))
}

fn bump_overflow(value: impl std::fmt::Display, percent: u64) -> EthClientError {
    EthClientError::InternalError(format!("{value} raised by {percent}% overflows"))
}

fn unexpected(method: &str, value: &Value) -> EthClientError {
    RpcRequestError::UnexpectedResponse {
        method: method.to_owned(),
        value: value.to_string(),
    }
    .into()
}

fn parse_u64(method: &str, value: &Value) -> Result<u64, EthClientError> {
    let raw = value.as_str().ok_or_else(|| unexpected(method, value))?;
    u64::from_str_radix(raw.trim_start_matches("0x"), 16).map_err(|_| unexpected(method, value))
}

fn parse_u256(method: &str, value: &Value) -> Result<U256, EthClientError> {
    let raw = value.as_str().ok_or_else(|| unexpected(method, value))?;
    U256::from_str_radix(raw.trim_start_matches("0x"), 16).map_err(|_| unexpected(method, value))
}

fn parse_bytes(method: &str, value: &Value) -> Result<Bytes, EthClientError> {
    let raw = value.as_str().ok_or_else(|| unexpected(method, value))?;
    Ok(hex::decode(raw.trim_start_matches("0x"))?.into())
}
