//! Seams between the deployer and a node.
//!
//! Planning only needs [`ChainReader`]; broadcasting additionally needs a [`TransactionSender`].
//! [`SigningClient`] implements both over JSON-RPC with a key held in memory.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use timelocks_common::{Address, H256};
use timelocks_rpc::{
    EthClient, EthClientError,
    clients::Overrides,
    signer::LocalSigner,
    types::{block_identifier::BlockIdentifier, receipt::RpcReceipt},
};
use tracing::debug;

use crate::types::TransactionRecord;

pub const DEFAULT_RECEIPT_RETRIES: u64 = 60;
pub const DEFAULT_RECEIPT_INTERVAL: Duration = Duration::from_secs(2);

#[async_trait]
pub trait ChainReader: Send + Sync {
    /// Read-only call against the latest block.
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, EthClientError>;

    async fn get_code(&self, address: Address) -> Result<Bytes, EthClientError>;
}

#[async_trait]
pub trait TransactionSender: Send + Sync {
    /// Account the transactions are sent from.
    fn address(&self) -> Address;

    /// Signs and submits `tx` with a freshly fetched pending nonce.
    async fn send_transaction(&self, tx: &TransactionRecord) -> Result<H256, EthClientError>;

    /// `None` once the configured number of polls found no receipt.
    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<Option<RpcReceipt>, EthClientError>;
}

#[async_trait]
impl ChainReader for EthClient {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, EthClientError> {
        EthClient::call(self, to, calldata, Overrides::default()).await
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, EthClientError> {
        EthClient::get_code(self, address, BlockIdentifier::default()).await
    }
}

pub struct SigningClient {
    pub client: EthClient,
    signer: LocalSigner,
    chain_id: u64,
    receipt_retries: u64,
    receipt_interval: Duration,
}

impl SigningClient {
    pub fn new(client: EthClient, signer: LocalSigner, chain_id: u64) -> Self {
        Self {
            client,
            signer,
            chain_id,
            receipt_retries: DEFAULT_RECEIPT_RETRIES,
            receipt_interval: DEFAULT_RECEIPT_INTERVAL,
        }
    }

    pub fn with_receipt_polling(mut self, retries: u64, interval: Duration) -> Self {
        self.receipt_retries = retries;
        self.receipt_interval = interval;
        self
    }
}

#[async_trait]
impl ChainReader for SigningClient {
    async fn call(&self, to: Address, calldata: Bytes) -> Result<Bytes, EthClientError> {
        ChainReader::call(&self.client, to, calldata).await
    }

    async fn get_code(&self, address: Address) -> Result<Bytes, EthClientError> {
        ChainReader::get_code(&self.client, address).await
    }
}

#[async_trait]
impl TransactionSender for SigningClient {
    fn address(&self) -> Address {
        self.signer.address
    }

    async fn send_transaction(&self, tx: &TransactionRecord) -> Result<H256, EthClientError> {
        let overrides = Overrides {
            chain_id: Some(self.chain_id),
            value: Some(tx.value),
            ..Default::default()
        };
        let built = self
            .client
            .build_eip1559_transaction(tx.to, self.signer.address, tx.data.clone(), overrides)
            .await?;
        debug!(
            to = %format!("{:#x}", tx.to),
            nonce = built.nonce,
            gas_limit = built.gas_limit,
            max_fee_per_gas = built.max_fee_per_gas,
            "Sending transaction"
        );
        self.client
            .send_eip1559_transaction(&built, &self.signer)
            .await
    }

    async fn wait_for_receipt(&self, tx_hash: H256) -> Result<Option<RpcReceipt>, EthClientError> {
        self.client
            .wait_for_transaction_receipt(tx_hash, self.receipt_retries, self.receipt_interval)
            .await
    }
}
