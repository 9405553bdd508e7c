use async_trait::async_trait;
use timelocks_common::{
    Address, H256,
    calldata::{decode_address, event_topic},
};
use timelocks_rpc::types::receipt::RpcReceipt;
use tracing::{info, warn};

use super::{DispatchOutcome, PendingTransaction, SinkReport, TransactionSink};
use crate::{
    chain::{ChainReader, TransactionSender},
    contracts::{FACTORY_DEPLOYMENT_NAME, TIMELOCK_DEPLOYED_EVENT},
    error::DeployerError,
    registrar::DeploymentRegistrar,
    types::{DeploymentIntent, DeploymentMode, DeploymentRecord, TransactionRecord},
};

/// Signs, sends and confirms each transaction before the next one is dispatched, recording
/// every confirmed deployment.
pub struct DirectBroadcaster<'a, C, R> {
    client: &'a C,
    registrar: &'a R,
    confirmed: usize,
}

impl<'a, C, R> DirectBroadcaster<'a, C, R>
where
    C: ChainReader + TransactionSender,
    R: DeploymentRegistrar,
{
    pub fn new(client: &'a C, registrar: &'a R) -> Self {
        Self {
            client,
            registrar,
            confirmed: 0,
        }
    }

    async fn submit_and_confirm(
        &self,
        kind: &str,
        tx: &TransactionRecord,
    ) -> Result<(H256, RpcReceipt), DeployerError> {
        let tx_hash = self.client.send_transaction(tx).await?;
        info!(kind, tx_hash = %format!("{tx_hash:#x}"), "Submitted transaction");

        let receipt = self
            .client
            .wait_for_receipt(tx_hash)
            .await?
            .ok_or(DeployerError::ReceiptMissing(tx_hash))?;
        if !receipt.status {
            return Err(DeployerError::TransactionReverted(tx_hash));
        }
        info!(
            kind,
            tx_hash = %format!("{tx_hash:#x}"),
            block_number = receipt.block_number,
            gas_used = receipt.gas_used,
            "Transaction mined"
        );
        Ok((tx_hash, receipt))
    }

    async fn deploy_timelock(
        &self,
        intent: DeploymentIntent,
        tx: TransactionRecord,
    ) -> Result<DispatchOutcome, DeployerError> {
        let name = intent.record.deployment_name();
        if let Some(existing) = self.registrar.get(&name)?
            && existing.address != intent.expected_address
        {
            warn!(
                name = %name,
                recorded = %format!("{:#x}", existing.address),
                expected = %format!("{:#x}", intent.expected_address),
                "Record points at another timelock, it will be replaced"
            );
        }

        let (tx_hash, receipt) = self.submit_and_confirm("deployTimelock", &tx).await?;
        let deployed = find_deployed_timelock(&receipt, tx.to)
            .ok_or(DeployerError::EventNotEmitted(tx_hash))?;

        self.registrar.save(&DeploymentRecord {
            name: name.clone(),
            address: deployed,
            transaction_hash: tx_hash,
            receipt: Some(receipt),
            args: Some(intent.args),
        })?;
        info!(name = %name, address = %format!("{deployed:#x}"), "Recorded timelock");

        if deployed != intent.expected_address {
            return Err(DeployerError::AddressMismatch {
                name,
                expected: intent.expected_address,
                actual: deployed,
            });
        }
        Ok(DispatchOutcome::Confirmed {
            tx_hash,
            deployed: Some(deployed),
        })
    }

    async fn deploy_factory(
        &self,
        expected_address: Address,
        tx: TransactionRecord,
    ) -> Result<DispatchOutcome, DeployerError> {
        let (tx_hash, receipt) = self.submit_and_confirm("deployFactory", &tx).await?;
        let code = self.client.get_code(expected_address).await?;
        if code.is_empty() {
            return Err(DeployerError::DeploymentMissing {
                tx_hash,
                address: expected_address,
            });
        }

        self.registrar.save(&DeploymentRecord {
            name: FACTORY_DEPLOYMENT_NAME.to_owned(),
            address: expected_address,
            transaction_hash: tx_hash,
            receipt: Some(receipt),
            args: None,
        })?;
        info!(address = %format!("{expected_address:#x}"), "Recorded timelock factory");
        Ok(DispatchOutcome::Confirmed {
            tx_hash,
            deployed: Some(expected_address),
        })
    }
}

/// Address of the timelock announced by the factory's `TimelockDeployed` log.
///
/// The timelock is the first event argument: read from the first indexed topic, or from the
/// first data word when the argument is not indexed.
pub fn find_deployed_timelock(receipt: &RpcReceipt, factory: Address) -> Option<Address> {
    let topic = event_topic(TIMELOCK_DEPLOYED_EVENT);
    receipt
        .logs
        .iter()
        .filter(|log| log.address == factory && log.topics.first() == Some(&topic))
        .find_map(|log| match log.topics.get(1) {
            Some(indexed) => Some(Address::from_slice(&indexed.as_bytes()[12..])),
            None => decode_address(&log.data, 0),
        })
}

#[async_trait]
impl<'a, C, R> TransactionSink for DirectBroadcaster<'a, C, R>
where
    C: ChainReader + TransactionSender,
    R: DeploymentRegistrar,
{
    fn mode(&self) -> DeploymentMode {
        DeploymentMode::DirectBroadcast
    }

    async fn dispatch(
        &mut self,
        pending: PendingTransaction,
    ) -> Result<DispatchOutcome, DeployerError> {
        let outcome = match pending {
            PendingTransaction::Approval { tx, amount, .. } => {
                let (tx_hash, _) = self.submit_and_confirm("approve", &tx).await?;
                info!(approved = %amount, "Factory allowance set");
                DispatchOutcome::Confirmed {
                    tx_hash,
                    deployed: None,
                }
            }
            PendingTransaction::Timelock { intent, tx } => self.deploy_timelock(intent, tx).await?,
            PendingTransaction::Factory {
                expected_address,
                tx,
            } => self.deploy_factory(expected_address, tx).await?,
        };
        self.confirmed += 1;
        Ok(outcome)
    }

    async fn finish(self) -> Result<SinkReport, DeployerError> {
        if self.confirmed == 0 {
            warn!("Nothing was broadcast in this run");
        }
        Ok(SinkReport::Direct {
            confirmed: self.confirmed,
        })
    }
}
