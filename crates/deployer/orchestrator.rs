use std::collections::HashSet;

use timelocks_common::{Address, U256, calldata::encode_calldata};
use tracing::{info, warn};

use crate::{
    allowance::{AllowanceBootstrapper, required_funding},
    chain::ChainReader,
    contracts::DEPLOY_TIMELOCK_SIGNATURE,
    error::DeployerError,
    oracle::DeterministicAddressOracle,
    sink::{DispatchOutcome, PendingTransaction, SinkReport, TransactionSink},
    types::{BeneficiaryRecord, ConstructorArgs, DeploymentIntent, TransactionRecord},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Account that sends the deployments, either the signer or the multisig.
    pub deployer: Address,
    pub factory: Address,
    pub token: Address,
    pub admin: Address,
    /// Whether each timelock is funded by the factory at deployment.
    pub fund_on_deploy: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    AlreadyDeployed,
    DuplicateInRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedRecord {
    pub record: BeneficiaryRecord,
    pub address: Address,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeploymentPlan {
    /// Deployments still needed, in file order.
    pub intents: Vec<DeploymentIntent>,
    pub skipped: Vec<SkippedRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub total: usize,
    pub skipped: Vec<SkippedRecord>,
    pub approval: Option<TransactionRecord>,
    pub dispatched: Vec<DispatchOutcome>,
    pub sink: SinkReport,
}

impl RunReport {
    pub fn deployments(&self) -> usize {
        self.dispatched.len() - usize::from(self.approval.is_some())
    }
}

pub struct DeploymentOrchestrator<'a> {
    reader: &'a dyn ChainReader,
    settings: OrchestratorSettings,
    oracle: DeterministicAddressOracle,
    allowance: AllowanceBootstrapper,
}

impl<'a> DeploymentOrchestrator<'a> {
    pub fn new(reader: &'a dyn ChainReader, settings: OrchestratorSettings) -> Self {
        Self {
            reader,
            oracle: DeterministicAddressOracle::new(settings.factory),
            allowance: AllowanceBootstrapper::new(settings.token),
            settings,
        }
    }

    /// Decides, record by record, which timelocks still need deploying.
    ///
    /// A record is skipped when code already exists at its derived address, or when an
    /// earlier row of the same file derived the same address. Every query goes to the node;
    /// nothing is remembered between runs.
    pub async fn plan(
        &self,
        records: &[BeneficiaryRecord],
    ) -> Result<DeploymentPlan, DeployerError> {
        let mut plan = DeploymentPlan::default();
        let mut planned = HashSet::new();

        for record in records {
            let beneficiary = format!("{:#x}", record.beneficiary);
            let expected_address = self
                .oracle
                .compute_expected_address(
                    self.reader,
                    self.settings.deployer,
                    self.settings.token,
                    record.beneficiary,
                    record.start_time,
                    record.amount,
                )
                .await?;
            let address = format!("{expected_address:#x}");

            if planned.contains(&expected_address) {
                warn!(%beneficiary, %address, start_time = record.start_time, "Duplicate row, skipping");
                plan.skipped.push(SkippedRecord {
                    record: record.clone(),
                    address: expected_address,
                    reason: SkipReason::DuplicateInRun,
                });
                continue;
            }

            let code = self.reader.get_code(expected_address).await?;
            if !code.is_empty() {
                info!(%beneficiary, %address, "Timelock already deployed, skipping");
                plan.skipped.push(SkippedRecord {
                    record: record.clone(),
                    address: expected_address,
                    reason: SkipReason::AlreadyDeployed,
                });
                continue;
            }

            info!(%beneficiary, %address, amount = %record.amount, "Timelock needs deployment");
            planned.insert(expected_address);
            plan.intents.push(DeploymentIntent {
                args: self.constructor_args(record),
                record: record.clone(),
                expected_address,
            });
        }
        Ok(plan)
    }

    fn constructor_args(&self, record: &BeneficiaryRecord) -> ConstructorArgs {
        ConstructorArgs {
            token: self.settings.token,
            beneficiary: record.beneficiary,
            admin: self.settings.admin,
            cliff_duration: record.cliff_duration,
            start_time: record.start_time,
            duration: record.duration,
            amount: record.amount,
            funding_amount: if self.settings.fund_on_deploy {
                record.amount
            } else {
                U256::zero()
            },
        }
    }

    pub fn build_deploy_transaction(
        &self,
        intent: &DeploymentIntent,
    ) -> Result<TransactionRecord, DeployerError> {
        let calldata = encode_calldata(DEPLOY_TIMELOCK_SIGNATURE, &intent.args.to_calldata_values())?;
        Ok(TransactionRecord::call(self.settings.factory, calldata))
    }

    /// Plans the run, then hands the approval (if any) and every deployment to `sink`, in
    /// that order. The sink is only finished when every dispatch succeeded.
    pub async fn run<S: TransactionSink>(
        &self,
        records: &[BeneficiaryRecord],
        mut sink: S,
    ) -> Result<RunReport, DeployerError> {
        info!(
            mode = ?sink.mode(),
            records = records.len(),
            factory = %format!("{:#x}", self.settings.factory),
            deployer = %format!("{:#x}", self.settings.deployer),
            "Planning timelock deployments"
        );
        let plan = self.plan(records).await?;
        info!(
            pending = plan.intents.len(),
            skipped = plan.skipped.len(),
            "Planning done"
        );

        let mut pending = Vec::with_capacity(plan.intents.len() + 1);
        let approval = if self.settings.fund_on_deploy {
            let required = required_funding(&plan.intents)?;
            self.allowance
                .ensure_allowance(
                    self.reader,
                    self.settings.deployer,
                    self.settings.factory,
                    required,
                )
                .await?
        } else {
            None
        };
        if let Some((amount, tx)) = &approval {
            pending.push(PendingTransaction::Approval {
                spender: self.settings.factory,
                amount: *amount,
                tx: tx.clone(),
            });
        }
        for intent in plan.intents {
            let tx = self.build_deploy_transaction(&intent)?;
            pending.push(PendingTransaction::Timelock { intent, tx });
        }

        let mut dispatched = Vec::with_capacity(pending.len());
        for transaction in pending {
            if let PendingTransaction::Timelock { intent, .. } = &transaction {
                info!(
                    beneficiary = %format!("{:#x}", intent.record.beneficiary),
                    start_time = intent.record.start_time,
                    "Dispatching timelock deployment"
                );
            }
            dispatched.push(sink.dispatch(transaction).await?);
        }

        Ok(RunReport {
            total: records.len(),
            skipped: plan.skipped,
            approval: approval.map(|(_, tx)| tx),
            dispatched,
            sink: sink.finish().await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use timelocks_common::calldata::{compute_function_selector, decode_address, decode_uint};
    use timelocks_rpc::EthClientError;

    /// Derives the address from the beneficiary and reports code for `deployed`.
    struct Chain {
        deployed: Vec<Address>,
    }

    #[async_trait]
    impl ChainReader for Chain {
        async fn call(&self, _to: Address, calldata: Bytes) -> Result<Bytes, EthClientError> {
            let beneficiary = decode_address(&calldata[4..], 2).unwrap_or_default();
            let mut word = [0u8; 32];
            word[12..].copy_from_slice(&beneficiary.as_bytes()[..]);
            word[12] ^= 0xff;
            Ok(Bytes::copy_from_slice(&word))
        }

        async fn get_code(&self, address: Address) -> Result<Bytes, EthClientError> {
            Ok(if self.deployed.contains(&address) {
                Bytes::from_static(&[0x60, 0x80])
            } else {
                Bytes::new()
            })
        }
    }

    fn timelock_of(beneficiary: Address) -> Address {
        let mut address = beneficiary;
        address.0[0] ^= 0xff;
        address
    }

    fn settings(fund_on_deploy: bool) -> OrchestratorSettings {
        OrchestratorSettings {
            deployer: Address::repeat_byte(0xde),
            factory: Address::repeat_byte(0xfa),
            token: Address::repeat_byte(0x70),
            admin: Address::repeat_byte(0xad),
            fund_on_deploy,
        }
    }

    fn record(byte: u8, amount: u64) -> BeneficiaryRecord {
        BeneficiaryRecord {
            beneficiary: Address::repeat_byte(byte),
            cliff_duration: 0,
            start_time: 1000,
            duration: 10,
            amount: U256::from(amount),
        }
    }

    #[tokio::test]
    async fn plans_undeployed_records_in_order() {
        let chain = Chain {
            deployed: vec![timelock_of(Address::repeat_byte(0xb2))],
        };
        let orchestrator = DeploymentOrchestrator::new(&chain, settings(false));
        let records = [record(0xb1, 100), record(0xb2, 50), record(0xb3, 10)];

        let plan = orchestrator.plan(&records).await.unwrap();
        let planned: Vec<_> = plan.intents.iter().map(|i| i.record.beneficiary).collect();
        assert_eq!(planned, vec![Address::repeat_byte(0xb1), Address::repeat_byte(0xb3)]);
        assert_eq!(plan.skipped.len(), 1);
        assert_eq!(plan.skipped[0].reason, SkipReason::AlreadyDeployed);
        assert_eq!(
            plan.intents[0].expected_address,
            timelock_of(Address::repeat_byte(0xb1))
        );
    }

    #[tokio::test]
    async fn duplicate_rows_are_planned_once() {
        let chain = Chain { deployed: vec![] };
        let orchestrator = DeploymentOrchestrator::new(&chain, settings(false));
        let records = [record(0xb1, 100), record(0xb1, 100)];

        let plan = orchestrator.plan(&records).await.unwrap();
        assert_eq!(plan.intents.len(), 1);
        assert_eq!(plan.skipped[0].reason, SkipReason::DuplicateInRun);
    }

    #[tokio::test]
    async fn funding_follows_fund_on_deploy() {
        let chain = Chain { deployed: vec![] };
        let records = [record(0xb1, 100)];

        for (fund, expected) in [(false, U256::zero()), (true, U256::from(100))] {
            let orchestrator = DeploymentOrchestrator::new(&chain, settings(fund));
            let plan = orchestrator.plan(&records).await.unwrap();
            let intent = &plan.intents[0];
            assert_eq!(intent.args.amount, U256::from(100));
            assert_eq!(intent.funding_amount(), expected);

            let tx = orchestrator.build_deploy_transaction(intent).unwrap();
            assert_eq!(tx.to, Address::repeat_byte(0xfa));
            assert_eq!(tx.data[..4], compute_function_selector(DEPLOY_TIMELOCK_SIGNATURE));
            let args = &tx.data[4..];
            assert_eq!(decode_address(args, 0), Some(Address::repeat_byte(0x70)));
            assert_eq!(decode_address(args, 1), Some(Address::repeat_byte(0xb1)));
            assert_eq!(decode_address(args, 2), Some(Address::repeat_byte(0xad)));
            assert_eq!(decode_uint(args, 4), Some(U256::from(1000)));
            assert_eq!(decode_uint(args, 7), Some(expected));
        }
    }
}
