//! Where the transactions of a run go.

use async_trait::async_trait;
use timelocks_common::{Address, H256, U256};

use crate::{
    error::DeployerError,
    types::{DeploymentIntent, DeploymentMode, TransactionRecord},
};

pub mod batch;
pub mod direct;

pub use batch::{BatchFiles, BatchRecorder};
pub use direct::DirectBroadcaster;

/// A built transaction together with what it is meant to achieve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PendingTransaction {
    Approval {
        spender: Address,
        /// Amount passed to `approve`, which becomes the spender's whole allowance.
        amount: U256,
        tx: TransactionRecord,
    },
    Timelock {
        intent: DeploymentIntent,
        tx: TransactionRecord,
    },
    Factory {
        expected_address: Address,
        tx: TransactionRecord,
    },
}

impl PendingTransaction {
    pub fn into_tx(self) -> TransactionRecord {
        match self {
            Self::Approval { tx, .. } | Self::Timelock { tx, .. } | Self::Factory { tx, .. } => tx,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Appended to the batch at `position`.
    Queued { position: usize },
    /// Mined successfully. `deployed` is the contract the transaction created, if any.
    Confirmed {
        tx_hash: H256,
        deployed: Option<Address>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SinkReport {
    Batch {
        files: BatchFiles,
        transactions: usize,
    },
    Direct {
        confirmed: usize,
    },
}

#[async_trait]
pub trait TransactionSink: Send {
    fn mode(&self) -> DeploymentMode;

    async fn dispatch(
        &mut self,
        pending: PendingTransaction,
    ) -> Result<DispatchOutcome, DeployerError>;

    /// Ends the run. Consuming the sink guarantees a batch is flushed at most once.
    async fn finish(self) -> Result<SinkReport, DeployerError>
    where
        Self: Sized;
}
