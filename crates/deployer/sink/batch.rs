use std::{
    fs,
    path::{Path, PathBuf},
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use tracing::info;

use super::{DispatchOutcome, PendingTransaction, SinkReport, TransactionSink};
use crate::{
    error::DeployerError,
    types::{DeploymentMode, TransactionRecord},
};

pub const LATEST_BATCH_FILE: &str = "transactions-latest.json";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFiles {
    pub snapshot: PathBuf,
    pub latest: PathBuf,
}

/// Accumulates unsigned transactions for offline co-signing.
#[derive(Debug)]
pub struct BatchRecorder {
    transactions: Vec<TransactionRecord>,
    out_dir: PathBuf,
    timestamp: u64,
}

impl BatchRecorder {
    pub fn new(out_dir: impl Into<PathBuf>) -> Self {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        Self::with_timestamp(out_dir, timestamp)
    }

    pub fn with_timestamp(out_dir: impl Into<PathBuf>, timestamp: u64) -> Self {
        Self {
            transactions: Vec::new(),
            out_dir: out_dir.into(),
            timestamp,
        }
    }

    fn write(&self) -> Result<BatchFiles, DeployerError> {
        fs::create_dir_all(&self.out_dir)?;
        let json = serde_json::to_string_pretty(&self.transactions)?;
        let files = BatchFiles {
            snapshot: self
                .out_dir
                .join(format!("transactions-{}.json", self.timestamp)),
            latest: self.out_dir.join(LATEST_BATCH_FILE),
        };
        write_file(&files.snapshot, &json)?;
        write_file(&files.latest, &json)?;
        Ok(files)
    }
}

fn write_file(path: &Path, json: &str) -> Result<(), DeployerError> {
    fs::write(path, format!("{json}\n"))?;
    Ok(())
}

#[async_trait]
impl TransactionSink for BatchRecorder {
    fn mode(&self) -> DeploymentMode {
        DeploymentMode::OfflineBatch
    }

    async fn dispatch(
        &mut self,
        pending: PendingTransaction,
    ) -> Result<DispatchOutcome, DeployerError> {
        let position = self.transactions.len();
        self.transactions.push(pending.into_tx());
        Ok(DispatchOutcome::Queued { position })
    }

    async fn finish(self) -> Result<SinkReport, DeployerError> {
        let files = self.write()?;
        info!(
            transactions = self.transactions.len(),
            snapshot = %files.snapshot.display(),
            latest = %files.latest.display(),
            "Wrote transaction batch"
        );
        Ok(SinkReport::Batch {
            files,
            transactions: self.transactions.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timelocks_common::{Address, U256};

    fn read_batch(path: &Path) -> Vec<TransactionRecord> {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    fn approval(byte: u8) -> PendingTransaction {
        PendingTransaction::Approval {
            spender: Address::repeat_byte(0xfa),
            amount: U256::from(byte),
            tx: TransactionRecord::call(Address::repeat_byte(byte), vec![byte]),
        }
    }

    #[tokio::test]
    async fn writes_snapshot_and_latest_in_dispatch_order() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("goerli");
        let mut recorder = BatchRecorder::with_timestamp(&out_dir, 1_700_000_000);

        assert_eq!(
            recorder.dispatch(approval(1)).await.unwrap(),
            DispatchOutcome::Queued { position: 0 }
        );
        assert_eq!(
            recorder.dispatch(approval(2)).await.unwrap(),
            DispatchOutcome::Queued { position: 1 }
        );

        let SinkReport::Batch {
            files,
            transactions,
        } = recorder.finish().await.unwrap()
        else {
            panic!("batch recorder must report a batch");
        };
        assert_eq!(transactions, 2);
        assert_eq!(files.snapshot, out_dir.join("transactions-1700000000.json"));

        let snapshot = fs::read_to_string(&files.snapshot).unwrap();
        assert_eq!(snapshot, fs::read_to_string(&files.latest).unwrap());
        let queued = read_batch(&files.latest);
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].to, Address::repeat_byte(1));
        assert_eq!(queued[1].to, Address::repeat_byte(2));
    }

    #[tokio::test]
    async fn empty_run_writes_empty_array() {
        let dir = tempfile::tempdir().unwrap();
        let recorder = BatchRecorder::with_timestamp(dir.path(), 1);
        let SinkReport::Batch { files, .. } = recorder.finish().await.unwrap() else {
            panic!("batch recorder must report a batch");
        };
        assert_eq!(fs::read_to_string(files.latest).unwrap().trim(), "[]");
    }

    #[tokio::test]
    async fn latest_is_overwritten_by_next_run() {
        let dir = tempfile::tempdir().unwrap();

        let mut first = BatchRecorder::with_timestamp(dir.path(), 1);
        first.dispatch(approval(1)).await.unwrap();
        first.finish().await.unwrap();

        let second = BatchRecorder::with_timestamp(dir.path(), 2);
        second.finish().await.unwrap();

        assert!(read_batch(&dir.path().join(LATEST_BATCH_FILE)).is_empty());
        assert_eq!(read_batch(&dir.path().join("transactions-1.json")).len(), 1);
    }
}
