use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_channel::Receiver;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::debug;

use crate::common::MapReduceApp;
use crate::error::WorkerError;
use crate::multimap::KeyMultimap;
use crate::mr_parallel::worker_pool::{WorkerHandle, WorkerKind, WorkerStats};
use crate::protocol::Pair;

/// Coordinator's view of a reduce worker: pairs in, nothing out
pub type ReduceHandle = WorkerHandle<Pair, ()>;

pub struct ReduceWorker {
    index: usize,
    app: Arc<dyn MapReduceApp>,
    pairs: Receiver<Pair>,
    output_path: PathBuf,
}

impl ReduceWorker {
    pub fn spawn(
        index: usize,
        app: Arc<dyn MapReduceApp>,
        output_path: PathBuf,
        capacity: usize,
    ) -> ReduceHandle {
        let (pair_tx, pair_rx) = async_channel::bounded(capacity);

        let worker = ReduceWorker {
            index,
            app,
            pairs: pair_rx,
            output_path,
        };
        let task = tokio::spawn(worker.run());

        WorkerHandle::new(WorkerKind::Reduce, index, Some(pair_tx), None, task)
    }

    async fn run(self) -> Result<WorkerStats, WorkerError> {
        let mut stats = WorkerStats::default();
        let mut groups = KeyMultimap::new();

        while let Ok(pair) = self.pairs.recv().await {
            groups.insert(pair)?;
            stats.pairs += 1;
        }
        stats.keys = groups.len() as u64;
        debug!(worker = self.index, pairs = stats.pairs, keys = stats.keys, "reduce input closed");

        let written = write_reduced(self.app.as_ref(), groups, &self.output_path).await?;
        debug!(
            worker = self.index,
            records = written,
            path = %self.output_path.display(),
            "reduce write"
        );
        Ok(stats)
    }
}

/// Reduce every group in first-seen order and write one record per key.
///
/// Each group is dropped right after its record is written. Returns the
/// number of records.
pub async fn write_reduced(
    app: &dyn MapReduceApp,
    groups: KeyMultimap,
    path: &Path,
) -> Result<u64, WorkerError> {
    let write_err = |source| WorkerError::Write {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).await.map_err(|source| WorkerError::Create {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = BufWriter::new(file);

    let mut written = 0;
    for group in groups.into_groups() {
        let (key, values) = group.into_parts();
        let result = app.reduce(&key, values)?;
        writer.write_all(&result.encode()).await.map_err(write_err)?;
        written += 1;
    }

    writer.flush().await.map_err(write_err)?;
    writer.into_inner().sync_all().await.map_err(write_err)?;
    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PairError;
    use crate::mr_parallel::worker_pool::WorkerStatus;
    use crate::protocol::RECORD_LEN;
    use tempfile::TempDir;

    /// Joins values with '+' so arrival order is visible in the output
    struct Concat;

    impl MapReduceApp for Concat {
        fn map(&self, _chunk: &[u8]) -> Result<Vec<Pair>, PairError> {
            Ok(Vec::new())
        }

        fn reduce(&self, key: &str, values: Vec<String>) -> Result<Pair, PairError> {
            Pair::new(key, values.join("+"))
        }
    }

    fn read_records(path: &Path) -> Vec<Pair> {
        let bytes = std::fs::read(path).unwrap();
        assert_eq!(bytes.len() % RECORD_LEN, 0);
        bytes
            .chunks_exact(RECORD_LEN)
            .map(|r| Pair::decode(r).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_record_per_key_in_arrival_order() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("reduce-0.out");
        let mut handle = ReduceWorker::spawn(0, Arc::new(Concat), out.clone(), 2);

        let input = handle.take_input().unwrap();
        for (k, v) in [("b", "1"), ("a", "2"), ("b", "3"), ("a", "4"), ("b", "5")] {
            input.send(Pair::new(k, v).unwrap()).await.unwrap();
        }
        drop(input);

        let report = handle.join().await;
        assert_eq!(
            report.status,
            WorkerStatus::Succeeded(WorkerStats {
                pairs: 5,
                keys: 2,
                ..Default::default()
            })
        );

        let records = read_records(&out);
        assert_eq!(
            records,
            vec![Pair::new("b", "1+3+5").unwrap(), Pair::new("a", "2+4").unwrap()]
        );
    }

    #[tokio::test]
    async fn test_empty_input_writes_empty_artifact() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("reduce-1.out");
        let mut handle = ReduceWorker::spawn(1, Arc::new(Concat), out.clone(), 2);
        handle.close_input();

        assert!(matches!(handle.join().await.status, WorkerStatus::Succeeded(_)));
        assert_eq!(std::fs::metadata(&out).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn test_unwritable_artifact_fails_worker() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("no-such-dir").join("reduce-0.out");
        let mut handle = ReduceWorker::spawn(0, Arc::new(Concat), out, 2);
        handle
            .input()
            .unwrap()
            .send(Pair::new("k", "v").unwrap())
            .await
            .unwrap();
        handle.close_input();

        let report = handle.join().await;
        assert!(matches!(report.status, WorkerStatus::Failed(ref m) if m.contains("Failed to create")));
    }

    #[tokio::test]
    async fn test_oversized_reduce_result_fails_worker() {
        struct TooLong;
        impl MapReduceApp for TooLong {
            fn map(&self, _chunk: &[u8]) -> Result<Vec<Pair>, PairError> {
                Ok(Vec::new())
            }
            fn reduce(&self, key: &str, _values: Vec<String>) -> Result<Pair, PairError> {
                Pair::new(key, "x".repeat(1024))
            }
        }

        let dir = TempDir::new().unwrap();
        let mut handle = ReduceWorker::spawn(0, Arc::new(TooLong), dir.path().join("r.out"), 2);
        handle
            .input()
            .unwrap()
            .send(Pair::new("k", "v").unwrap())
            .await
            .unwrap();
        handle.close_input();

        assert!(matches!(handle.join().await.status, WorkerStatus::Failed(_)));
    }
}
