use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_channel::{Receiver, Sender};
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tracing::debug;

use crate::common::MapReduceApp;
use crate::error::WorkerError;
use crate::mr_parallel::worker_pool::{WorkerHandle, WorkerKind, WorkerStats};
use crate::protocol::Pair;

/// Coordinator's view of a map worker: filenames in, pairs out
pub type MapHandle = WorkerHandle<PathBuf, Pair>;

/// Reads a file in fixed-size chunks; only the last one may be short.
pub struct ChunkReader {
    path: PathBuf,
    file: File,
    buf: Vec<u8>,
    done: bool,
}

impl ChunkReader {
    pub async fn open(path: &Path, chunk_size: usize) -> Result<Self, WorkerError> {
        let file = File::open(path).await.map_err(|source| WorkerError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self {
            path: path.to_path_buf(),
            file,
            buf: vec![0; chunk_size],
            done: false,
        })
    }

    /// Next chunk, or `None` at end of file.
    pub async fn next_chunk(&mut self) -> Result<Option<&[u8]>, WorkerError> {
        if self.done {
            return Ok(None);
        }

        // a single read may return less than asked; keep going until full or EOF
        let mut filled = 0;
        while filled < self.buf.len() {
            let n = self
                .file
                .read(&mut self.buf[filled..])
                .await
                .map_err(|source| WorkerError::Read {
                    path: self.path.clone(),
                    source,
                })?;
            if n == 0 {
                self.done = true;
                break;
            }
            filled += n;
        }

        if filled == 0 {
            Ok(None)
        } else {
            Ok(Some(&self.buf[..filled]))
        }
    }
}

pub struct MapWorker {
    index: usize,
    app: Arc<dyn MapReduceApp>,
    chunk_size: usize,
    filenames: Receiver<PathBuf>,
    pairs: Sender<Pair>,
}

impl MapWorker {
    /// Spawn a map worker wired to its own filename and pair channels.
    pub fn spawn(
        index: usize,
        app: Arc<dyn MapReduceApp>,
        chunk_size: usize,
        capacity: usize,
    ) -> MapHandle {
        let (filename_tx, filename_rx) = async_channel::bounded(capacity);
        let (pair_tx, pair_rx) = async_channel::bounded(capacity);

        // the worker owns filename_rx and pair_tx; nothing else keeps a clone
        let worker = MapWorker {
            index,
            app,
            chunk_size,
            filenames: filename_rx,
            pairs: pair_tx,
        };
        let task = tokio::spawn(worker.run());

        WorkerHandle::new(WorkerKind::Map, index, Some(filename_tx), Some(pair_rx), task)
    }

    async fn run(self) -> Result<WorkerStats, WorkerError> {
        let mut stats = WorkerStats::default();

        while let Ok(path) = self.filenames.recv().await {
            debug!(worker = self.index, path = %path.display(), "map read");
            self.map_file(&path, &mut stats).await?;
            stats.files += 1;
        }

        debug!(worker = self.index, files = stats.files, pairs = stats.pairs, "map input closed");
        // dropping self closes the pair channel
        Ok(stats)
    }

    async fn map_file(&self, path: &Path, stats: &mut WorkerStats) -> Result<(), WorkerError> {
        let mut reader = ChunkReader::open(path, self.chunk_size).await?;

        while let Some(chunk) = reader.next_chunk().await? {
            stats.chunks += 1;
            stats.bytes += chunk.len() as u64;
            let pairs = self.app.map(chunk)?;

            for pair in pairs {
                self.pairs
                    .send(pair)
                    .await
                    .map_err(|_| WorkerError::OutputClosed(format!("map worker {}", self.index)))?;
                stats.pairs += 1;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PairError;
    use crate::mr_parallel::worker_pool::WorkerStatus;
    use tempfile::TempDir;

    /// Emits one pair per chunk: (chunk length, chunk text)
    struct ChunkEcho;

    impl MapReduceApp for ChunkEcho {
        fn map(&self, chunk: &[u8]) -> Result<Vec<Pair>, PairError> {
            let text = String::from_utf8_lossy(chunk);
            Ok(vec![Pair::new(chunk.len().to_string(), text)?])
        }

        fn reduce(&self, key: &str, values: Vec<String>) -> Result<Pair, PairError> {
            Pair::new(key, values.concat())
        }
    }

    async fn drain(rx: Receiver<Pair>) -> Vec<Pair> {
        let mut out = Vec::new();
        while let Ok(pair) = rx.recv().await {
            out.push(pair);
        }
        out
    }

    #[tokio::test]
    async fn test_final_short_chunk_is_kept() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ten.txt");
        std::fs::write(&path, "abcdefghij").unwrap();

        let mut reader = ChunkReader::open(&path, 4).await.unwrap();
        let mut chunks = Vec::new();
        while let Some(chunk) = reader.next_chunk().await.unwrap() {
            chunks.push(chunk.to_vec());
        }
        assert_eq!(chunks, vec![b"abcd".to_vec(), b"efgh".to_vec(), b"ij".to_vec()]);
    }

    #[tokio::test]
    async fn test_exact_multiple_and_empty_file() {
        let dir = TempDir::new().unwrap();
        let even = dir.path().join("even.txt");
        let empty = dir.path().join("empty.txt");
        std::fs::write(&even, "abcdefgh").unwrap();
        std::fs::write(&empty, "").unwrap();

        let mut reader = ChunkReader::open(&even, 4).await.unwrap();
        assert_eq!(reader.next_chunk().await.unwrap(), Some(&b"abcd"[..]));
        assert_eq!(reader.next_chunk().await.unwrap(), Some(&b"efgh"[..]));
        assert_eq!(reader.next_chunk().await.unwrap(), None);

        let mut reader = ChunkReader::open(&empty, 4).await.unwrap();
        assert_eq!(reader.next_chunk().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_worker_maps_until_input_closed() {
        let dir = TempDir::new().unwrap();
        let a = dir.path().join("a.txt");
        let b = dir.path().join("b.txt");
        std::fs::write(&a, "hello").unwrap();
        std::fs::write(&b, "hi").unwrap();

        let mut handle = MapWorker::spawn(0, Arc::new(ChunkEcho), 3, 1);
        let output = handle.take_output().unwrap();
        let collector = tokio::spawn(drain(output));

        let input = handle.take_input().unwrap();
        input.send(a).await.unwrap();
        input.send(b).await.unwrap();
        drop(input);

        let pairs = collector.await.unwrap();
        let got: Vec<_> = pairs.iter().map(|p| (p.key(), p.value())).collect();
        assert_eq!(got, vec![("3", "hel"), ("2", "lo"), ("2", "hi")]);

        let report = handle.join().await;
        assert_eq!(
            report.status,
            WorkerStatus::Succeeded(WorkerStats {
                files: 2,
                chunks: 3,
                bytes: 7,
                pairs: 3,
                ..Default::default()
            })
        );
    }

    #[tokio::test]
    async fn test_no_input_closes_output() {
        let mut handle = MapWorker::spawn(1, Arc::new(ChunkEcho), 16, 4);
        let output = handle.take_output().unwrap();
        handle.close_input();

        assert!(drain(output).await.is_empty());
        assert!(matches!(handle.join().await.status, WorkerStatus::Succeeded(_)));
    }

    #[tokio::test]
    async fn test_missing_file_fails_worker() {
        let dir = TempDir::new().unwrap();
        let mut handle = MapWorker::spawn(2, Arc::new(ChunkEcho), 16, 4);
        let output = handle.take_output().unwrap();
        let input = handle.take_input().unwrap();
        input.send(dir.path().join("missing.txt")).await.unwrap();
        drop(input);

        assert!(drain(output).await.is_empty());
        let report = handle.join().await;
        assert!(matches!(report.status, WorkerStatus::Failed(ref m) if m.contains("missing.txt")));
    }
}
