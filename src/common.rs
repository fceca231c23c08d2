use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::JobConfig;
use crate::error::{PairError, Result};
use crate::mr_parallel::worker_pool::{WorkerReport, WorkerStatus};
use crate::protocol::Pair;

/// User job bound in at integration time.
pub trait MapReduceApp: Send + Sync {
    /// Called once per chunk of file bytes; chunks may split words.
    fn map(&self, chunk: &[u8]) -> std::result::Result<Vec<Pair>, PairError>;
    /// Called once per distinct key with its values in arrival order.
    fn reduce(&self, key: &str, values: Vec<String>) -> std::result::Result<Pair, PairError>;
}

#[async_trait]
pub trait MapReduce {
    fn new(config: JobConfig, mr_app: Arc<dyn MapReduceApp>) -> Self;
    async fn run(self) -> Result<RunReport>;
}

/// Global run state, advanced only by the coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Listing,
    Mapping,
    Shuffling,
    Reducing,
    Draining,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Listing => "listing",
            Phase::Mapping => "mapping",
            Phase::Shuffling => "shuffling",
            Phase::Reducing => "reducing",
            Phase::Draining => "draining",
        };
        f.write_str(name)
    }
}

/// Outcome of a whole run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    /// Filenames handed to a live map worker
    pub files_dispatched: u64,
    /// Filenames rejected before dispatch (overlong or non-UTF-8)
    pub files_skipped: u64,
    /// Filenames whose map worker had already died
    pub files_lost: u64,
    pub pairs_shuffled: u64,
    /// Pairs whose reduce worker had already died
    pub pairs_dropped: u64,
    /// Pairs forwarded to each reduce index
    pub pairs_per_reducer: Vec<u64>,
    pub artifacts: Vec<PathBuf>,
    pub workers: Vec<WorkerReport>,
    /// Every phase the run passed through, in order; empty for the
    /// sequential engine
    pub phases: Vec<Phase>,
}

impl RunReport {
    pub(crate) fn new(run_id: Uuid, reduce_count: usize) -> Self {
        Self {
            run_id,
            files_dispatched: 0,
            files_skipped: 0,
            files_lost: 0,
            pairs_shuffled: 0,
            pairs_dropped: 0,
            pairs_per_reducer: vec![0; reduce_count],
            artifacts: Vec::with_capacity(reduce_count),
            workers: Vec::new(),
            phases: Vec::new(),
        }
    }

    pub fn failed_workers(&self) -> impl Iterator<Item = &WorkerReport> {
        self.workers
            .iter()
            .filter(|w| matches!(w.status, WorkerStatus::Failed(_)))
    }

    pub fn is_success(&self) -> bool {
        self.failed_workers().next().is_none()
    }
}
