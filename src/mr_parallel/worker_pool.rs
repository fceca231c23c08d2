use std::fmt;

use async_channel::{Receiver, Sender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::WorkerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerKind {
    Lister,
    Map,
    Reduce,
}

impl fmt::Display for WorkerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkerKind::Lister => f.write_str("lister"),
            WorkerKind::Map => f.write_str("map"),
            WorkerKind::Reduce => f.write_str("reduce"),
        }
    }
}

/// Counters a worker returns on success
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct WorkerStats {
    pub files: u64,
    pub chunks: u64,
    pub bytes: u64,
    pub pairs: u64,
    pub keys: u64,
    /// Listed names that could not become filename messages
    pub skipped: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerStatus {
    Succeeded(WorkerStats),
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct WorkerReport {
    pub kind: WorkerKind,
    pub index: usize,
    pub status: WorkerStatus,
}

impl fmt::Display for WorkerReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} worker {}", self.kind, self.index)
    }
}

pub(crate) type WorkerTask = JoinHandle<Result<WorkerStats, WorkerError>>;

/// A running worker plus the coordinator's side of its channels.
///
/// The handle holds only the endpoints the coordinator uses; the worker's
/// ends were moved into its task at spawn. Dropping `input` is the end-of-input
/// signal.
pub struct WorkerHandle<I, O> {
    kind: WorkerKind,
    index: usize,
    input: Option<Sender<I>>,
    output: Option<Receiver<O>>,
    task: WorkerTask,
}

impl<I, O> WorkerHandle<I, O> {
    pub(crate) fn new(
        kind: WorkerKind,
        index: usize,
        input: Option<Sender<I>>,
        output: Option<Receiver<O>>,
        task: WorkerTask,
    ) -> Self {
        Self {
            kind,
            index,
            input,
            output,
            task,
        }
    }

    pub fn kind(&self) -> WorkerKind {
        self.kind
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn input(&self) -> Option<&Sender<I>> {
        self.input.as_ref()
    }

    pub(crate) fn take_input(&mut self) -> Option<Sender<I>> {
        self.input.take()
    }

    pub(crate) fn take_output(&mut self) -> Option<Receiver<O>> {
        self.output.take()
    }

    /// Drop the coordinator's sender so the worker sees end-of-input.
    pub fn close_input(&mut self) {
        if self.input.take().is_some() {
            debug!(kind = %self.kind, worker = self.index, "input closed");
        }
    }

    /// Wait for the worker to terminate and record how it ended.
    pub async fn join(mut self) -> WorkerReport {
        // a worker blocked on a full input must never outlive its handle
        self.close_input();
        drop(self.output.take());

        let status = match self.task.await {
            Ok(Ok(stats)) => {
                debug!(kind = %self.kind, worker = self.index, ?stats, "worker finished");
                WorkerStatus::Succeeded(stats)
            }
            Ok(Err(err)) => {
                warn!(kind = %self.kind, worker = self.index, error = %err, "worker failed");
                WorkerStatus::Failed(err.to_string())
            }
            Err(join_err) => {
                warn!(kind = %self.kind, worker = self.index, error = %join_err, "worker panicked");
                WorkerStatus::Failed(format!("panicked: {join_err}"))
            }
        };

        WorkerReport {
            kind: self.kind,
            index: self.index,
            status,
        }
    }
}
