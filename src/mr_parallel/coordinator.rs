//! Coordinator - owns the worker topology for one run
//!
//! The coordinator is responsible for:
//! - Spawning the lister, the map pool and the reduce pool, in that order
//! - Round-robin distribution of filenames to map workers
//! - Concurrent fan-in of every map worker's pairs, partitioned by key
//! - Closing channels in order so end-of-stream propagates
//! - Reaping every worker and reporting failures

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use async_channel::{Receiver, Sender};
use futures::stream::{self, StreamExt};
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::artifact::artifact_path;
use crate::common::{MapReduceApp, Phase, RunReport};
use crate::config::JobConfig;
use crate::error::SetupError;
use crate::mr_parallel::lister::{spawn_lister, ListerHandle};
use crate::mr_parallel::map_worker::{MapHandle, MapWorker};
use crate::mr_parallel::reduce_worker::{ReduceHandle, ReduceWorker};
use crate::mr_parallel::worker_pool::WorkerStatus;
use crate::protocol::{partition, Pair, MAX_PATH_LEN};

/// Counters from the distribution step
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DistributeStats {
    pub dispatched: u64,
    pub skipped: u64,
    pub lost: u64,
    /// Files successfully handed to each map worker
    pub per_worker: Vec<u64>,
}

/// Counters from the fan-in step
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ShuffleStats {
    pub forwarded: u64,
    pub dropped: u64,
    pub per_reducer: Vec<u64>,
}

pub struct Coordinator {
    config: JobConfig,
    run_id: Uuid,
    phase: watch::Sender<Phase>,
    /// Watch receivers only see the latest phase; this keeps them all
    transitions: Mutex<Vec<Phase>>,
    lister: Option<ListerHandle>,
    maps: Vec<MapHandle>,
    reduces: Vec<ReduceHandle>,
    artifacts: Vec<PathBuf>,
}

impl Coordinator {
    /// Validate the config and bring up lister, map workers, then reduce workers.
    pub fn spawn(config: JobConfig, app: Arc<dyn MapReduceApp>) -> Result<Self, SetupError> {
        config.validate()?;
        if !config.dir.is_dir() {
            return Err(SetupError::NotADirectory(config.dir.clone()));
        }
        std::fs::create_dir_all(&config.output_dir).map_err(|source| SetupError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;

        let run_id = Uuid::new_v4();
        let (phase, _) = watch::channel(Phase::Listing);

        let lister = spawn_lister(config.lister, &config.dir, config.channel_capacity)?;

        let maps = (0..config.map_workers)
            .map(|i| MapWorker::spawn(i, Arc::clone(&app), config.chunk_size, config.channel_capacity))
            .collect();

        let artifacts: Vec<PathBuf> = (0..config.reduce_workers)
            .map(|i| artifact_path(&config.output_dir, i))
            .collect();
        let reduces = artifacts
            .iter()
            .enumerate()
            .map(|(i, path)| {
                ReduceWorker::spawn(i, Arc::clone(&app), path.clone(), config.channel_capacity)
            })
            .collect();

        info!(
            %run_id,
            dir = %config.dir.display(),
            map_workers = config.map_workers,
            reduce_workers = config.reduce_workers,
            "workers spawned"
        );

        Ok(Self {
            config,
            run_id,
            phase,
            transitions: Mutex::new(vec![Phase::Listing]),
            lister: Some(lister),
            maps,
            reduces,
            artifacts,
        })
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn phase(&self) -> Phase {
        *self.phase.borrow()
    }

    pub fn subscribe_phase(&self) -> watch::Receiver<Phase> {
        self.phase.subscribe()
    }

    fn advance(&self, next: Phase) {
        let prev = self.phase.send_replace(next);
        debug_assert!(prev <= next, "phase moved backwards: {prev} -> {next}");
        self.transitions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(next);
        info!(run_id = %self.run_id, from = %prev, to = %next, "phase");
    }

    /// Drive the run to completion.
    ///
    /// Distribution and fan-in run concurrently: a map worker blocked on its
    /// full pair channel is only released by fan-in, so filenames can never be
    /// fed to completion first.
    pub async fn run(self) -> RunReport {
        let span = info_span!("run", run_id = %self.run_id);
        self.drive().instrument(span).await
    }

    async fn drive(mut self) -> RunReport {
        let mut report = RunReport::new(self.run_id, self.config.reduce_workers);
        report.artifacts = self.artifacts.clone();

        let filenames = self.lister.as_mut().and_then(|l| l.take_output());
        let map_inputs: Vec<Sender<PathBuf>> =
            self.maps.iter_mut().filter_map(|h| h.take_input()).collect();
        let map_outputs: Vec<Receiver<Pair>> =
            self.maps.iter_mut().filter_map(|h| h.take_output()).collect();

        self.advance(Phase::Mapping);
        let (dist, shuf) = {
            let reduce_inputs: Vec<&Sender<Pair>> =
                self.reduces.iter().filter_map(|h| h.input()).collect();
            let this = &self;

            let distributing = async move {
                let stats = match filenames {
                    Some(rx) => distribute(&this.config.dir, rx, map_inputs).await,
                    None => DistributeStats::default(),
                };
                this.advance(Phase::Shuffling);
                stats
            };
            let shuffling = shuffle(map_outputs, &reduce_inputs);

            tokio::join!(distributing, shuffling)
        };

        self.close_reduce_inputs();

        report.files_dispatched = dist.dispatched;
        report.files_skipped = dist.skipped;
        report.files_lost = dist.lost;
        report.pairs_shuffled = shuf.forwarded;
        report.pairs_dropped = shuf.dropped;
        report.pairs_per_reducer = shuf.per_reducer;

        self.reap(&mut report).await;
        report.phases = std::mem::take(
            self.transitions
                .get_mut()
                .unwrap_or_else(PoisonError::into_inner),
        );

        info!(
            files = report.files_dispatched,
            pairs = report.pairs_shuffled,
            failed = report.failed_workers().count(),
            "run complete"
        );
        report
    }

    /// Close every reduce worker's input, ending the shuffle.
    pub fn close_reduce_inputs(&mut self) {
        for handle in &mut self.reduces {
            handle.close_input();
        }
        self.advance(Phase::Reducing);
    }

    /// Wait for the lister and every worker; record how each one ended.
    ///
    /// Names the lister could not forward are added to `files_skipped`.
    pub async fn reap(&mut self, report: &mut RunReport) {
        self.advance(Phase::Draining);

        if let Some(lister) = self.lister.take() {
            let lister = lister.join().await;
            if let WorkerStatus::Succeeded(stats) = &lister.status {
                report.files_skipped += stats.skipped;
            }
            report.workers.push(lister);
        }
        for handle in self.maps.drain(..) {
            report.workers.push(handle.join().await);
        }
        for handle in self.reduces.drain(..) {
            report.workers.push(handle.join().await);
        }

        for failed in report.failed_workers() {
            warn!(worker = %failed, status = ?failed.status, "worker did not complete");
        }
    }
}

/// Hand each listed filename to the next map worker in turn, then close
/// every map input.
///
/// Worker `i` receives the files at listing positions `i, i + M, i + 2M, ...`,
/// so no worker is ever more than one file ahead of another. A send to a
/// worker that already died counts as lost and the rotation moves on.
pub async fn distribute(
    dir: &Path,
    filenames: Receiver<String>,
    inputs: Vec<Sender<PathBuf>>,
) -> DistributeStats {
    let mut stats = DistributeStats {
        per_worker: vec![0; inputs.len()],
        ..Default::default()
    };
    if inputs.is_empty() {
        return stats;
    }

    let mut next = 0;
    while let Ok(name) = filenames.recv().await {
        let path = dir.join(&name);
        if path.as_os_str().len() > MAX_PATH_LEN {
            warn!(name = %name, max = MAX_PATH_LEN, "path too long, skipping");
            stats.skipped += 1;
            continue;
        }

        let worker = next;
        next = (next + 1) % inputs.len();

        match inputs[worker].send(path).await {
            Ok(()) => {
                debug!(worker, name = %name, "dispatched");
                stats.dispatched += 1;
                stats.per_worker[worker] += 1;
            }
            Err(_) => {
                warn!(worker, name = %name, "map worker gone, file lost");
                stats.lost += 1;
            }
        }
    }

    // structural end-of-input for every map worker
    drop(inputs);
    debug!(dispatched = stats.dispatched, "map inputs closed");
    stats
}

/// Fan in pairs from every map worker and route each one by key.
///
/// All producers are polled together; whichever has a pair ready is served,
/// so a producer blocked on a full channel is never waiting behind another
/// producer's end-of-stream. Returns once every producer has closed.
pub async fn shuffle(outputs: Vec<Receiver<Pair>>, reduce_inputs: &[&Sender<Pair>]) -> ShuffleStats {
    let reduce_count = reduce_inputs.len();
    let mut stats = ShuffleStats {
        per_reducer: vec![0; reduce_count],
        ..Default::default()
    };

    let mut merged = stream::select_all(outputs.into_iter().map(Box::pin));
    if reduce_count == 0 {
        while merged.next().await.is_some() {
            stats.dropped += 1;
        }
        return stats;
    }

    while let Some(pair) = merged.next().await {
        let target = partition(pair.key(), reduce_count);
        if reduce_inputs[target].send(pair).await.is_ok() {
            stats.forwarded += 1;
            stats.per_reducer[target] += 1;
        } else {
            if stats.dropped == 0 {
                warn!(reducer = target, "reduce worker gone, dropping its pairs");
            }
            stats.dropped += 1;
        }
    }

    debug!(forwarded = stats.forwarded, dropped = stats.dropped, "fan-in complete");
    stats
}
