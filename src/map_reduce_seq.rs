use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::artifact::artifact_path;
use crate::common::{MapReduce, MapReduceApp, RunReport};
use crate::config::JobConfig;
use crate::error::{Result, SetupError};
use crate::multimap::KeyMultimap;
use crate::mr_parallel::lister::list_dir;
use crate::mr_parallel::map_worker::ChunkReader;
use crate::mr_parallel::reduce_worker::write_reduced;
use crate::protocol::{partition, MAX_PATH_LEN};

/// Single-task engine producing the same artifacts as the worker pools.
///
/// Files are mapped in listing order, pairs partitioned with the same
/// function, and each partition reduced into `reduce-<i>.out`.
pub struct SequentialMapReduce {
    config: JobConfig,
    mr_app: Arc<dyn MapReduceApp>,
}

#[async_trait]
impl MapReduce for SequentialMapReduce {
    fn new(config: JobConfig, mr_app: Arc<dyn MapReduceApp>) -> Self {
        Self { config, mr_app }
    }

    async fn run(self) -> Result<RunReport> {
        let config = &self.config;
        config.validate()?;
        if !config.dir.is_dir() {
            return Err(SetupError::NotADirectory(config.dir.clone()).into());
        }
        std::fs::create_dir_all(&config.output_dir).map_err(|source| SetupError::OutputDir {
            path: config.output_dir.clone(),
            source,
        })?;

        let mut report = RunReport::new(Uuid::new_v4(), config.reduce_workers);
        let mut partitions: Vec<KeyMultimap> =
            (0..config.reduce_workers).map(|_| KeyMultimap::new()).collect();

        let listing = list_dir(&config.dir).await?;
        report.files_skipped = listing.skipped;
        for name in listing.names {
            let path = config.dir.join(&name);
            if path.as_os_str().len() > MAX_PATH_LEN {
                report.files_skipped += 1;
                continue;
            }
            debug!(path = %path.display(), "map read");

            let mut reader = ChunkReader::open(&path, config.chunk_size).await?;
            while let Some(chunk) = reader.next_chunk().await? {
                for pair in self.mr_app.map(chunk)? {
                    let target = partition(pair.key(), config.reduce_workers);
                    partitions[target].insert(pair).map_err(crate::error::WorkerError::from)?;
                    report.pairs_shuffled += 1;
                    report.pairs_per_reducer[target] += 1;
                }
            }
            report.files_dispatched += 1;
        }

        for (index, groups) in partitions.into_iter().enumerate() {
            let path = artifact_path(&config.output_dir, index);
            let written = write_reduced(self.mr_app.as_ref(), groups, &path).await?;
            debug!(index, records = written, path = %path.display(), "reduce write");
            report.artifacts.push(path);
        }

        info!(
            run_id = %report.run_id,
            files = report.files_dispatched,
            pairs = report.pairs_shuffled,
            "sequential run complete"
        );
        Ok(report)
    }
}
