pub mod coordinator;
pub mod lister;
pub mod map_worker;
pub mod reduce_worker;
pub mod worker_pool;

use std::sync::Arc;

use crate::common::{MapReduce, MapReduceApp, RunReport};
use crate::config::JobConfig;
use crate::error::Result;
use async_trait::async_trait;
use coordinator::Coordinator;

pub struct ParallelMapReduce {
    config: JobConfig,
    mr_app: Arc<dyn MapReduceApp>,
}

#[async_trait]
impl MapReduce for ParallelMapReduce {
    fn new(config: JobConfig, mr_app: Arc<dyn MapReduceApp>) -> Self {
        Self { config, mr_app }
    }

    async fn run(self) -> Result<RunReport> {
        let coord = Coordinator::spawn(self.config, self.mr_app)?;
        Ok(coord.run().await)
    }
}
