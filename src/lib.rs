//! mr-pipeline - single-machine MapReduce over worker pools
//!
//! A coordinator lists an input directory, deals the filenames round-robin
//! to a pool of map workers, fans their pairs back in concurrently, routes
//! each pair by key to one of a pool of reduce workers, and waits for every
//! worker to finish. Each reduce worker writes one binary artifact with one
//! record per key it owns.
//!
//! Workers are tokio tasks; every link between the coordinator and a worker
//! is a dedicated bounded channel, and closing a channel is how end-of-input
//! is signalled.

pub mod artifact;
pub mod common;
pub mod config;
pub mod error;
pub mod map_reduce_apps;
pub mod map_reduce_seq;
pub mod mr_parallel;
pub mod multimap;
pub mod protocol;

pub use common::{MapReduce, MapReduceApp, Phase, RunReport};
pub use config::{CliArgs, JobConfig, ListerKind};
pub use error::{MapReduceError, Result};
pub use map_reduce_apps::WordCount;
pub use map_reduce_seq::SequentialMapReduce;
pub use mr_parallel::coordinator::Coordinator;
pub use mr_parallel::ParallelMapReduce;
pub use protocol::{partition, Pair};
