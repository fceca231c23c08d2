//! Error types for the map/reduce pipeline
//!
//! Three layers of failure exist:
//! - `SetupError`: anything that goes wrong before workers start; fatal to the run
//! - `WorkerError`: I/O or protocol failure inside one worker; fatal to that worker only
//! - `AggregationError`: allocation failure while growing a key group in a reduce worker

use std::collections::TryReserveError;
use std::path::PathBuf;
use thiserror::Error;

/// Top-level error type for the pipeline
#[derive(Error, Debug)]
pub enum MapReduceError {
    /// Setup errors (configuration, spawn, wiring)
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    /// Worker errors surfaced by the sequential engine
    #[error("Worker error: {0}")]
    Worker(#[from] WorkerError),

    /// Pair construction or decoding errors
    #[error("Pair error: {0}")]
    Pair(#[from] PairError),

    /// Malformed reduce artifact
    #[error("Malformed artifact '{path}': {reason}")]
    Artifact { path: PathBuf, reason: String },

    /// I/O errors outside any worker
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration and wiring errors
#[derive(Error, Debug)]
pub enum SetupError {
    /// Zero-sized worker pool
    #[error("Invalid {role} worker count {count}: must be at least 1")]
    InvalidPoolSize { role: &'static str, count: usize },

    /// Zero chunk size
    #[error("Invalid chunk size {0}: must be at least 1 byte")]
    InvalidChunkSize(usize),

    /// Zero channel capacity
    #[error("Invalid channel capacity {0}: must be at least 1")]
    InvalidChannelCapacity(usize),

    /// Empty directory argument
    #[error("Directory name is empty")]
    EmptyDirectory,

    /// Directory path exceeds the path bound
    #[error("Directory name is {len} bytes, must be shorter than {max}")]
    DirectoryTooLong { len: usize, max: usize },

    /// Input path is missing or not a directory
    #[error("Not a directory: '{0}'")]
    NotADirectory(PathBuf),

    /// Output directory could not be created
    #[error("Failed to create output directory '{path}': {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The external directory lister could not be started
    #[error("Failed to spawn directory lister: {0}")]
    ListerSpawn(std::io::Error),
}

/// Errors building or decoding a fixed-layout pair record
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PairError {
    #[error("Key is {len} bytes, limit is {max}")]
    KeyTooLong { len: usize, max: usize },

    #[error("Value is {len} bytes, limit is {max}")]
    ValueTooLong { len: usize, max: usize },

    /// NUL is the record padding byte and cannot appear inside a field
    #[error("Interior NUL byte in {field}")]
    InteriorNul { field: &'static str },

    #[error("Record is {len} bytes, expected {expected}")]
    RecordLength { len: usize, expected: usize },

    #[error("Field {field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },
}

/// A key group could not grow
#[derive(Error, Debug)]
#[error("Failed to grow group for key '{key}': {source}")]
pub struct AggregationError {
    pub key: String,
    #[source]
    pub source: TryReserveError,
}

/// Failures inside a single worker
#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Failed to open '{path}': {source}")]
    Open {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to create '{path}': {source}")]
    Create {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Job function produced an invalid pair
    #[error("Protocol error: {0}")]
    Protocol(#[from] PairError),

    #[error("Aggregation error: {0}")]
    Aggregation(#[from] AggregationError),

    /// The peer end of the worker's output channel went away
    #[error("Output channel of {0} closed")]
    OutputClosed(String),

    /// The directory lister exited unsuccessfully
    #[error("Directory lister failed: {0}")]
    ListerFailed(String),
}

/// Result type alias for MapReduceError
pub type Result<T> = std::result::Result<T, MapReduceError>;
