//! Command-line arguments and validated job configuration

use std::path::{PathBuf, MAIN_SEPARATOR};

use clap::{Parser, ValueEnum};

use crate::error::SetupError;
use crate::protocol::MAX_PATH_LEN;

pub const DEFAULT_MAP_WORKERS: usize = 2;
pub const DEFAULT_REDUCE_WORKERS: usize = 2;
pub const DEFAULT_CHUNK_SIZE: usize = 4096;
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;

/// Where the list of input filenames comes from
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListerKind {
    /// Read the directory in-process
    #[default]
    ReadDir,
    /// Run `ls -1p` as a child process and read its stdout
    Ls,
}

/// Word count over a directory with pools of map and reduce workers
#[derive(Parser, Debug, Clone)]
#[command(
    name = "mr-pipeline",
    version,
    about = "Word count over a directory with pools of map and reduce workers",
    override_usage = "mr-pipeline -d <DIRNAME> [-m <NUMPROCS>] [-r <NUMPROCS>] [OPTIONS]"
)]
pub struct CliArgs {
    /// Input directory (non-recursive)
    #[arg(short = 'd', long = "dir", value_name = "DIRNAME")]
    pub dir: String,

    /// Number of map workers
    #[arg(
        short = 'm',
        long = "map-workers",
        value_name = "NUMPROCS",
        default_value_t = DEFAULT_MAP_WORKERS,
        value_parser = parse_positive
    )]
    pub map_workers: usize,

    /// Number of reduce workers
    #[arg(
        short = 'r',
        long = "reduce-workers",
        value_name = "NUMPROCS",
        default_value_t = DEFAULT_REDUCE_WORKERS,
        value_parser = parse_positive
    )]
    pub reduce_workers: usize,

    /// Directory receiving one reduce-<i>.out artifact per reduce worker
    #[arg(short = 'o', long, default_value = ".", value_name = "DIR")]
    pub output_dir: PathBuf,

    /// Bytes handed to the map function per call
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE, value_name = "BYTES", value_parser = parse_positive)]
    pub chunk_size: usize,

    /// Messages buffered per channel before the sender blocks
    #[arg(long, default_value_t = DEFAULT_CHANNEL_CAPACITY, value_name = "NUM", value_parser = parse_positive)]
    pub channel_capacity: usize,

    /// Directory listing source
    #[arg(long, value_enum, default_value_t = ListerKind::ReadDir)]
    pub lister: ListerKind,

    /// Run everything in a single task instead of worker pools
    #[arg(long)]
    pub sequential: bool,

    /// Merge all artifacts into a sorted "key value" text file
    #[arg(long, value_name = "FILE")]
    pub combine: Option<PathBuf>,

    /// Debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,
}

fn parse_positive(s: &str) -> Result<usize, String> {
    let n: usize = s.parse().map_err(|_| format!("'{s}' is not a number"))?;
    if n == 0 {
        return Err("must be at least 1".to_string());
    }
    Ok(n)
}

/// Append a trailing separator if missing.
pub fn normalize_dir(dir: &str) -> String {
    if dir.ends_with(MAIN_SEPARATOR) || dir.ends_with('/') {
        dir.to_string()
    } else {
        format!("{dir}{MAIN_SEPARATOR}")
    }
}

/// Validated runtime configuration
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub dir: PathBuf,
    pub map_workers: usize,
    pub reduce_workers: usize,
    pub output_dir: PathBuf,
    pub chunk_size: usize,
    pub channel_capacity: usize,
    pub lister: ListerKind,
}

impl JobConfig {
    /// Defaults for everything but the input directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            map_workers: DEFAULT_MAP_WORKERS,
            reduce_workers: DEFAULT_REDUCE_WORKERS,
            output_dir: PathBuf::from("."),
            chunk_size: DEFAULT_CHUNK_SIZE,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            lister: ListerKind::ReadDir,
        }
    }

    pub fn from_args(args: &CliArgs) -> Result<Self, SetupError> {
        if args.dir.is_empty() {
            return Err(SetupError::EmptyDirectory);
        }
        if args.dir.len() >= MAX_PATH_LEN {
            return Err(SetupError::DirectoryTooLong {
                len: args.dir.len(),
                max: MAX_PATH_LEN,
            });
        }

        let config = Self {
            dir: PathBuf::from(normalize_dir(&args.dir)),
            map_workers: args.map_workers,
            reduce_workers: args.reduce_workers,
            output_dir: args.output_dir.clone(),
            chunk_size: args.chunk_size,
            channel_capacity: args.channel_capacity,
            lister: args.lister,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn with_map_workers(mut self, n: usize) -> Self {
        self.map_workers = n;
        self
    }

    pub fn with_reduce_workers(mut self, n: usize) -> Self {
        self.reduce_workers = n;
        self
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    pub fn with_chunk_size(mut self, bytes: usize) -> Self {
        self.chunk_size = bytes;
        self
    }

    pub fn with_channel_capacity(mut self, capacity: usize) -> Self {
        self.channel_capacity = capacity;
        self
    }

    pub fn with_lister(mut self, lister: ListerKind) -> Self {
        self.lister = lister;
        self
    }

    pub fn validate(&self) -> Result<(), SetupError> {
        if self.map_workers == 0 {
            return Err(SetupError::InvalidPoolSize {
                role: "map",
                count: 0,
            });
        }
        if self.reduce_workers == 0 {
            return Err(SetupError::InvalidPoolSize {
                role: "reduce",
                count: 0,
            });
        }
        if self.chunk_size == 0 {
            return Err(SetupError::InvalidChunkSize(0));
        }
        if self.channel_capacity == 0 {
            return Err(SetupError::InvalidChannelCapacity(0));
        }
        let len = self.dir.as_os_str().len();
        if len == 0 {
            return Err(SetupError::EmptyDirectory);
        }
        if len >= MAX_PATH_LEN {
            return Err(SetupError::DirectoryTooLong {
                len,
                max: MAX_PATH_LEN,
            });
        }
        Ok(())
    }
}
