//! Reduce output artifacts
//!
//! One binary file per reduce worker: back-to-back fixed-layout pair records,
//! no header and no trailing delimiter. Readers consume until end of file.

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{MapReduceError, Result};
use crate::protocol::{Pair, RECORD_LEN};

pub const ARTIFACT_SUFFIX: &str = ".out";

pub fn artifact_path(output_dir: &Path, index: usize) -> PathBuf {
    output_dir.join(format!("reduce-{index}{ARTIFACT_SUFFIX}"))
}

pub fn read_artifact(path: &Path) -> Result<Vec<Pair>> {
    let bytes = fs::read(path)?;
    if bytes.len() % RECORD_LEN != 0 {
        return Err(MapReduceError::Artifact {
            path: path.to_path_buf(),
            reason: format!(
                "{} bytes is not a whole number of {RECORD_LEN}-byte records",
                bytes.len()
            ),
        });
    }

    bytes
        .chunks_exact(RECORD_LEN)
        .map(|record| Pair::decode(record).map_err(MapReduceError::from))
        .collect()
}

/// Merge artifacts into a text file of `key value` lines sorted by key.
///
/// Returns the number of lines written.
pub fn combine_artifacts(paths: &[PathBuf], dest: &Path) -> Result<usize> {
    let mut records = Vec::new();
    for path in paths {
        records.extend(read_artifact(path)?);
    }
    records.sort();

    let mut lines = String::new();
    for pair in &records {
        // writing into a String cannot fail
        let _ = writeln!(lines, "{} {}", pair.key(), pair.value());
    }
    fs::write(dest, lines)?;
    info!(records = records.len(), path = %dest.display(), "combined output written");

    Ok(records.len())
}
