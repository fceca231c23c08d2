//! Directory listing collaborators
//!
//! Both listers stream newline-free relative filenames over a bounded channel
//! and close it when the listing is complete. The `ls` variant runs an
//! external process and is reaped like any other worker.

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_channel::Sender;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::ListerKind;
use crate::error::{SetupError, WorkerError};
use crate::mr_parallel::worker_pool::{WorkerHandle, WorkerKind, WorkerStats};

/// Lister handle: no input, filenames as output
pub type ListerHandle = WorkerHandle<(), String>;

pub fn spawn_lister(
    kind: ListerKind,
    dir: &Path,
    capacity: usize,
) -> Result<ListerHandle, SetupError> {
    let (tx, rx) = async_channel::bounded(capacity);

    let task = match kind {
        ListerKind::ReadDir => {
            let dir = dir.to_path_buf();
            tokio::spawn(async move { list_read_dir(dir, tx).await })
        }
        ListerKind::Ls => {
            let mut child = Command::new("ls")
                .arg("-1p")
                .arg(dir)
                .stdout(Stdio::piped())
                .stdin(Stdio::null())
                .kill_on_drop(true)
                .spawn()
                .map_err(SetupError::ListerSpawn)?;
            let stdout = child.stdout.take().ok_or_else(|| {
                SetupError::ListerSpawn(std::io::Error::other("ls stdout not captured"))
            })?;

            tokio::spawn(async move {
                let mut stats = WorkerStats::default();
                let mut lines = BufReader::new(stdout).split(b'\n');
                loop {
                    let line = lines.next_segment().await.map_err(|source| WorkerError::Read {
                        path: PathBuf::from("ls stdout"),
                        source,
                    })?;
                    let Some(line) = line else { break };
                    // -p marks directories with a trailing slash
                    if line.is_empty() || line.ends_with(b"/") {
                        continue;
                    }
                    let name = match String::from_utf8(line) {
                        Ok(name) => name,
                        Err(err) => {
                            let lossy = String::from_utf8_lossy(err.as_bytes());
                            warn!(name = %lossy, "skipping non-UTF-8 filename");
                            stats.skipped += 1;
                            continue;
                        }
                    };
                    if tx.send(name).await.is_err() {
                        break;
                    }
                    stats.files += 1;
                }
                drop(tx);
                // stop reading so an abandoned ls gets EPIPE instead of blocking
                drop(lines);

                let status = child.wait().await.map_err(|source| WorkerError::Read {
                    path: PathBuf::from("ls"),
                    source,
                })?;
                if !status.success() {
                    return Err(WorkerError::ListerFailed(status.to_string()));
                }
                Ok::<_, WorkerError>(stats)
            })
        }
    };

    debug!(lister = ?kind, dir = %dir.display(), "lister started");
    Ok(WorkerHandle::new(WorkerKind::Lister, 0, None, Some(rx), task))
}

async fn list_read_dir(dir: PathBuf, tx: Sender<String>) -> Result<WorkerStats, WorkerError> {
    let listing = list_dir(&dir).await?;
    let mut stats = WorkerStats {
        skipped: listing.skipped,
        ..Default::default()
    };
    for name in listing.names {
        if tx.send(name).await.is_err() {
            break;
        }
        stats.files += 1;
    }
    Ok(stats)
}

/// Regular files directly under a directory
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DirListing {
    /// Sorted by name
    pub names: Vec<String>,
    /// Regular files whose names are not valid UTF-8
    pub skipped: u64,
}

/// List the regular files directly under `dir`, following symlinks.
///
/// Names that are not valid UTF-8 cannot travel as filename messages; they
/// are counted in [`DirListing::skipped`] instead.
pub async fn list_dir(dir: &Path) -> Result<DirListing, WorkerError> {
    let read_err = |source| WorkerError::Read {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(read_err)?;
    let mut listing = DirListing::default();
    while let Some(entry) = entries.next_entry().await.map_err(read_err)? {
        match tokio::fs::metadata(entry.path()).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => continue,
            Err(err) => {
                // dangling symlink or an entry removed mid-listing
                debug!(path = %entry.path().display(), error = %err, "skipping unreadable entry");
                continue;
            }
        }
        match entry.file_name().into_string() {
            Ok(name) => listing.names.push(name),
            Err(name) => {
                warn!(name = ?name, "skipping non-UTF-8 filename");
                listing.skipped += 1;
            }
        }
    }
    listing.names.sort();
    Ok(listing)
}
