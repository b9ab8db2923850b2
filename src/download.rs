//! Filesystem polling for browser downloads.
//!
//! Unlike the DOM waits, a download that never finishes is an error.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::time::{Instant, sleep};
use tracing::{error, info};

use crate::errors::{Error, Result};
use crate::types::WaitOutcome;

/// Default bound for download completion
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(500);

const SAMPLE_INTERVAL: Duration = Duration::from_secs(1);
const PARTIAL_SUFFIXES: [&str; 2] = [".part", ".crdownload"];

/// File a download is expected to produce
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DownloadTarget {
    /// A file whose name ends with this path's file name, in its parent directory
    File(PathBuf),
    /// Any file in `dir` whose name ends with `suffix`
    Suffix { dir: PathBuf, suffix: String },
}

impl DownloadTarget {
    fn dir(&self) -> &Path {
        match self {
            DownloadTarget::File(path) => path.parent().unwrap_or_else(|| Path::new(".")),
            DownloadTarget::Suffix { dir, .. } => dir,
        }
    }

    fn matches(&self, name: &str) -> bool {
        match self {
            DownloadTarget::File(path) => path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|wanted| name.ends_with(wanted)),
            DownloadTarget::Suffix { suffix, .. } => name.ends_with(suffix.as_str()),
        }
    }
}

/// Wait until the target file exists, no partial downloads remain next to
/// it, and its size is non-zero and unchanged over one sample interval.
pub async fn wait_for_download(target: &DownloadTarget, timeout: Duration) -> Result<PathBuf> {
    let start = Instant::now();
    let dir = target.dir();

    while start.elapsed() < timeout {
        let names = file_names(dir);
        if names.iter().any(|name| is_partial(name)) {
            sleep(SAMPLE_INTERVAL).await;
            continue;
        }

        if let Some(name) = names.iter().find(|name| target.matches(name)) {
            let path = dir.join(name);
            while start.elapsed() < timeout {
                let initial = file_size(&path);
                sleep(SAMPLE_INTERVAL).await;
                let current = file_size(&path);
                if current != 0 && current == initial {
                    info!("Download complete: {} ({} bytes)", path.display(), current);
                    return Ok(path);
                }
            }
        }
        sleep(SAMPLE_INTERVAL).await;
    }

    let err = Error::DownloadTimeout(timeout);
    error!("{}", err);
    Err(err)
}

/// Soft wait for a path to exist
pub async fn wait_file_presence(path: &Path, timeout: Duration, interval: Duration) -> WaitOutcome {
    let start = Instant::now();
    loop {
        if path.exists() {
            return WaitOutcome::Satisfied;
        }
        let elapsed = start.elapsed();
        if elapsed >= timeout {
            error!(
                "* {} not appear within {} seconds!",
                path.display(),
                timeout.as_secs_f64()
            );
            return WaitOutcome::TimedOut { waited: elapsed };
        }
        sleep(interval.min(timeout - elapsed)).await;
    }
}

/// Rename `path` to `<stem>_<stamp>.<ext>` in place
pub fn add_timestamp(path: &Path, stamp: &str) -> Result<PathBuf> {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let name = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}_{}.{}", stem, stamp, ext),
        None => format!("{}_{}", stem, stamp),
    };
    let renamed = path.with_file_name(name);
    fs::rename(path, &renamed)?;
    Ok(renamed)
}

fn is_partial(name: &str) -> bool {
    PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn file_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    names.sort();
    names
}

fn file_size(path: &Path) -> u64 {
    fs::metadata(path).map(|meta| meta.len()).unwrap_or(0)
}
