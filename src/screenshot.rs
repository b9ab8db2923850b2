//! Diagnostic screenshots saved next to the logs

use std::fs;
use std::path::{Path, PathBuf};

use chrono::Local;
use tracing::{debug, warn};

use crate::driver::Driver;

/// Writes PNG captures into a directory
#[derive(Clone, Debug)]
pub struct Screenshots {
    dir: PathBuf,
}

impl Screenshots {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Capture the current viewport. Failures are logged and swallowed so a
    /// dead browser never hides the error that prompted the capture.
    pub async fn capture<D: Driver + ?Sized>(&self, driver: &mut D, reason: &str) -> Option<PathBuf> {
        let bytes = match driver.screenshot().await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Could not take screenshot for '{}': {}", reason, e);
                return None;
            }
        };

        let path = self.dir.join(file_name(reason));
        let written = fs::create_dir_all(&self.dir).and_then(|_| fs::write(&path, bytes));
        match written {
            Ok(()) => {
                debug!("Screenshot saved to {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("Could not write screenshot {}: {}", path.display(), e);
                None
            }
        }
    }
}

fn file_name(reason: &str) -> String {
    let mut slug: String = reason
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_lowercase() } else { '_' })
        .collect();
    slug.truncate(80);
    let slug = slug.trim_matches('_');
    let slug = if slug.is_empty() { "screenshot" } else { slug };
    format!("{}_{}.png", Local::now().format("%Y%m%d_%H%M%S%3f"), slug)
}
