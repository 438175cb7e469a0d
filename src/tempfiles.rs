//! Ephemeral image store.
//!
//! The recognizer consumes file paths, so every probe crop takes a detour
//! through `temp/`. Files accumulate and are swept by age; sweep failures
//! only affect disk hygiene and are never fatal.

use anyhow::{Context, Result};
use chrono::Local;
use image::RgbImage;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct TempStore {
    dir: PathBuf,
}

impl TempStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("creating temp dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write an image as `{prefix}_{timestamp}.jpg` and return its path.
    pub fn save_jpeg(&self, prefix: &str, image: &RgbImage) -> Result<PathBuf> {
        let stamp = Local::now().format("%Y%m%d_%H%M%S_%6f");
        let path = self.dir.join(format!("{}_{}.jpg", prefix, stamp));
        image
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        Ok(path)
    }

    /// Remove files older than `max_age`. Per-file failures are swallowed
    /// after a best-effort attempt; returns how many files were removed.
    pub fn sweep(&self, max_age: Duration) -> usize {
        let listing = match std::fs::read_dir(&self.dir) {
            Ok(listing) => listing,
            Err(err) => {
                log::warn!("temp sweep: cannot read {}: {}", self.dir.display(), err);
                return 0;
            }
        };

        let mut removed = 0;
        for entry in listing.flatten() {
            let path = entry.path();
            if !path.is_file() {
                continue;
            }
            let age = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .ok()
                .and_then(|modified| modified.elapsed().ok());
            if age.is_some_and(|age| age > max_age) && std::fs::remove_file(&path).is_ok() {
                removed += 1;
            }
        }

        if removed > 0 {
            log::info!("temp sweep removed {} file(s)", removed);
        }
        removed
    }
}
