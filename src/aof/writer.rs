//! AOF segment writer
//!
//! Owned exclusively by the dispatcher inside the engine loop, so no
//! locking. Durability precedes acknowledgment: `append` returns only
//! after the bytes are written (and synced, under the `Always` policy).

use super::{segment_name, LogRecord};
use crate::config::SyncPolicy;
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::debug;

/// Appends records to the active segment file.
pub struct AofWriter {
    dir: PathBuf,
    file: File,
    /// Starting sequence of the active segment
    start: u64,
    sync_policy: SyncPolicy,
    last_sync: Instant,
}

impl AofWriter {
    /// Open (or create) the segment starting at `start` in `dir`.
    pub fn open(dir: &Path, start: u64, sync_policy: SyncPolicy) -> io::Result<Self> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(segment_name(start));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        debug!("AOF segment opened at {:?}", path);

        Ok(AofWriter {
            dir: dir.to_path_buf(),
            file,
            start,
            sync_policy,
            last_sync: Instant::now(),
        })
    }

    /// Append a record and apply the sync policy.
    pub fn append(&mut self, record: &LogRecord) -> io::Result<()> {
        let bytes = record.to_bytes();
        self.file.write_all(&bytes)?;

        match self.sync_policy {
            SyncPolicy::Always => {
                self.file.sync_data()?;
                self.last_sync = Instant::now();
            }
            SyncPolicy::EverySecond => {
                if self.last_sync.elapsed() >= Duration::from_secs(1) {
                    self.file.sync_data()?;
                    self.last_sync = Instant::now();
                }
            }
            SyncPolicy::No => {}
        }

        Ok(())
    }

    /// Close the active segment and start a new one at `next_start`.
    /// Called at snapshot capture so older segments become compactable.
    pub fn rotate(&mut self, next_start: u64) -> io::Result<()> {
        self.file.sync_all()?;
        let path = self.dir.join(segment_name(next_start));
        self.file = OpenOptions::new().create(true).append(true).open(&path)?;
        self.start = next_start;
        debug!("AOF rotated to segment starting at {}", next_start);
        Ok(())
    }

    /// Force a sync to disk.
    pub fn sync(&mut self) -> io::Result<()> {
        self.file.sync_all()?;
        self.last_sync = Instant::now();
        Ok(())
    }

    /// Starting sequence of the active segment.
    pub fn segment_start(&self) -> u64 {
        self.start
    }
}
