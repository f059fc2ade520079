//! Engine configuration
//!
//! Every knob has a default so embedders can start from
//! `EngineConfig::default()` and override selectively, or load a JSON
//! file with [`EngineConfig::load`].

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// When the append-only log is synced to disk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncPolicy {
    /// Sync after every write (safest, slowest)
    Always,
    /// Sync at most once per second (balanced)
    EverySecond,
    /// Let the OS decide when to sync (fastest, least safe)
    No,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        SyncPolicy::EverySecond
    }
}

/// Role of this engine instance in replication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Accepts writes, streams committed records to followers
    Leader,
    /// Read-only; state arrives via the replication stream
    Replica,
}

impl Default for Role {
    fn default() -> Self {
        Role::Leader
    }
}

/// Full engine configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Number of independent database namespaces (indexes 0..databases)
    pub databases: usize,

    /// Directory holding the AOF segments and snapshot files
    pub data_dir: PathBuf,

    /// Whether to keep an append-only log at all
    pub aof_enabled: bool,

    /// AOF sync policy
    pub sync_policy: SyncPolicy,

    /// Replication role
    pub role: Role,

    /// Seconds between automatic snapshots (0 disables the timer;
    /// explicit snapshot requests still work)
    pub snapshot_interval_secs: u64,

    /// Milliseconds between active expiration sweeps
    pub expire_cycle_ms: u64,

    /// Keys with expiries sampled per namespace per sweep
    pub expire_sample_size: usize,

    /// Committed records kept in the in-memory replication backlog
    pub repl_backlog_capacity: usize,

    /// Per-follower buffered records before the follower is dropped
    pub follower_buffer: usize,

    /// Pending messages buffered per pub/sub subscriber
    pub pubsub_buffer: usize,

    /// Reject a whole transaction queue when any queued command fails
    /// pre-validation, instead of the default partial apply
    pub txn_abort_on_error: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            databases: 16,
            data_dir: PathBuf::from("cuprumdb-data"),
            aof_enabled: true,
            sync_policy: SyncPolicy::default(),
            role: Role::default(),
            snapshot_interval_secs: 300,
            expire_cycle_ms: 100,
            expire_sample_size: 20,
            repl_backlog_capacity: 4096,
            follower_buffer: 1024,
            pubsub_buffer: 256,
            txn_abort_on_error: false,
        }
    }
}

impl EngineConfig {
    /// Load configuration from a JSON file.
    ///
    /// Missing fields fall back to their defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let raw = fs::read_to_string(path.as_ref())?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Convenience for tests and embedded use: everything in one
    /// directory, no snapshot timer.
    pub fn in_dir<P: Into<PathBuf>>(dir: P) -> Self {
        EngineConfig {
            data_dir: dir.into(),
            snapshot_interval_secs: 0,
            ..Default::default()
        }
    }
}
