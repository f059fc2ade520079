//! Engine loop and handle
//!
//! The engine runs in its own OS thread on a dedicated current-thread
//! runtime. All state lives inside the loop; callers hold an
//! [`EngineHandle`] and talk over channels. One request is fully
//! processed before the next one starts, which is the engine's whole
//! consistency story: no locks, no torn state, one total order of
//! mutations.

mod recovery;

use crate::aof::{self, LogRecord};
use crate::config::EngineConfig;
use crate::dispatch::Dispatcher;
use crate::error::EngineError;
use crate::pubsub::PubSubMessage;
use crate::repl::{SnapshotBlob, SyncStart};
use crate::reply::Reply;
use crate::snapshot::{self, SnapshotData};
use bytes::Bytes;
use std::path::Path;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{error, info, warn};

/// A request to the engine loop.
enum EngineRequest {
    Command {
        db: usize,
        name: String,
        args: Vec<Bytes>,
        reply: oneshot::Sender<Result<Reply, EngineError>>,
    },
    Batch {
        db: usize,
        queue: Vec<(String, Vec<Bytes>)>,
        reply: oneshot::Sender<Result<Vec<Result<Reply, EngineError>>, EngineError>>,
    },
    Replicate {
        record: LogRecord,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Sync {
        last: u64,
        reply: oneshot::Sender<(SyncStart, mpsc::Receiver<LogRecord>)>,
    },
    Snapshot {
        reply: oneshot::Sender<Result<u64, EngineError>>,
    },
    InstallSnapshot {
        blob: SnapshotBlob,
        reply: oneshot::Sender<Result<(), EngineError>>,
    },
    Subscribe {
        channel: Bytes,
        reply: oneshot::Sender<broadcast::Receiver<PubSubMessage>>,
    },
    Offset {
        reply: oneshot::Sender<u64>,
    },
    /// Internal: background snapshot writer finished.
    SnapshotDone { through: u64, ok: bool },
}

/// The engine. Owns nothing after spawn; it exists to package startup.
pub struct Engine;

impl Engine {
    /// Recover state from the data directory and start the engine
    /// thread. Returns a cloneable handle.
    ///
    /// Recovery errors (corrupted snapshot or log, sequence gaps)
    /// refuse startup.
    pub fn spawn(config: EngineConfig) -> anyhow::Result<EngineHandle> {
        let dispatcher = recovery::recover(&config)?;
        info!(
            sequence = dispatcher.sequence(),
            role = ?config.role,
            "engine recovered"
        );

        let (tx, rx) = mpsc::unbounded_channel();
        // the loop keeps only a weak self-sender, so dropping every
        // handle still stops the engine
        let loop_tx = tx.downgrade();
        std::thread::Builder::new()
            .name("cuprumdb-engine".to_string())
            .spawn(move || {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .expect("Failed to create engine runtime");

                runtime.block_on(run_loop(config, dispatcher, rx, loop_tx));
            })?;

        Ok(EngineHandle { tx })
    }
}

async fn run_loop(
    config: EngineConfig,
    mut dispatcher: Dispatcher,
    mut rx: mpsc::UnboundedReceiver<EngineRequest>,
    loop_tx: mpsc::WeakUnboundedSender<EngineRequest>,
) {
    let mut expire_timer =
        tokio::time::interval(Duration::from_millis(config.expire_cycle_ms.max(1)));
    expire_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    let snapshot_secs = config.snapshot_interval_secs;
    let mut snapshot_timer =
        tokio::time::interval(Duration::from_secs(snapshot_secs.max(1)));
    snapshot_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    snapshot_timer.tick().await; // intervals fire immediately once

    let mut snapshot_in_flight = false;

    loop {
        tokio::select! {
            request = rx.recv() => {
                let Some(request) = request else {
                    info!("all handles dropped, engine stopping");
                    break;
                };
                match request {
                    EngineRequest::Command { db, name, args, reply } => {
                        let result = dispatcher.execute(db, &name, args);
                        let fatal = result.as_ref().is_err_and(|e| e.is_fatal());
                        let _ = reply.send(result);
                        if fatal {
                            error!("fatal dispatch error, engine stopping");
                            break;
                        }
                    }
                    EngineRequest::Batch { db, queue, reply } => {
                        let result = dispatcher.execute_batch(db, queue);
                        let fatal = result.as_ref().is_ok_and(|results| {
                            results
                                .iter()
                                .any(|r| r.as_ref().is_err_and(|e| e.is_fatal()))
                        });
                        let _ = reply.send(result);
                        if fatal {
                            error!("fatal error inside transaction burst, engine stopping");
                            break;
                        }
                    }
                    EngineRequest::Replicate { record, reply } => {
                        let result = dispatcher.apply_replicated(record);
                        let fatal = result.as_ref().is_err_and(|e| e.is_fatal());
                        let _ = reply.send(result);
                        if fatal {
                            error!("fatal replication apply error, engine stopping");
                            break;
                        }
                    }
                    EngineRequest::Sync { last, reply } => {
                        let _ = reply.send(dispatcher.sync_follower(last));
                    }
                    EngineRequest::Snapshot { reply } => {
                        if snapshot_in_flight {
                            let _ = reply.send(Err(EngineError::BadArgument(
                                "snapshot already in progress".to_string(),
                            )));
                        } else {
                            snapshot_in_flight = true;
                            start_snapshot(&mut dispatcher, &config.data_dir, &loop_tx, Some(reply));
                        }
                    }
                    EngineRequest::InstallSnapshot { blob, reply } => {
                        let result = install_resync(&mut dispatcher, &config.data_dir, blob);
                        let _ = reply.send(result);
                    }
                    EngineRequest::Subscribe { channel, reply } => {
                        let _ = reply.send(dispatcher.subscribe(channel));
                    }
                    EngineRequest::Offset { reply } => {
                        let _ = reply.send(dispatcher.sequence());
                    }
                    EngineRequest::SnapshotDone { through, ok } => {
                        snapshot_in_flight = false;
                        if ok {
                            compact(&config.data_dir, through);
                        }
                    }
                }
            }
            _ = expire_timer.tick() => {
                if let Err(err) = dispatcher.sweep_expired() {
                    error!(error = %err, "expiration sweep could not commit, engine stopping");
                    break;
                }
            }
            _ = snapshot_timer.tick(), if snapshot_secs > 0 && !snapshot_in_flight => {
                snapshot_in_flight = true;
                start_snapshot(&mut dispatcher, &config.data_dir, &loop_tx, None);
            }
        }
    }
}

/// Install a full-resync snapshot from the leader.
///
/// The blob replaces the entire local history, on disk as well as in
/// memory: stale snapshot and segment files are removed, the new
/// snapshot is made durable, and only then is state swapped in (which
/// also rotates the log to a fresh segment at `sequence + 1`). A
/// restart afterwards recovers from snapshot N plus the fresh tail. A
/// crash mid-wipe leaves an empty data dir, which re-handshakes into
/// another full resync.
fn install_resync(
    dispatcher: &mut Dispatcher,
    data_dir: &Path,
    blob: SnapshotBlob,
) -> Result<(), EngineError> {
    let data = SnapshotData::decode(&blob.bytes).map_err(EngineError::Replication)?;
    for (_, path) in snapshot::snapshot_files(data_dir).map_err(EngineError::Durability)? {
        std::fs::remove_file(path).map_err(EngineError::Durability)?;
    }
    aof::remove_segments_through(data_dir, u64::MAX).map_err(EngineError::Durability)?;
    snapshot::write_file(data_dir, &data).map_err(EngineError::Durability)?;
    dispatcher.install_snapshot(data)
}

/// Capture in-loop (cheap, reference-counted clones), then encode and
/// write on the blocking pool so the loop keeps serving.
fn start_snapshot(
    dispatcher: &mut Dispatcher,
    data_dir: &Path,
    loop_tx: &mpsc::WeakUnboundedSender<EngineRequest>,
    reply: Option<oneshot::Sender<Result<u64, EngineError>>>,
) {
    let done = |through, ok| {
        if let Some(tx) = loop_tx.upgrade() {
            let _ = tx.send(EngineRequest::SnapshotDone { through, ok });
        }
    };
    let data = match dispatcher.capture_snapshot() {
        Ok(data) => data,
        Err(err) => {
            warn!(error = %err, "snapshot capture failed");
            if let Some(reply) = reply {
                let _ = reply.send(Err(err));
            }
            done(0, false);
            return;
        }
    };
    let through = data.sequence;
    let dir = data_dir.to_path_buf();
    let done_tx = loop_tx.clone();

    tokio::task::spawn_blocking(move || {
        let result = snapshot::write_file(&dir, &data);
        let ok = result.is_ok();
        match result {
            Ok(path) => {
                info!(sequence = through, path = %path.display(), "snapshot written");
                if let Some(reply) = reply {
                    let _ = reply.send(Ok(through));
                }
            }
            Err(err) => {
                error!(error = %err, "snapshot write failed");
                if let Some(reply) = reply {
                    let _ = reply.send(Err(EngineError::Durability(err)));
                }
            }
        }
        if let Some(tx) = done_tx.upgrade() {
            let _ = tx.send(EngineRequest::SnapshotDone { through, ok });
        }
    });
}

/// Drop log segments fully covered by a durable snapshot, and older
/// snapshots made redundant by it.
fn compact(dir: &Path, through: u64) {
    match aof::remove_segments_through(dir, through) {
        Ok(removed) if removed > 0 => info!(removed, through, "log segments compacted"),
        Ok(_) => {}
        Err(err) => warn!(error = %err, "log compaction failed"),
    }
    if let Err(err) = snapshot::prune_older(dir, through) {
        warn!(error = %err, "snapshot pruning failed");
    }
}

/// Cloneable handle to a running engine.
#[derive(Clone)]
pub struct EngineHandle {
    tx: mpsc::UnboundedSender<EngineRequest>,
}

impl EngineHandle {
    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> EngineRequest,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.tx.send(build(tx)).map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)
    }

    /// Execute one command.
    pub async fn execute(
        &self,
        db: usize,
        name: impl Into<String>,
        args: Vec<Bytes>,
    ) -> Result<Reply, EngineError> {
        let name = name.into();
        self.request(|reply| EngineRequest::Command { db, name, args, reply })
            .await?
    }

    /// Execute a transaction queue as one burst. See
    /// [`crate::txn::TxnSession`] for the queuing side.
    pub async fn execute_batch(
        &self,
        db: usize,
        queue: Vec<(String, Vec<Bytes>)>,
    ) -> Result<Vec<Result<Reply, EngineError>>, EngineError> {
        self.request(|reply| EngineRequest::Batch { db, queue, reply })
            .await?
    }

    /// Apply a leader record on this replica.
    pub async fn replicate(&self, record: LogRecord) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::Replicate { record, reply })
            .await?
    }

    /// Follower handshake: attach to this leader's stream after `last`.
    pub async fn sync(
        &self,
        last: u64,
    ) -> Result<(SyncStart, mpsc::Receiver<LogRecord>), EngineError> {
        self.request(|reply| EngineRequest::Sync { last, reply }).await
    }

    /// Trigger a snapshot now. Resolves with the snapshot's sequence
    /// once it is durable on disk.
    pub async fn snapshot(&self) -> Result<u64, EngineError> {
        self.request(|reply| EngineRequest::Snapshot { reply }).await?
    }

    /// Replace all state with an encoded snapshot (full resync).
    pub async fn install_snapshot(&self, blob: SnapshotBlob) -> Result<(), EngineError> {
        self.request(|reply| EngineRequest::InstallSnapshot { blob, reply })
            .await?
    }

    /// Subscribe to a pub/sub channel.
    pub async fn subscribe(
        &self,
        channel: impl Into<Bytes>,
    ) -> Result<broadcast::Receiver<PubSubMessage>, EngineError> {
        let channel = channel.into();
        self.request(|reply| EngineRequest::Subscribe { channel, reply })
            .await
    }

    /// Sequence of the last committed record.
    pub async fn offset(&self) -> Result<u64, EngineError> {
        self.request(|reply| EngineRequest::Offset { reply }).await
    }
}
