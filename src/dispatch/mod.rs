//! Command dispatcher
//!
//! Owns the stores, the registry and the commit pipeline. Every
//! mutation funnels through here, in one total order: validate,
//! execute, then commit (sequence, append-only log, backlog, follower
//! fan-out). A command that cannot be made durable is not acknowledged
//! and is not forwarded.
//!
//! The dispatcher is single-threaded by design; the engine loop owns it
//! and serializes all access.

use crate::aof::{AofWriter, LogRecord};
use crate::commands::{CommandContext, CommandRegistry, Propagate};
use crate::config::{EngineConfig, Role};
use crate::error::EngineError;
use crate::expire;
use crate::pubsub::PubSubMessage;
use crate::repl::{FollowerSlot, ReplBacklog, SnapshotBlob, SyncStart};
use crate::reply::Reply;
use crate::snapshot::SnapshotData;
use crate::store::MemoryStore;
use crate::time::now_ms;
use bytes::Bytes;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, warn};

/// Where a command comes from. Decides write admission and whether the
/// command is assigned a fresh sequence number or carries one already.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Live client request
    Client,
    /// Startup replay from the local log
    Replay,
    /// Record forwarded by the leader
    Replication,
}

/// The single writer of engine state.
pub struct Dispatcher {
    registry: CommandRegistry,
    context: CommandContext,
    role: Role,
    /// Sequence of the last committed record. Strictly increasing,
    /// gap-free.
    sequence: u64,
    aof: Option<AofWriter>,
    backlog: ReplBacklog,
    followers: Vec<FollowerSlot>,
    follower_buffer: usize,
    expire_sample_size: usize,
    txn_abort_on_error: bool,
}

impl Dispatcher {
    pub fn new(config: &EngineConfig) -> Self {
        Dispatcher {
            registry: CommandRegistry::new(),
            context: CommandContext::new(config.databases, config.pubsub_buffer),
            role: config.role,
            sequence: 0,
            aof: None,
            backlog: ReplBacklog::new(config.repl_backlog_capacity),
            followers: Vec::new(),
            follower_buffer: config.follower_buffer,
            expire_sample_size: config.expire_sample_size,
            txn_abort_on_error: config.txn_abort_on_error,
        }
    }

    /// Attach the append-only writer. Done after recovery so replayed
    /// records are not re-appended.
    pub fn attach_aof(&mut self, writer: AofWriter) {
        self.aof = Some(writer);
    }

    /// Sequence of the last committed record.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Execute a live client command.
    pub fn execute(
        &mut self,
        db: usize,
        name: &str,
        args: Vec<Bytes>,
    ) -> Result<Reply, EngineError> {
        let outcome = self.run(Origin::Client, db, name, &args);
        // lazy expirations observed during this command become explicit
        // DELs in the log, before the command's own record
        self.flush_reaped()?;

        match outcome {
            Ok(reply) => {
                match std::mem::replace(&mut self.context.propagate, Propagate::Verbatim) {
                    Propagate::Verbatim if self.wrote(name) => {
                        self.commit(db as u32, &name.to_uppercase(), args)?;
                    }
                    Propagate::As(logged_name, logged_args) => {
                        self.commit(db as u32, logged_name, logged_args)?;
                    }
                    _ => {}
                }
                Ok(reply)
            }
            Err(err) => Err(err),
        }
    }

    /// Execute a transaction queue as one uninterrupted burst.
    ///
    /// Default mode applies every command and reports per-command
    /// results; `txn_abort_on_error` instead rejects the whole queue if
    /// any command fails static validation (unknown name, arity, write
    /// against a replica).
    pub fn execute_batch(
        &mut self,
        db: usize,
        queue: Vec<(String, Vec<Bytes>)>,
    ) -> Result<Vec<Result<Reply, EngineError>>, EngineError> {
        if self.txn_abort_on_error {
            for (name, args) in &queue {
                self.validate(Origin::Client, db, name, args)?;
            }
        }
        let mut results = Vec::with_capacity(queue.len());
        for (name, args) in queue {
            results.push(self.execute(db, &name, args));
        }
        Ok(results)
    }

    /// Apply a record forwarded by the leader.
    ///
    /// The record keeps its leader-assigned sequence; any discontinuity
    /// is reported so the follower can request a full resync.
    pub fn apply_replicated(&mut self, record: LogRecord) -> Result<(), EngineError> {
        if record.sequence != self.sequence + 1 {
            return Err(EngineError::ReplicationGap {
                expected: self.sequence + 1,
                got: record.sequence,
            });
        }
        if let Err(err) = self.run(Origin::Replication, record.db as usize, &record.name, &record.args) {
            // records replay deterministically; an error here means the
            // replica diverged from the leader
            return Err(EngineError::Replication(format!(
                "record {} ({}) failed on replica: {}",
                record.sequence, record.name, err
            )));
        }
        self.discard_reaped();

        if let Some(aof) = self.aof.as_mut() {
            aof.append(&record).map_err(EngineError::Durability)?;
        }
        self.sequence = record.sequence;
        Ok(())
    }

    /// Apply a record during startup replay. Continuity is strict: a
    /// log with holes refuses startup instead of serving partial state.
    pub fn apply_replay(&mut self, record: LogRecord) -> Result<(), EngineError> {
        if record.sequence != self.sequence + 1 {
            return Err(EngineError::Recovery(format!(
                "log gap: expected sequence {}, found {}",
                self.sequence + 1,
                record.sequence
            )));
        }
        if let Err(err) = self.run(Origin::Replay, record.db as usize, &record.name, &record.args) {
            return Err(EngineError::Recovery(format!(
                "record {} ({}) failed to apply: {}",
                record.sequence, record.name, err
            )));
        }
        self.discard_reaped();
        self.sequence = record.sequence;
        Ok(())
    }

    /// One active expiration cycle: sample, delete, log the deletions.
    /// Replicas skip this; their deletions arrive from the leader.
    pub fn sweep_expired(&mut self) -> Result<usize, EngineError> {
        if self.role == Role::Replica {
            return Ok(0);
        }
        let now = now_ms();
        let due = expire::sweep(self.context.dbs_mut(), now, self.expire_sample_size);
        let count = due.len();
        for (db, key) in due {
            // delete() routes the expired key through the reap list
            let _ = self.context.db_mut(db).delete(&key, now);
        }
        self.flush_reaped()?;
        if count > 0 {
            debug!(count, "active expiration cycle");
        }
        Ok(count)
    }

    /// Answer a follower handshake.
    ///
    /// Continuity is granted only when the backlog still holds every
    /// record after the follower's offset and they fit its buffer;
    /// everything else gets a snapshot.
    pub fn sync_follower(&mut self, last: u64) -> (SyncStart, mpsc::Receiver<LogRecord>) {
        let (slot, rx) = FollowerSlot::new(self.follower_buffer);

        if last == self.sequence {
            self.followers.push(slot);
            return (SyncStart::Continue, rx);
        }

        if last < self.sequence && self.backlog.covers(last) {
            let missing = self.backlog.since(last);
            if missing.len() as u64 == self.sequence - last {
                let mut fed = true;
                for record in missing {
                    if !slot.forward(record) {
                        fed = false;
                        break;
                    }
                }
                if fed {
                    debug!(last, "partial resync granted");
                    self.followers.push(slot);
                    return (SyncStart::Continue, rx);
                }
            }
        }

        // first contact, fallen off the backlog, or ahead of us
        let (slot, rx) = FollowerSlot::new(self.follower_buffer);
        let data = SnapshotData::capture(self.context.dbs(), self.sequence, now_ms());
        let blob = SnapshotBlob {
            sequence: self.sequence,
            bytes: Bytes::from(data.encode()),
        };
        debug!(last, sequence = self.sequence, "full resync");
        self.followers.push(slot);
        (SyncStart::FullResync(blob), rx)
    }

    /// Capture a snapshot of current state and rotate the log so the
    /// new segment starts right after it. Capture clones are
    /// reference-counted; encoding and disk writes happen off-loop.
    pub fn capture_snapshot(&mut self) -> Result<SnapshotData, EngineError> {
        let data = SnapshotData::capture(self.context.dbs(), self.sequence, now_ms());
        if let Some(aof) = self.aof.as_mut() {
            aof.rotate(self.sequence + 1)
                .map_err(EngineError::Durability)?;
        }
        Ok(data)
    }

    /// Replace all state with a snapshot (full resync on a follower).
    pub fn install_snapshot(&mut self, data: SnapshotData) -> Result<(), EngineError> {
        let count = self.context.database_count().max(data.dbs.len());
        let mut dbs: Vec<MemoryStore> = (0..count).map(|_| MemoryStore::new()).collect();
        for (index, pairs) in data.dbs.into_iter().enumerate() {
            for (key, entry) in pairs {
                dbs[index].install(key, entry);
            }
        }
        self.context.replace_dbs(dbs);
        self.sequence = data.sequence;
        if let Some(aof) = self.aof.as_mut() {
            aof.rotate(data.sequence + 1)
                .map_err(EngineError::Durability)?;
        }
        Ok(())
    }

    /// Subscribe to a pub/sub channel.
    pub fn subscribe(&mut self, channel: Bytes) -> broadcast::Receiver<PubSubMessage> {
        self.context.pubsub.subscribe(channel)
    }

    /// Read-only view of all namespaces.
    pub fn stores(&self) -> &[MemoryStore] {
        self.context.dbs()
    }

    fn validate(
        &self,
        origin: Origin,
        db: usize,
        name: &str,
        args: &[Bytes],
    ) -> Result<(), EngineError> {
        if db >= self.context.database_count() {
            return Err(EngineError::InvalidDatabase(db));
        }
        let command = self
            .registry
            .get(name)
            .ok_or_else(|| EngineError::UnknownCommand(name.to_string()))?;
        if args.len() < command.min_args() {
            return Err(EngineError::Arity(command.name().to_string()));
        }
        if let Some(max) = command.max_args() {
            if args.len() > max {
                return Err(EngineError::Arity(command.name().to_string()));
            }
        }
        if origin == Origin::Client && command.writes() && self.role == Role::Replica {
            return Err(EngineError::ReadOnlyReplica);
        }
        Ok(())
    }

    fn run(
        &mut self,
        origin: Origin,
        db: usize,
        name: &str,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        self.validate(origin, db, name, args)?;
        let command = self
            .registry
            .get(name)
            .ok_or_else(|| EngineError::UnknownCommand(name.to_string()))?;
        self.context.now = now_ms();
        self.context.propagate = Propagate::Verbatim;
        command.execute(&mut self.context, db, args)
    }

    fn wrote(&self, name: &str) -> bool {
        self.registry
            .get(name)
            .map(|command| command.writes())
            .unwrap_or(false)
    }

    /// Commit one record: next sequence, durable append, backlog,
    /// follower fan-out. On append failure the sequence is not
    /// advanced and nothing is forwarded.
    fn commit(
        &mut self,
        db: u32,
        name: impl Into<String>,
        args: Vec<Bytes>,
    ) -> Result<(), EngineError> {
        let record = LogRecord::new(self.sequence + 1, db, name, args);
        if let Some(aof) = self.aof.as_mut() {
            aof.append(&record).map_err(EngineError::Durability)?;
        }
        self.sequence = record.sequence;
        let before = self.followers.len();
        self.followers.retain(|slot| slot.forward(record.clone()));
        if self.followers.len() < before {
            warn!(
                detached = before - self.followers.len(),
                "slow followers detached"
            );
        }
        self.backlog.push(record);
        Ok(())
    }

    /// Turn lazily reaped keys into explicit DEL records.
    fn flush_reaped(&mut self) -> Result<(), EngineError> {
        if self.role == Role::Replica {
            self.discard_reaped();
            return Ok(());
        }
        for db in 0..self.context.database_count() {
            for key in self.context.db_mut(db).take_reaped() {
                self.commit(db as u32, "DEL", vec![key])?;
            }
        }
        Ok(())
    }

    /// Replicas and replay drop reap notes; their DELs come from the
    /// leader's log.
    fn discard_reaped(&mut self) {
        for db in 0..self.context.database_count() {
            let _ = self.context.db_mut(db).take_reaped();
        }
    }
}
