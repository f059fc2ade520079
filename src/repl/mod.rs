//! Leader/follower replication
//!
//! The leader forwards every committed record, in sequence order, to
//! each attached follower. A follower that can prove continuity (its
//! last applied sequence is still covered by the leader's backlog)
//! resumes with a partial stream; anything else gets a full resync from
//! an encoded snapshot. Replication is asynchronous: commands are
//! acknowledged after local durability, not after follower delivery.

mod backlog;
mod follower;

pub use backlog::ReplBacklog;
pub use follower::run_follower;

use crate::aof::LogRecord;
use bytes::Bytes;
use tokio::sync::mpsc;
use tracing::warn;

/// Encoded snapshot handed to a follower for full resync.
#[derive(Debug, Clone)]
pub struct SnapshotBlob {
    /// Sequence number the snapshot state corresponds to
    pub sequence: u64,
    /// Snapshot bytes in the on-disk format
    pub bytes: Bytes,
}

/// How a follower's sync request was answered.
#[derive(Debug)]
pub enum SyncStart {
    /// Continuity proven; the feed resumes right after the follower's
    /// last applied sequence.
    Continue,
    /// Continuity lost (or first contact); install this snapshot, then
    /// apply the feed.
    FullResync(SnapshotBlob),
}

/// A follower's answer channel on the leader side.
///
/// The channel is bounded; a follower that stops draining it is
/// detached rather than allowed to buffer without limit.
pub struct FollowerSlot {
    tx: mpsc::Sender<LogRecord>,
}

impl FollowerSlot {
    /// Create a slot and its receiving half.
    pub fn new(buffer: usize) -> (Self, mpsc::Receiver<LogRecord>) {
        let (tx, rx) = mpsc::channel(buffer);
        (FollowerSlot { tx }, rx)
    }

    /// Hand a record to the follower. Returns false if the follower is
    /// gone or too far behind; the caller detaches the slot.
    pub fn forward(&self, record: LogRecord) -> bool {
        match self.tx.try_send(record) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(record)) => {
                warn!(
                    sequence = record.sequence,
                    "follower buffer full, detaching"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(seq: u64) -> LogRecord {
        LogRecord::new(seq, 0, "SET", vec![Bytes::from("k"), Bytes::from("v")])
    }

    #[test]
    fn test_forward_until_full() {
        let (slot, mut rx) = FollowerSlot::new(2);
        assert!(slot.forward(record(1)));
        assert!(slot.forward(record(2)));
        assert!(!slot.forward(record(3)));

        assert_eq!(rx.try_recv().unwrap().sequence, 1);
        assert_eq!(rx.try_recv().unwrap().sequence, 2);
    }

    #[test]
    fn test_forward_to_dropped_follower() {
        let (slot, rx) = FollowerSlot::new(2);
        drop(rx);
        assert!(!slot.forward(record(1)));
    }
}
