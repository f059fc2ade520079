//! Bounded in-memory backlog of recent committed records
//!
//! Lets a briefly disconnected follower resume without a full resync.
//! Once the follower's last sequence falls off the back of the ring,
//! only a snapshot can bring it back.

use crate::aof::LogRecord;
use std::collections::VecDeque;

/// Ring of the most recent committed records, in sequence order.
pub struct ReplBacklog {
    records: VecDeque<LogRecord>,
    capacity: usize,
}

impl ReplBacklog {
    pub fn new(capacity: usize) -> Self {
        ReplBacklog {
            records: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a committed record, evicting the oldest when full.
    pub fn push(&mut self, record: LogRecord) {
        if self.records.len() == self.capacity {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// True if every record with sequence > `last` is still held, so a
    /// follower at `last` can resume without a snapshot.
    pub fn covers(&self, last: u64) -> bool {
        match self.records.front() {
            // empty backlog covers only a fully caught-up follower
            None => true,
            Some(oldest) => last + 1 >= oldest.sequence,
        }
    }

    /// All held records with sequence > `last`, in order.
    pub fn since(&self, last: u64) -> Vec<LogRecord> {
        self.records
            .iter()
            .filter(|r| r.sequence > last)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn record(seq: u64) -> LogRecord {
        LogRecord::new(seq, 0, "SET", vec![Bytes::from("k"), Bytes::from("v")])
    }

    fn backlog(range: std::ops::RangeInclusive<u64>, capacity: usize) -> ReplBacklog {
        let mut b = ReplBacklog::new(capacity);
        for seq in range {
            b.push(record(seq));
        }
        b
    }

    #[test]
    fn test_eviction_keeps_most_recent() {
        let b = backlog(1..=10, 4);
        assert_eq!(b.len(), 4);
        let held: Vec<u64> = b.since(0).iter().map(|r| r.sequence).collect();
        assert_eq!(held, vec![7, 8, 9, 10]);
    }

    #[test]
    fn test_covers() {
        let b = backlog(5..=10, 16);
        // follower at 4 needs records from 5 on; oldest held is 5
        assert!(b.covers(4));
        assert!(b.covers(7));
        assert!(b.covers(10));
        // follower at 3 needs record 4, which was never held
        assert!(!b.covers(3));
    }

    #[test]
    fn test_since_filters() {
        let b = backlog(1..=5, 16);
        let seqs: Vec<u64> = b.since(3).iter().map(|r| r.sequence).collect();
        assert_eq!(seqs, vec![4, 5]);
        assert!(b.since(5).is_empty());
    }

    #[test]
    fn test_empty_backlog() {
        let b = ReplBacklog::new(8);
        assert!(b.covers(0));
        assert!(b.since(0).is_empty());
    }
}
