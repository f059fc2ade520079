//! Stream: append-only ordered log of id -> field-map entries
//!
//! Ids are `<ms>-<seq>` pairs and strictly increase within a stream;
//! appends with a non-increasing explicit id are rejected.

use bytes::Bytes;
use std::fmt;
use std::str::FromStr;

/// A stream entry id: milliseconds timestamp plus a per-millisecond
/// sequence counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct StreamId {
    pub ms: u64,
    pub seq: u64,
}

impl StreamId {
    pub const MIN: StreamId = StreamId { ms: 0, seq: 0 };
    pub const MAX: StreamId = StreamId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    pub fn new(ms: u64, seq: u64) -> Self {
        StreamId { ms, seq }
    }

    /// The next id at or after `now_ms`, given the last assigned id.
    pub fn next_after(last: StreamId, now_ms: u64) -> StreamId {
        if now_ms > last.ms {
            StreamId { ms: now_ms, seq: 0 }
        } else {
            StreamId {
                ms: last.ms,
                seq: last.seq + 1,
            }
        }
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for StreamId {
    type Err = String;

    /// Parse "ms-seq"; a bare "ms" means sequence 0.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ms_part, seq_part) = match s.split_once('-') {
            Some((ms, seq)) => (ms, Some(seq)),
            None => (s, None),
        };
        let ms: u64 = ms_part
            .parse()
            .map_err(|_| format!("invalid stream id '{}'", s))?;
        let seq: u64 = match seq_part {
            Some(seq) => seq
                .parse()
                .map_err(|_| format!("invalid stream id '{}'", s))?,
            None => 0,
        };
        Ok(StreamId { ms, seq })
    }
}

/// One entry: id plus field/value pairs in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEntry {
    pub id: StreamId,
    pub fields: Vec<(Bytes, Bytes)>,
}

/// Append-only entry log.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stream {
    entries: Vec<StreamEntry>,
    last_id: StreamId,
}

impl Stream {
    /// Create an empty stream
    pub fn new() -> Self {
        Stream::default()
    }

    /// Append with an explicit id. Fails if the id does not exceed the
    /// last assigned id.
    pub fn append(&mut self, id: StreamId, fields: Vec<(Bytes, Bytes)>) -> Result<(), String> {
        if !self.entries.is_empty() && id <= self.last_id {
            return Err(format!(
                "stream id {} is not greater than last id {}",
                id, self.last_id
            ));
        }
        self.last_id = id;
        self.entries.push(StreamEntry { id, fields });
        Ok(())
    }

    /// Append with an auto-generated id at or after `now_ms`.
    /// Returns the assigned id.
    pub fn append_auto(&mut self, now_ms: u64, fields: Vec<(Bytes, Bytes)>) -> StreamId {
        let id = if self.entries.is_empty() {
            StreamId { ms: now_ms, seq: 0 }
        } else {
            StreamId::next_after(self.last_id, now_ms)
        };
        self.last_id = id;
        self.entries.push(StreamEntry { id, fields });
        id
    }

    /// Entries with start <= id <= end.
    pub fn range(&self, start: StreamId, end: StreamId) -> Vec<&StreamEntry> {
        self.entries
            .iter()
            .filter(|e| e.id >= start && e.id <= end)
            .collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True if the stream has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest id assigned so far.
    pub fn last_id(&self) -> StreamId {
        self.last_id
    }

    /// Iterate all entries in append order.
    pub fn iter(&self) -> impl Iterator<Item = &StreamEntry> {
        self.entries.iter()
    }

    /// Approximate memory usage in bytes.
    pub fn memory_usage(&self) -> usize {
        self.entries
            .iter()
            .map(|e| {
                let fields: usize = e.fields.iter().map(|(k, v)| k.len() + v.len()).sum();
                fields + std::mem::size_of::<StreamId>()
            })
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_parse_display() {
        let id: StreamId = "1700000000000-3".parse().unwrap();
        assert_eq!(id, StreamId::new(1700000000000, 3));
        assert_eq!(id.to_string(), "1700000000000-3");

        let bare: StreamId = "42".parse().unwrap();
        assert_eq!(bare, StreamId::new(42, 0));

        assert!("abc".parse::<StreamId>().is_err());
        assert!("1-x".parse::<StreamId>().is_err());
    }

    #[test]
    fn test_append_monotonic() {
        let mut s = Stream::new();
        s.append(StreamId::new(10, 0), vec![]).unwrap();
        s.append(StreamId::new(10, 1), vec![]).unwrap();
        assert!(s.append(StreamId::new(10, 1), vec![]).is_err());
        assert!(s.append(StreamId::new(9, 0), vec![]).is_err());
        assert_eq!(s.len(), 2);
    }

    #[test]
    fn test_append_auto_same_millisecond() {
        let mut s = Stream::new();
        let first = s.append_auto(100, vec![]);
        let second = s.append_auto(100, vec![]);
        assert_eq!(first, StreamId::new(100, 0));
        assert_eq!(second, StreamId::new(100, 1));

        let later = s.append_auto(200, vec![]);
        assert_eq!(later, StreamId::new(200, 0));
    }

    #[test]
    fn test_range() {
        let mut s = Stream::new();
        for ms in [10u64, 20, 30] {
            s.append(
                StreamId::new(ms, 0),
                vec![(Bytes::from("n"), Bytes::from(ms.to_string()))],
            )
            .unwrap();
        }

        let mid = s.range(StreamId::new(15, 0), StreamId::new(25, 0));
        assert_eq!(mid.len(), 1);
        assert_eq!(mid[0].id, StreamId::new(20, 0));

        let all = s.range(StreamId::MIN, StreamId::MAX);
        assert_eq!(all.len(), 3);
    }
}
