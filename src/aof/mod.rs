//! Append-only log persistence
//!
//! Every mutating command accepted by the dispatcher is appended, in
//! sequence order, to the active segment file `aof-<startseq>.log` in the
//! data directory. Segments rotate when a snapshot is taken; segments
//! whose records are all covered by a durable snapshot are deleted,
//! keeping `snapshot.sequence < min(segment start)`.

mod reader;
mod record;
mod writer;

pub use reader::{read_all_after, AofReader};
pub use record::LogRecord;
pub use writer::AofWriter;

use std::io;
use std::path::{Path, PathBuf};

/// Segment file name for a starting sequence.
pub fn segment_name(start: u64) -> String {
    format!("aof-{:020}.log", start)
}

/// List AOF segment files in a directory, sorted by starting sequence.
pub fn segment_files(dir: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut segments = Vec::new();
    if !dir.exists() {
        return Ok(segments);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if let Some(start) = parse_segment_name(&name) {
            segments.push((start, entry.path()));
        }
    }
    segments.sort_by_key(|(start, _)| *start);
    Ok(segments)
}

/// Delete all segments whose starting sequence is at or below `seq`.
/// Called once the snapshot covering them is durable.
pub fn remove_segments_through(dir: &Path, seq: u64) -> io::Result<usize> {
    let mut removed = 0;
    for (start, path) in segment_files(dir)? {
        if start <= seq {
            std::fs::remove_file(path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn parse_segment_name(name: &str) -> Option<u64> {
    let rest = name.strip_prefix("aof-")?.strip_suffix(".log")?;
    rest.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_name_round_trip() {
        let name = segment_name(17);
        assert_eq!(parse_segment_name(&name), Some(17));
        assert_eq!(parse_segment_name("snapshot-1.cdb"), None);
        assert_eq!(parse_segment_name("aof-x.log"), None);
    }

    #[test]
    fn test_segment_listing_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for start in [30u64, 1, 12] {
            std::fs::write(dir.path().join(segment_name(start)), b"").unwrap();
        }
        std::fs::write(dir.path().join("other.txt"), b"").unwrap();

        let segments = segment_files(dir.path()).unwrap();
        let starts: Vec<u64> = segments.iter().map(|(s, _)| *s).collect();
        assert_eq!(starts, vec![1, 12, 30]);
    }

    #[test]
    fn test_compaction_removes_covered_segments() {
        let dir = tempfile::tempdir().unwrap();
        for start in [1u64, 10, 20] {
            std::fs::write(dir.path().join(segment_name(start)), b"").unwrap();
        }

        let removed = remove_segments_through(dir.path(), 10).unwrap();
        assert_eq!(removed, 2);

        let remaining = segment_files(dir.path()).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].0, 20);
    }
}
