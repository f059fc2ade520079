//! Point-in-time snapshots
//!
//! A snapshot bounds AOF replay length: recovery loads the latest
//! snapshot and replays only records with a higher sequence number.
//! Files are written to a temporary name and renamed into place, so a
//! crash mid-write never shadows the previous snapshot.

mod format;

pub use format::SnapshotData;

use std::io;
use std::path::{Path, PathBuf};
use tracing::info;

/// Snapshot file name for a sequence number.
pub fn snapshot_name(seq: u64) -> String {
    format!("snapshot-{:020}.cdb", seq)
}

fn parse_snapshot_name(name: &str) -> Option<u64> {
    let rest = name.strip_prefix("snapshot-")?.strip_suffix(".cdb")?;
    rest.parse().ok()
}

/// List snapshot files in `dir`, sorted by sequence ascending.
pub fn snapshot_files(dir: &Path) -> io::Result<Vec<(u64, PathBuf)>> {
    let mut found = Vec::new();
    if !dir.exists() {
        return Ok(found);
    }
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        if let Some(seq) = parse_snapshot_name(&name.to_string_lossy()) {
            found.push((seq, entry.path()));
        }
    }
    found.sort_by_key(|(seq, _)| *seq);
    Ok(found)
}

/// Durably write `data` as the snapshot for its sequence number.
pub fn write_file(dir: &Path, data: &SnapshotData) -> io::Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let tmp = dir.join(format!("{}.tmp", snapshot_name(data.sequence)));
    let path = dir.join(snapshot_name(data.sequence));

    let encoded = data.encode();
    std::fs::write(&tmp, &encoded)?;
    let file = std::fs::File::open(&tmp)?;
    file.sync_all()?;
    std::fs::rename(&tmp, &path)?;

    info!(
        "snapshot written at sequence {} ({} bytes)",
        data.sequence,
        encoded.len()
    );
    Ok(path)
}

/// Load the highest-sequence snapshot in `dir`, if any.
///
/// A present-but-corrupt latest snapshot is an error, not a silent
/// fallback: recovery must refuse to start.
pub fn load_latest(dir: &Path) -> Result<Option<SnapshotData>, String> {
    let files = snapshot_files(dir).map_err(|e| format!("cannot list snapshots: {}", e))?;
    let Some((seq, path)) = files.last() else {
        return Ok(None);
    };

    let raw = std::fs::read(path).map_err(|e| format!("cannot read snapshot {:?}: {}", path, e))?;
    let data = SnapshotData::decode(&raw).map_err(|e| format!("snapshot {:?}: {}", path, e))?;
    if data.sequence != *seq {
        return Err(format!(
            "snapshot {:?} claims sequence {} but is named for {}",
            path, data.sequence, seq
        ));
    }
    Ok(Some(data))
}

/// Delete snapshot files older than `keep_seq`. Called after a newer
/// snapshot is durable.
pub fn prune_older(dir: &Path, keep_seq: u64) -> io::Result<usize> {
    let mut removed = 0;
    for (seq, path) in snapshot_files(dir)? {
        if seq < keep_seq {
            std::fs::remove_file(path)?;
            removed += 1;
        }
    }
    Ok(removed)
}
