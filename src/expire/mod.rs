//! Active expiration sweep
//!
//! Lazy expiration alone would let never-touched keys pin memory. The
//! engine loop runs this sweep on a timer: it samples a bounded number
//! of keys from each namespace's expiry index and reports the ones
//! already due. The dispatcher turns the report into DEL records so the
//! log and the replicas see exactly the deletions the leader decided.

use crate::store::MemoryStore;
use bytes::Bytes;

/// Sample up to `sample_size` expiring keys per namespace and return
/// the expired ones as (namespace, key) pairs. Cost per call is bounded
/// by `namespaces * sample_size` regardless of keyspace size; the
/// per-store cursor rotates the window so no deadline starves.
pub fn sweep(stores: &mut [MemoryStore], now: u64, sample_size: usize) -> Vec<(usize, Bytes)> {
    let mut due = Vec::new();
    for (db, store) in stores.iter_mut().enumerate() {
        for key in store.sample_expired(now, sample_size) {
            due.push((db, key));
        }
    }
    due
}
