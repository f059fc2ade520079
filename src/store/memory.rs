//! In-memory storage for one database namespace
//!
//! Single-threaded by contract: the engine loop serializes every access,
//! so the store carries no locks. Lazy expiration happens on access;
//! reaped keys are recorded so the dispatcher can emit synthetic DELs
//! into the command log.

use super::entry::Entry;
use super::value::Value;
use bytes::Bytes;
use siphasher::sip::SipHasher13;
use std::collections::HashMap;
use std::hash::BuildHasherDefault;

/// Type alias for the main map with SipHasher
type StoreMap = HashMap<Bytes, Entry, BuildHasherDefault<SipHasher13>>;

/// In-memory key-value store for a single namespace.
pub struct MemoryStore {
    /// The main storage map
    map: StoreMap,

    /// Keys carrying an expiry, with their absolute deadline (ms).
    /// Secondary index so active sweeps can sample without a full scan.
    expires: HashMap<Bytes, u64>,

    /// Keys reaped by lazy expiration since the last drain
    reaped: Vec<Bytes>,

    /// Rotating start position for expiry sampling
    sweep_cursor: usize,
}

impl MemoryStore {
    /// Create a new memory store with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    /// Create a new memory store with specified initial capacity
    pub fn with_capacity(capacity: usize) -> Self {
        MemoryStore {
            map: HashMap::with_capacity_and_hasher(
                capacity,
                BuildHasherDefault::<SipHasher13>::default(),
            ),
            expires: HashMap::new(),
            reaped: Vec::new(),
            sweep_cursor: 0,
        }
    }

    fn reap(&mut self, key: &Bytes) {
        self.map.remove(key);
        self.expires.remove(key);
        self.reaped.push(key.clone());
    }

    /// Get a value by key; None if absent or expired at `now`.
    pub fn get(&mut self, key: &Bytes, now: u64) -> Option<&Value> {
        if self.is_expired(key, now) {
            self.reap(key);
            return None;
        }
        self.map.get(key).map(|entry| &entry.value)
    }

    /// Get a mutable value reference; None if absent or expired at `now`.
    pub fn get_mut(&mut self, key: &Bytes, now: u64) -> Option<&mut Value> {
        if self.is_expired(key, now) {
            self.reap(key);
            return None;
        }
        self.map.get_mut(key).map(|entry| &mut entry.value)
    }

    /// Destructively set a key. Any previous value (of any variant) and
    /// its expiry are discarded. Returns true if the key was new.
    pub fn set(&mut self, key: impl Into<Bytes>, value: Value) -> bool {
        let key = key.into();
        self.expires.remove(&key);
        self.map.insert(key, Entry::new(value)).is_none()
    }

    /// Get the value for `key`, inserting the result of `make` first if
    /// the key is absent or expired. Used by type-specific write paths
    /// (LPUSH creates a list, HSET a hash, ...).
    pub fn get_or_insert_with<F>(&mut self, key: &Bytes, now: u64, make: F) -> &mut Value
    where
        F: FnOnce() -> Value,
    {
        if self.is_expired(key, now) {
            self.reap(key);
        }
        &mut self
            .map
            .entry(key.clone())
            .or_insert_with(|| Entry::new(make()))
            .value
    }

    /// Delete a key. Returns true if a live key was removed.
    pub fn delete(&mut self, key: &Bytes, now: u64) -> bool {
        if self.is_expired(key, now) {
            self.reap(key);
            return false;
        }
        self.expires.remove(key);
        self.map.remove(key).is_some()
    }

    /// Check if a key exists and is live at `now`.
    pub fn exists(&mut self, key: &Bytes, now: u64) -> bool {
        if self.is_expired(key, now) {
            self.reap(key);
            return false;
        }
        self.map.contains_key(key)
    }

    /// True if the key physically exists with an expiry at or before `now`.
    pub fn is_expired(&self, key: &Bytes, now: u64) -> bool {
        self.map
            .get(key)
            .map(|entry| entry.is_expired(now))
            .unwrap_or(false)
    }

    /// Set an absolute expiry on a live key. Returns false if the key
    /// is absent (or already expired).
    pub fn set_expiry(&mut self, key: &Bytes, at_ms: u64, now: u64) -> bool {
        if self.is_expired(key, now) {
            self.reap(key);
            return false;
        }
        match self.map.get_mut(key) {
            Some(entry) => {
                entry.expire_at = Some(at_ms);
                self.expires.insert(key.clone(), at_ms);
                true
            }
            None => false,
        }
    }

    /// Remove the expiry from a live key. Returns true if one was removed.
    pub fn clear_expiry(&mut self, key: &Bytes, now: u64) -> bool {
        if self.is_expired(key, now) {
            self.reap(key);
            return false;
        }
        match self.map.get_mut(key) {
            Some(entry) => {
                self.expires.remove(key);
                entry.expire_at.take().is_some()
            }
            None => false,
        }
    }

    /// TTL in milliseconds:
    /// - Some(Some(n)): key is live with n ms remaining
    /// - Some(None): key is live without expiry
    /// - None: key absent or expired
    pub fn ttl(&mut self, key: &Bytes, now: u64) -> Option<Option<u64>> {
        if self.is_expired(key, now) {
            self.reap(key);
            return None;
        }
        self.map.get(key).map(|entry| entry.ttl_ms(now))
    }

    /// Drain the keys reaped by lazy expiration since the last call.
    pub fn take_reaped(&mut self) -> Vec<Bytes> {
        std::mem::take(&mut self.reaped)
    }

    /// Sample up to `limit` keys from the expires index and return the
    /// ones already due at `now`. Bounded by `limit`, never a full scan.
    /// A cursor rotates the sampling window across calls so every
    /// deadline is eventually visited even in a quiet namespace.
    pub fn sample_expired(&mut self, now: u64, limit: usize) -> Vec<Bytes> {
        let total = self.expires.len();
        if total == 0 {
            return Vec::new();
        }
        let start = self.sweep_cursor % total;
        self.sweep_cursor = (start + limit) % total;
        self.expires
            .iter()
            .cycle()
            .skip(start)
            .take(limit.min(total))
            .filter(|(_, at)| now >= **at)
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Number of keys physically present (may include not-yet-reaped
    /// expired keys).
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// True if no keys are physically present.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Number of keys live at `now`.
    pub fn live_len(&self, now: u64) -> usize {
        self.map.values().filter(|e| !e.is_expired(now)).count()
    }

    /// Remove all keys.
    pub fn clear(&mut self) {
        self.map.clear();
        self.expires.clear();
    }

    /// All live keys at `now` (expensive; KEYS / snapshot paths only).
    pub fn keys(&self, now: u64) -> Vec<Bytes> {
        self.map
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }

    /// Iterate all physical (key, entry) pairs. Snapshot capture filters
    /// expired entries itself.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Entry)> {
        self.map.iter()
    }

    /// Install a (key, entry) pair verbatim, expiry included.
    /// Snapshot load path.
    pub fn install(&mut self, key: Bytes, entry: Entry) {
        if let Some(at) = entry.expire_at {
            self.expires.insert(key.clone(), at);
        }
        self.map.insert(key, entry);
    }

    /// Approximate memory usage of live data in bytes.
    pub fn memory_usage(&self, now: u64) -> usize {
        self.map
            .iter()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, entry)| key.len() + entry.memory_usage())
            .sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_basic_set_get() {
        let mut store = MemoryStore::new();
        store.set("k", Value::string("v"));

        let value = store.get(&key("k"), 0).unwrap();
        assert_eq!(value.as_string().unwrap(), &Bytes::from("v"));
    }

    #[test]
    fn test_delete_exists() {
        let mut store = MemoryStore::new();
        store.set("k", Value::string("v"));

        assert!(store.exists(&key("k"), 0));
        assert!(store.delete(&key("k"), 0));
        assert!(!store.exists(&key("k"), 0));
        assert!(!store.delete(&key("k"), 0));
    }

    #[test]
    fn test_lazy_expiry_records_reaped() {
        let mut store = MemoryStore::new();
        store.set("k", Value::string("v"));
        store.set_expiry(&key("k"), 1000, 0);

        assert!(store.exists(&key("k"), 999));
        assert!(!store.exists(&key("k"), 1000));

        let reaped = store.take_reaped();
        assert_eq!(reaped, vec![key("k")]);
        assert!(store.take_reaped().is_empty());
    }

    #[test]
    fn test_set_clears_expiry() {
        let mut store = MemoryStore::new();
        store.set("k", Value::string("v1"));
        store.set_expiry(&key("k"), 1000, 0);

        // destructive overwrite removes the deadline
        store.set("k", Value::string("v2"));
        assert!(store.exists(&key("k"), 5000));
        assert_eq!(store.ttl(&key("k"), 5000), Some(None));
    }

    #[test]
    fn test_ttl_states() {
        let mut store = MemoryStore::new();
        assert_eq!(store.ttl(&key("none"), 0), None);

        store.set("k", Value::string("v"));
        assert_eq!(store.ttl(&key("k"), 0), Some(None));

        store.set_expiry(&key("k"), 1500, 0);
        assert_eq!(store.ttl(&key("k"), 500), Some(Some(1000)));
        assert_eq!(store.ttl(&key("k"), 1500), None);
    }

    #[test]
    fn test_get_or_insert_with() {
        let mut store = MemoryStore::new();
        let v = store.get_or_insert_with(&key("l"), 0, Value::empty_list);
        v.as_list_mut().unwrap().push_back(Bytes::from("x"));

        let v = store.get_or_insert_with(&key("l"), 0, Value::empty_list);
        assert_eq!(v.as_list().unwrap().len(), 1);
    }

    #[test]
    fn test_sample_expired_bounded() {
        let mut store = MemoryStore::new();
        for i in 0..50 {
            let k = format!("k{}", i);
            store.set(k.clone(), Value::string("v"));
            store.set_expiry(&Bytes::from(k), 10, 0);
        }

        let sample = store.sample_expired(100, 8);
        assert!(sample.len() <= 8);
        assert!(!sample.is_empty());

        // nothing due yet
        assert!(store.sample_expired(5, 8).is_empty());
    }

    #[test]
    fn test_sample_rotates_through_the_index() {
        let mut store = MemoryStore::new();
        for i in 0..20 {
            let k = format!("k{}", i);
            store.set(k.clone(), Value::string("v"));
            store.set_expiry(&Bytes::from(k), 10, 0);
        }

        // a window smaller than the index still visits every deadline
        let mut seen = std::collections::HashSet::new();
        for _ in 0..10 {
            for k in store.sample_expired(100, 8) {
                seen.insert(k);
            }
        }
        assert_eq!(seen.len(), 20);
    }

    #[test]
    fn test_install_preserves_expiry() {
        let mut store = MemoryStore::new();
        store.install(key("k"), Entry::with_expiry(Value::string("v"), 2000));
        assert!(store.exists(&key("k"), 1000));
        assert!(!store.exists(&key("k"), 3000));
    }
}
