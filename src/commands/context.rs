//! Command execution context

use crate::pubsub::PubSubBus;
use crate::store::MemoryStore;
use bytes::Bytes;

/// How a just-executed write should appear in the log and the
/// replication stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Propagate {
    /// Log the command exactly as received
    Verbatim,

    /// Log a rewritten form. Used where the received form is not
    /// deterministic on replay: EXPIRE becomes PEXPIREAT with an
    /// absolute timestamp, XADD `*` becomes the generated id, expiry
    /// of a key becomes a plain DEL.
    As(&'static str, Vec<Bytes>),

    /// The command had no effect; log nothing.
    Skip,
}

/// Context provided to commands during execution.
///
/// Owns one store per database namespace plus the pub/sub bus. The
/// dispatcher sets `now` once per command so every access within one
/// command sees the same clock.
pub struct CommandContext {
    dbs: Vec<MemoryStore>,

    /// The pub/sub fan-out bus
    pub pubsub: PubSubBus,

    /// Wall clock for the current command (ms since epoch)
    pub now: u64,

    /// Set by write commands; drained by the dispatcher after execution
    pub propagate: Propagate,
}

impl CommandContext {
    /// Create a context with `databases` empty namespaces.
    pub fn new(databases: usize, pubsub_buffer: usize) -> Self {
        CommandContext {
            dbs: (0..databases).map(|_| MemoryStore::new()).collect(),
            pubsub: PubSubBus::new(pubsub_buffer),
            now: 0,
            propagate: Propagate::Verbatim,
        }
    }

    /// Number of database namespaces.
    pub fn database_count(&self) -> usize {
        self.dbs.len()
    }

    /// Store for a namespace. The dispatcher validates the index before
    /// any command runs.
    pub fn db_mut(&mut self, db: usize) -> &mut MemoryStore {
        &mut self.dbs[db]
    }

    /// Read-only view of all namespaces (snapshot capture).
    pub fn dbs(&self) -> &[MemoryStore] {
        &self.dbs
    }

    /// Mutable view of all namespaces (snapshot install, sweeps).
    pub fn dbs_mut(&mut self) -> &mut [MemoryStore] {
        &mut self.dbs
    }

    /// Replace all namespaces (full resync / snapshot load).
    pub fn replace_dbs(&mut self, dbs: Vec<MemoryStore>) {
        self.dbs = dbs;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;

    #[test]
    fn test_namespaces_are_independent() {
        let mut ctx = CommandContext::new(2, 16);
        ctx.db_mut(0).set("k", Value::string("zero"));
        ctx.db_mut(1).set("k", Value::string("one"));

        let v0 = ctx.db_mut(0).get(&Bytes::from("k"), 0).unwrap().clone();
        let v1 = ctx.db_mut(1).get(&Bytes::from("k"), 0).unwrap().clone();
        assert_ne!(v0, v1);
    }
}
