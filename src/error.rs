//! Engine error taxonomy
//!
//! Per-command errors (wrong type, wrong arity, bad argument) are returned
//! to the caller inline and never abort unrelated commands. Durability and
//! recovery failures are fatal to their paths: a command that could not be
//! made durable is neither acknowledged nor replicated, and a corrupted
//! snapshot or log refuses startup instead of serving partial state.

use thiserror::Error;

/// All errors surfaced by the engine core.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Command name is not registered.
    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    /// Wrong number of arguments for a known command.
    #[error("ERR wrong number of arguments for '{0}' command")]
    Arity(String),

    /// Operation applied to a key holding a different value variant,
    /// or a string operation on a non-numeric value.
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    /// An argument could not be parsed (integer, float, stream id, ...).
    #[error("ERR {0}")]
    BadArgument(String),

    /// Invalid TTL / expiry timestamp.
    #[error("ERR invalid expire time")]
    InvalidExpiry,

    /// Database namespace index out of range.
    #[error("ERR invalid database index {0}")]
    InvalidDatabase(usize),

    /// Write rejected because this instance is a replica.
    #[error("READONLY You can't write against a read only replica")]
    ReadOnlyReplica,

    /// Append-only log write failed. The command was not acknowledged
    /// and was not forwarded to replicas.
    #[error("append-only log write failed: {0}")]
    Durability(#[source] std::io::Error),

    /// A follower observed a sequence discontinuity. Recovered locally
    /// by requesting a full snapshot resync; never fatal.
    #[error("replication gap: expected sequence {expected}, got {got}")]
    ReplicationGap { expected: u64, got: u64 },

    /// Replication stream or handshake failed (transport-level).
    #[error("replication stream error: {0}")]
    Replication(String),

    /// Snapshot or log corrupted at startup. The engine refuses to start.
    #[error("recovery failed: {0}")]
    Recovery(String),

    /// The engine loop has shut down and can no longer serve requests.
    #[error("engine stopped")]
    Stopped,
}

impl EngineError {
    /// True for errors that must terminate startup rather than be retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, EngineError::Durability(_) | EngineError::Recovery(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = EngineError::UnknownCommand("FOO".into());
        assert_eq!(err.to_string(), "ERR unknown command 'FOO'");

        let err = EngineError::Arity("GET".into());
        assert!(err.to_string().contains("wrong number of arguments"));

        let err = EngineError::ReplicationGap { expected: 4, got: 7 };
        assert!(err.to_string().contains("expected sequence 4"));
    }

    #[test]
    fn test_fatal_classification() {
        assert!(EngineError::Recovery("bad".into()).is_fatal());
        assert!(!EngineError::WrongType.is_fatal());
        assert!(!EngineError::ReplicationGap { expected: 1, got: 2 }.is_fatal());
    }
}
