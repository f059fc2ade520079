//! CuprumDB - An in-memory, multi-type key-value data engine
//!
//! CuprumDB is the engine core only: typed value store, key expiration,
//! serialized command dispatch, append-only log + snapshot persistence,
//! and asynchronous leader/follower replication. Network framing,
//! authentication and client tooling are external collaborators that
//! reach the core through [`engine::EngineHandle`].
//!
//! Design principles:
//! - Each module has a single, well-defined responsibility
//! - Modules communicate through clear, minimal interfaces
//! - All command execution is serialized by the engine loop; the store
//!   needs no internal locking

pub mod reply;
pub mod error;
pub mod config;
pub mod store;
pub mod expire;
pub mod commands;
pub mod dispatch;
pub mod txn;
pub mod aof;
pub mod snapshot;
pub mod repl;
pub mod pubsub;
pub mod engine;

mod time;

/// Re-export commonly used types
pub use config::EngineConfig;
pub use engine::{Engine, EngineHandle};
pub use error::EngineError;
pub use reply::Reply;
pub use store::{MemoryStore, Value};

/// Initialize tracing with the `RUST_LOG` environment filter.
///
/// Convenience for embedders and tests; the core never calls this itself.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
