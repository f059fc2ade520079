//! Command execution module
//!
//! Provides a unified interface for all commands through the Command
//! trait. Each command family is implemented in a separate file for
//! high cohesion.

mod context;
mod registry;

// Command implementations
mod bitmap;
mod counter;
mod hash;
mod key;
mod list;
mod pubsub;
mod set;
mod string;
mod stream;
mod ttl;
mod zset;

pub use context::{CommandContext, Propagate};
pub use registry::CommandRegistry;

use crate::error::EngineError;
use crate::reply::Reply;
use bytes::Bytes;

/// Command execution trait
///
/// All commands implement this trait with a single execute method.
/// This keeps the dispatcher loosely coupled from the implementations.
pub trait Command: Send + Sync {
    /// Execute the command against the given namespace.
    ///
    /// `args` excludes the command name. Arity has already been
    /// validated by the dispatcher; argument *content* (integers,
    /// scores, ids) is validated here, before any mutation, so a
    /// failing command never leaves a partial change behind.
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError>;

    /// Get the command name (for registration and logging)
    fn name(&self) -> &'static str;

    /// Minimum number of arguments required
    fn min_args(&self) -> usize {
        0
    }

    /// Maximum number of arguments (None = unlimited)
    fn max_args(&self) -> Option<usize> {
        None
    }

    /// True if the command mutates state. Mutating commands are
    /// sequenced, logged and replicated; read-only ones are not.
    fn writes(&self) -> bool {
        false
    }
}

/// Parse an argument as a signed integer.
pub(crate) fn parse_int(arg: &Bytes) -> Result<i64, EngineError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| EngineError::BadArgument("value is not an integer or out of range".into()))
}

/// Parse an argument as a float score.
pub(crate) fn parse_float(arg: &Bytes) -> Result<f64, EngineError> {
    std::str::from_utf8(arg)
        .ok()
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|f| !f.is_nan())
        .ok_or_else(|| EngineError::BadArgument("value is not a valid float".into()))
}

/// View an argument as UTF-8 text.
pub(crate) fn arg_str(arg: &Bytes) -> Result<&str, EngineError> {
    std::str::from_utf8(arg)
        .map_err(|_| EngineError::BadArgument("argument is not valid UTF-8".into()))
}

/// Resolve Redis-style inclusive [start, stop] indexes (negatives count
/// from the end) against a collection of `len` items. None = empty range.
pub(crate) fn clamp_range(len: usize, start: i64, stop: i64) -> Option<(usize, usize)> {
    let len = len as i64;
    let mut start = if start < 0 { len + start } else { start };
    let mut stop = if stop < 0 { len + stop } else { stop };
    if start < 0 {
        start = 0;
    }
    if stop >= len {
        stop = len - 1;
    }
    if len == 0 || start > stop {
        return None;
    }
    Some((start as usize, stop as usize))
}
