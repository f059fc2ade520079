//! Counter commands (INCR, DECR, INCRBY, DECRBY)
//!
//! Counters operate on String values holding a decimal integer; the
//! value is parsed, adjusted and stored back as a String. A non-numeric
//! value is a type error and leaves the key unchanged.

use super::{parse_int, Command, CommandContext};
use crate::error::EngineError;
use crate::reply::Reply;
use crate::store::Value;
use bytes::Bytes;

/// Shared apply path: read-parse-adjust-write. An existing key is
/// mutated in place so its expiry survives.
fn apply_delta(
    ctx: &mut CommandContext,
    db: usize,
    key: &Bytes,
    delta: i64,
) -> Result<Reply, EngineError> {
    let now = ctx.now;
    let store = ctx.db_mut(db);
    match store.get_mut(key, now) {
        Some(Value::String(b)) => {
            let current: i64 = std::str::from_utf8(b)
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or(EngineError::WrongType)?;
            let next = current.checked_add(delta).ok_or_else(|| {
                EngineError::BadArgument("increment or decrement would overflow".into())
            })?;
            *b = Bytes::from(next.to_string());
            Ok(Reply::int(next))
        }
        Some(_) => Err(EngineError::WrongType),
        None => {
            store.set(key.clone(), Value::String(Bytes::from(delta.to_string())));
            Ok(Reply::int(delta))
        }
    }
}

/// INCR command - Increment the integer value of a key by one
///
/// Syntax: INCR key
pub struct IncrCommand;

impl Command for IncrCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        apply_delta(ctx, db, &args[0], 1)
    }

    fn name(&self) -> &'static str {
        "INCR"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn writes(&self) -> bool {
        true
    }
}

/// DECR command - Decrement the integer value of a key by one
///
/// Syntax: DECR key
pub struct DecrCommand;

impl Command for DecrCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        apply_delta(ctx, db, &args[0], -1)
    }

    fn name(&self) -> &'static str {
        "DECR"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }

    fn writes(&self) -> bool {
        true
    }
}

/// INCRBY command - Increment by an explicit amount
///
/// Syntax: INCRBY key increment
pub struct IncrByCommand;

impl Command for IncrByCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let delta = parse_int(&args[1])?;
        apply_delta(ctx, db, &args[0], delta)
    }

    fn name(&self) -> &'static str {
        "INCRBY"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn writes(&self) -> bool {
        true
    }
}

/// DECRBY command - Decrement by an explicit amount
///
/// Syntax: DECRBY key decrement
pub struct DecrByCommand;

impl Command for DecrByCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let delta = parse_int(&args[1])?;
        let delta = delta.checked_neg().ok_or_else(|| {
            EngineError::BadArgument("increment or decrement would overflow".into())
        })?;
        apply_delta(ctx, db, &args[0], delta)
    }

    fn name(&self) -> &'static str {
        "DECRBY"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }

    fn writes(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_incr_from_set_value() {
        let mut ctx = CommandContext::new(1, 16);
        ctx.db_mut(0).set("a", Value::string("1"));

        let r = IncrCommand.execute(&mut ctx, 0, &[Bytes::from("a")]).unwrap();
        assert_eq!(r, Reply::int(2));
    }

    #[test]
    fn test_incr_missing_starts_at_zero() {
        let mut ctx = CommandContext::new(1, 16);
        let r = IncrCommand.execute(&mut ctx, 0, &[Bytes::from("n")]).unwrap();
        assert_eq!(r, Reply::int(1));
        let r = DecrCommand.execute(&mut ctx, 0, &[Bytes::from("n")]).unwrap();
        assert_eq!(r, Reply::int(0));
    }

    #[test]
    fn test_incr_non_numeric_is_type_error() {
        let mut ctx = CommandContext::new(1, 16);
        ctx.db_mut(0).set("a", Value::string("hello"));

        let err = IncrCommand.execute(&mut ctx, 0, &[Bytes::from("a")]).unwrap_err();
        assert!(matches!(err, EngineError::WrongType));

        // value unchanged after the failure
        let v = ctx.db_mut(0).get(&Bytes::from("a"), 0).unwrap();
        assert_eq!(v.as_string().unwrap(), &Bytes::from("hello"));
    }

    #[test]
    fn test_incrby_decrby() {
        let mut ctx = CommandContext::new(1, 16);
        let r = IncrByCommand
            .execute(&mut ctx, 0, &[Bytes::from("c"), Bytes::from("10")])
            .unwrap();
        assert_eq!(r, Reply::int(10));
        let r = DecrByCommand
            .execute(&mut ctx, 0, &[Bytes::from("c"), Bytes::from("4")])
            .unwrap();
        assert_eq!(r, Reply::int(6));
    }

    #[test]
    fn test_overflow_rejected() {
        let mut ctx = CommandContext::new(1, 16);
        ctx.db_mut(0).set("m", Value::string(i64::MAX.to_string()));
        let err = IncrCommand.execute(&mut ctx, 0, &[Bytes::from("m")]).unwrap_err();
        assert!(matches!(err, EngineError::BadArgument(_)));
    }
}
