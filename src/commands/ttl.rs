//! Expiration commands (EXPIRE, PEXPIREAT, TTL, PERSIST)
//!
//! EXPIRE is relative to the executing node's clock, so it never enters
//! the log as received: it is rewritten to PEXPIREAT with the absolute
//! deadline, which replays and replicates deterministically.

use super::{parse_int, Command, CommandContext, Propagate};
use crate::error::EngineError;
use crate::reply::Reply;
use bytes::Bytes;

/// EXPIRE command - Set a relative time-to-live in seconds
///
/// Syntax: EXPIRE key seconds
///
/// A non-positive ttl deletes the key immediately.
pub struct ExpireCommand;

impl Command for ExpireCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let secs = parse_int(&args[1]).map_err(|_| EngineError::InvalidExpiry)?;
        let now = ctx.now;
        let store = ctx.db_mut(db);

        if !store.exists(&args[0], now) {
            ctx.propagate = Propagate::Skip;
            return Ok(Reply::int(0));
        }

        if secs <= 0 {
            store.delete(&args[0], now);
            ctx.propagate = Propagate::As("DEL", vec![args[0].clone()]);
            return Ok(Reply::int(1));
        }

        let at_ms = (secs as u64)
            .checked_mul(1000)
            .and_then(|ms| now.checked_add(ms))
            .ok_or(EngineError::InvalidExpiry)?;
        store.set_expiry(&args[0], at_ms, now);
        ctx.propagate = Propagate::As(
            "PEXPIREAT",
            vec![args[0].clone(), Bytes::from(at_ms.to_string())],
        );
        Ok(Reply::int(1))
    }

    fn name(&self) -> &'static str {
        "EXPIRE"
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

/// PEXPIREAT command - Set an absolute deadline in epoch milliseconds
///
/// Syntax: PEXPIREAT key unix-time-ms
///
/// This is the form EXPIRE is rewritten to for the log; a deadline at
/// or before now deletes the key.
pub struct PExpireAtCommand;

impl Command for PExpireAtCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let at_ms = parse_int(&args[1]).map_err(|_| EngineError::InvalidExpiry)?;
        if at_ms < 0 {
            return Err(EngineError::InvalidExpiry);
        }
        let at_ms = at_ms as u64;
        let now = ctx.now;
        let store = ctx.db_mut(db);

        if !store.exists(&args[0], now) {
            ctx.propagate = Propagate::Skip;
            return Ok(Reply::int(0));
        }

        if at_ms <= now {
            store.delete(&args[0], now);
            ctx.propagate = Propagate::As("DEL", vec![args[0].clone()]);
            return Ok(Reply::int(1));
        }

        store.set_expiry(&args[0], at_ms, now);
        Ok(Reply::int(1))
    }

    fn name(&self) -> &'static str {
        "PEXPIREAT"
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

/// TTL command - Remaining time-to-live in seconds
///
/// Syntax: TTL key
///
/// -2 if the key does not exist, -1 if it has no expiry.
pub struct TtlCommand;

impl Command for TtlCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).ttl(&args[0], now) {
            None => Ok(Reply::int(-2)),
            Some(None) => Ok(Reply::int(-1)),
            // round up so a freshly set EXPIRE n reads back as n
            Some(Some(ms)) => Ok(Reply::int(((ms + 999) / 1000) as i64)),
        }
    }

    fn name(&self) -> &'static str {
        "TTL"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// PERSIST command - Remove the expiry from a key
///
/// Syntax: PERSIST key
pub struct PersistCommand;

impl Command for PersistCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        if ctx.db_mut(db).clear_expiry(&args[0], now) {
            Ok(Reply::int(1))
        } else {
            ctx.propagate = Propagate::Skip;
            Ok(Reply::int(0))
        }
    }

    fn name(&self) -> &'static str {
        "PERSIST"
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Value;

    fn ctx_with(key: &str) -> CommandContext {
        let mut ctx = CommandContext::new(1, 16);
        ctx.db_mut(0).set(key.to_string(), Value::string("v"));
        ctx
    }

    #[test]
    fn test_expire_rewrites_to_pexpireat() {
        let mut ctx = ctx_with("k");
        ctx.now = 10_000;

        let r = ExpireCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from("5")])
            .unwrap();
        assert_eq!(r, Reply::int(1));
        assert_eq!(
            ctx.propagate,
            Propagate::As(
                "PEXPIREAT",
                vec![Bytes::from("k"), Bytes::from("15000")]
            )
        );
        assert!(!ctx.db_mut(0).exists(&Bytes::from("k"), 15_000));
    }

    #[test]
    fn test_expire_missing_key_skips() {
        let mut ctx = CommandContext::new(1, 16);
        let r = ExpireCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from("5")])
            .unwrap();
        assert_eq!(r, Reply::int(0));
        assert_eq!(ctx.propagate, Propagate::Skip);
    }

    #[test]
    fn test_expire_nonpositive_deletes_as_del() {
        let mut ctx = ctx_with("k");
        let r = ExpireCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from("0")])
            .unwrap();
        assert_eq!(r, Reply::int(1));
        assert_eq!(ctx.propagate, Propagate::As("DEL", vec![Bytes::from("k")]));
        assert!(!ctx.db_mut(0).exists(&Bytes::from("k"), 0));
    }

    #[test]
    fn test_expire_rejects_garbage() {
        let mut ctx = ctx_with("k");
        let err = ExpireCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from("soon")])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidExpiry));
    }

    #[test]
    fn test_expire_rejects_overflowing_seconds() {
        let mut ctx = ctx_with("k");
        ctx.now = 10_000;
        let huge = i64::MAX.to_string();
        let err = ExpireCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from(huge)])
            .unwrap_err();
        assert!(matches!(err, EngineError::InvalidExpiry));
        // the key keeps no expiry after the rejected command
        assert!(ctx.db_mut(0).exists(&Bytes::from("k"), u64::MAX));
    }

    #[test]
    fn test_pexpireat_past_deadline_deletes() {
        let mut ctx = ctx_with("k");
        ctx.now = 10_000;
        let r = PExpireAtCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from("9000")])
            .unwrap();
        assert_eq!(r, Reply::int(1));
        assert_eq!(ctx.propagate, Propagate::As("DEL", vec![Bytes::from("k")]));
    }

    #[test]
    fn test_ttl_states() {
        let mut ctx = ctx_with("k");
        ctx.now = 1000;

        let r = TtlCommand.execute(&mut ctx, 0, &[Bytes::from("gone")]).unwrap();
        assert_eq!(r, Reply::int(-2));

        let r = TtlCommand.execute(&mut ctx, 0, &[Bytes::from("k")]).unwrap();
        assert_eq!(r, Reply::int(-1));

        ctx.db_mut(0).set_expiry(&Bytes::from("k"), 3500, 1000);
        let r = TtlCommand.execute(&mut ctx, 0, &[Bytes::from("k")]).unwrap();
        assert_eq!(r, Reply::int(3));
    }

    #[test]
    fn test_persist() {
        let mut ctx = ctx_with("k");
        ctx.db_mut(0).set_expiry(&Bytes::from("k"), 5000, 0);

        let r = PersistCommand.execute(&mut ctx, 0, &[Bytes::from("k")]).unwrap();
        assert_eq!(r, Reply::int(1));
        assert!(ctx.db_mut(0).exists(&Bytes::from("k"), 10_000));

        ctx.propagate = Propagate::Verbatim;
        let r = PersistCommand.execute(&mut ctx, 0, &[Bytes::from("k")]).unwrap();
        assert_eq!(r, Reply::int(0));
        assert_eq!(ctx.propagate, Propagate::Skip);
    }
}
