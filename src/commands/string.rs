//! String commands (SET, GET, APPEND, STRLEN)

use super::{Command, CommandContext};
use crate::error::EngineError;
use crate::reply::Reply;
use crate::store::Value;
use bytes::{Bytes, BytesMut};

/// SET command - Set a key to a string value
///
/// Syntax: SET key value
///
/// Destructive overwrite: replaces a value of any variant and clears
/// any expiry on the key.
pub struct SetCommand;

impl Command for SetCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        let store = ctx.db_mut(db);
        // reap a lazily-expired previous value so the log stays consistent
        store.exists(&args[0], now);
        store.set(args[0].clone(), Value::String(args[1].clone()));
        Ok(Reply::ok())
    }

    fn name(&self) -> &'static str {
        "SET"
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

/// GET command - Get the string value of a key
///
/// Syntax: GET key
pub struct GetCommand;

impl Command for GetCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(Value::String(b)) => Ok(Reply::bulk(b.clone())),
            Some(_) => Err(EngineError::WrongType),
            None => Ok(Reply::nil()),
        }
    }

    fn name(&self) -> &'static str {
        "GET"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// APPEND command - Append to a string, creating it if missing
///
/// Syntax: APPEND key value
///
/// Returns the new length. Keeps any existing expiry.
pub struct AppendCommand;

impl Command for AppendCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        let store = ctx.db_mut(db);
        match store.get_mut(&args[0], now) {
            Some(Value::String(b)) => {
                let mut joined = BytesMut::with_capacity(b.len() + args[1].len());
                joined.extend_from_slice(b);
                joined.extend_from_slice(&args[1]);
                let new_len = joined.len();
                *b = joined.freeze();
                Ok(Reply::int(new_len as i64))
            }
            Some(_) => Err(EngineError::WrongType),
            None => {
                store.set(args[0].clone(), Value::String(args[1].clone()));
                Ok(Reply::int(args[1].len() as i64))
            }
        }
    }

    fn name(&self) -> &'static str {
        "APPEND"
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

/// STRLEN command - Length of the string stored at key
///
/// Syntax: STRLEN key
pub struct StrLenCommand;

impl Command for StrLenCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(Value::String(b)) => Ok(Reply::int(b.len() as i64)),
            Some(_) => Err(EngineError::WrongType),
            None => Ok(Reply::int(0)),
        }
    }

    fn name(&self) -> &'static str {
        "STRLEN"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CommandContext {
        CommandContext::new(1, 16)
    }

    #[test]
    fn test_set_get() {
        let mut ctx = ctx();
        let result = SetCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from("v")])
            .unwrap();
        assert_eq!(result, Reply::ok());

        let result = GetCommand.execute(&mut ctx, 0, &[Bytes::from("k")]).unwrap();
        assert_eq!(result, Reply::bulk("v"));
    }

    #[test]
    fn test_get_missing_is_nil() {
        let mut ctx = ctx();
        let result = GetCommand.execute(&mut ctx, 0, &[Bytes::from("nope")]).unwrap();
        assert!(result.is_nil());
    }

    #[test]
    fn test_set_overwrites_any_type() {
        let mut ctx = ctx();
        ctx.db_mut(0).set("k", Value::empty_list());

        SetCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from("v")])
            .unwrap();
        let result = GetCommand.execute(&mut ctx, 0, &[Bytes::from("k")]).unwrap();
        assert_eq!(result, Reply::bulk("v"));
    }

    #[test]
    fn test_get_wrong_type() {
        let mut ctx = ctx();
        ctx.db_mut(0).set("l", Value::empty_list());
        let err = GetCommand.execute(&mut ctx, 0, &[Bytes::from("l")]).unwrap_err();
        assert!(matches!(err, EngineError::WrongType));
    }

    #[test]
    fn test_append_and_strlen() {
        let mut ctx = ctx();
        let r = AppendCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from("abc")])
            .unwrap();
        assert_eq!(r, Reply::int(3));

        let r = AppendCommand
            .execute(&mut ctx, 0, &[Bytes::from("k"), Bytes::from("de")])
            .unwrap();
        assert_eq!(r, Reply::int(5));

        let r = StrLenCommand.execute(&mut ctx, 0, &[Bytes::from("k")]).unwrap();
        assert_eq!(r, Reply::int(5));
        let r = StrLenCommand.execute(&mut ctx, 0, &[Bytes::from("none")]).unwrap();
        assert_eq!(r, Reply::int(0));
    }
}
