//! List commands (LPUSH, RPUSH, LPOP, RPOP, LRANGE, LLEN)

use super::{clamp_range, parse_int, Command, CommandContext, Propagate};
use crate::error::EngineError;
use crate::reply::Reply;
use crate::store::Value;
use bytes::Bytes;

/// LPUSH command - Push values onto the head of a list
///
/// Syntax: LPUSH key value [value ...]
pub struct LPushCommand;

impl Command for LPushCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        push(ctx, db, args, true)
    }

    fn name(&self) -> &'static str {
        "LPUSH"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn writes(&self) -> bool {
        true
    }
}

/// RPUSH command - Push values onto the tail of a list
///
/// Syntax: RPUSH key value [value ...]
pub struct RPushCommand;

impl Command for RPushCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        push(ctx, db, args, false)
    }

    fn name(&self) -> &'static str {
        "RPUSH"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn writes(&self) -> bool {
        true
    }
}

fn push(
    ctx: &mut CommandContext,
    db: usize,
    args: &[Bytes],
    front: bool,
) -> Result<Reply, EngineError> {
    let now = ctx.now;
    let store = ctx.db_mut(db);

    // type check before creating anything
    if let Some(value) = store.get(&args[0], now) {
        if value.as_list().is_none() {
            return Err(EngineError::WrongType);
        }
    }

    let value = store.get_or_insert_with(&args[0], now, Value::empty_list);
    let list = value.as_list_mut().ok_or(EngineError::WrongType)?;
    for item in &args[1..] {
        if front {
            list.push_front(item.clone());
        } else {
            list.push_back(item.clone());
        }
    }
    Ok(Reply::int(list.len() as i64))
}

/// LPOP command - Remove and return the head of a list
///
/// Syntax: LPOP key
pub struct LPopCommand;

impl Command for LPopCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        pop(ctx, db, args, true)
    }

    fn name(&self) -> &'static str {
        "LPOP"
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

/// RPOP command - Remove and return the tail of a list
///
/// Syntax: RPOP key
pub struct RPopCommand;

impl Command for RPopCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        pop(ctx, db, args, false)
    }

    fn name(&self) -> &'static str {
        "RPOP"
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

fn pop(
    ctx: &mut CommandContext,
    db: usize,
    args: &[Bytes],
    front: bool,
) -> Result<Reply, EngineError> {
    let now = ctx.now;
    let store = ctx.db_mut(db);

    let Some(value) = store.get_mut(&args[0], now) else {
        ctx.propagate = Propagate::Skip;
        return Ok(Reply::nil());
    };
    let list = value.as_list_mut().ok_or(EngineError::WrongType)?;

    let popped = if front {
        list.pop_front()
    } else {
        list.pop_back()
    };
    let emptied = list.is_empty();

    match popped {
        Some(item) => {
            // a container never lingers empty
            if emptied {
                store.delete(&args[0], now);
            }
            Ok(Reply::bulk(item))
        }
        None => {
            store.delete(&args[0], now);
            ctx.propagate = Propagate::Skip;
            Ok(Reply::nil())
        }
    }
}

/// LRANGE command - Slice of a list by inclusive indexes
///
/// Syntax: LRANGE key start stop
///
/// Negative indexes count from the tail; -1 is the last element.
pub struct LRangeCommand;

impl Command for LRangeCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let start = parse_int(&args[1])?;
        let stop = parse_int(&args[2])?;
        let now = ctx.now;

        let Some(value) = ctx.db_mut(db).get(&args[0], now) else {
            return Ok(Reply::array(Vec::new()));
        };
        let list = value.as_list().ok_or(EngineError::WrongType)?;

        let Some((start, stop)) = clamp_range(list.len(), start, stop) else {
            return Ok(Reply::array(Vec::new()));
        };
        let items = list
            .iter()
            .skip(start)
            .take(stop - start + 1)
            .cloned()
            .map(Reply::bulk)
            .collect();
        Ok(Reply::array(items))
    }

    fn name(&self) -> &'static str {
        "LRANGE"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }
}

/// LLEN command - Length of a list
///
/// Syntax: LLEN key
pub struct LLenCommand;

impl Command for LLenCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let list = value.as_list().ok_or(EngineError::WrongType)?;
                Ok(Reply::int(list.len() as i64))
            }
            None => Ok(Reply::int(0)),
        }
    }

    fn name(&self) -> &'static str {
        "LLEN"
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

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_push_order() {
        let mut ctx = CommandContext::new(1, 16);
        RPushCommand
            .execute(&mut ctx, 0, &[b("l"), b("b"), b("c")])
            .unwrap();
        let r = LPushCommand.execute(&mut ctx, 0, &[b("l"), b("a")]).unwrap();
        assert_eq!(r, Reply::int(3));

        let r = LRangeCommand
            .execute(&mut ctx, 0, &[b("l"), b("0"), b("-1")])
            .unwrap();
        assert_eq!(
            r,
            Reply::array(vec![Reply::bulk("a"), Reply::bulk("b"), Reply::bulk("c")])
        );
    }

    #[test]
    fn test_pop_both_ends() {
        let mut ctx = CommandContext::new(1, 16);
        RPushCommand
            .execute(&mut ctx, 0, &[b("l"), b("a"), b("b"), b("c")])
            .unwrap();

        let r = LPopCommand.execute(&mut ctx, 0, &[b("l")]).unwrap();
        assert_eq!(r, Reply::bulk("a"));
        let r = RPopCommand.execute(&mut ctx, 0, &[b("l")]).unwrap();
        assert_eq!(r, Reply::bulk("c"));
    }

    #[test]
    fn test_pop_last_element_removes_key() {
        let mut ctx = CommandContext::new(1, 16);
        RPushCommand.execute(&mut ctx, 0, &[b("l"), b("only")]).unwrap();
        LPopCommand.execute(&mut ctx, 0, &[b("l")]).unwrap();
        assert!(!ctx.db_mut(0).exists(&b("l"), 0));
    }

    #[test]
    fn test_pop_missing_is_nil_and_skips() {
        let mut ctx = CommandContext::new(1, 16);
        let r = LPopCommand.execute(&mut ctx, 0, &[b("l")]).unwrap();
        assert!(r.is_nil());
        assert_eq!(ctx.propagate, Propagate::Skip);
    }

    #[test]
    fn test_wrong_type_rejected_without_change() {
        let mut ctx = CommandContext::new(1, 16);
        ctx.db_mut(0).set("s", Value::string("v"));

        let err = LPushCommand.execute(&mut ctx, 0, &[b("s"), b("x")]).unwrap_err();
        assert!(matches!(err, EngineError::WrongType));
        // original value untouched
        assert_eq!(
            ctx.db_mut(0).get(&b("s"), 0).unwrap().as_string().unwrap(),
            &Bytes::from("v")
        );
    }

    #[test]
    fn test_lrange_negative_indexes() {
        let mut ctx = CommandContext::new(1, 16);
        RPushCommand
            .execute(&mut ctx, 0, &[b("l"), b("a"), b("b"), b("c"), b("d")])
            .unwrap();

        let r = LRangeCommand
            .execute(&mut ctx, 0, &[b("l"), b("-2"), b("-1")])
            .unwrap();
        assert_eq!(r, Reply::array(vec![Reply::bulk("c"), Reply::bulk("d")]));

        let r = LRangeCommand
            .execute(&mut ctx, 0, &[b("l"), b("3"), b("1")])
            .unwrap();
        assert_eq!(r, Reply::array(Vec::new()));
    }

    #[test]
    fn test_llen() {
        let mut ctx = CommandContext::new(1, 16);
        assert_eq!(
            LLenCommand.execute(&mut ctx, 0, &[b("l")]).unwrap(),
            Reply::int(0)
        );
        RPushCommand.execute(&mut ctx, 0, &[b("l"), b("a")]).unwrap();
        assert_eq!(
            LLenCommand.execute(&mut ctx, 0, &[b("l")]).unwrap(),
            Reply::int(1)
        );
    }
}
