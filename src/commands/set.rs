//! Set commands (SADD, SREM, SMEMBERS, SISMEMBER, SCARD)

use super::{Command, CommandContext, Propagate};
use crate::error::EngineError;
use crate::reply::Reply;
use crate::store::Value;
use bytes::Bytes;

/// SADD command - Add members to a set
///
/// Syntax: SADD key member [member ...]
///
/// Returns the number of members actually added.
pub struct SAddCommand;

impl Command for SAddCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        let store = ctx.db_mut(db);

        if let Some(value) = store.get(&args[0], now) {
            if value.as_set().is_none() {
                return Err(EngineError::WrongType);
            }
        }

        let value = store.get_or_insert_with(&args[0], now, Value::empty_set);
        let set = value.as_set_mut().ok_or(EngineError::WrongType)?;
        let mut added = 0;
        for member in &args[1..] {
            if set.insert(member.clone()) {
                added += 1;
            }
        }
        if added == 0 {
            ctx.propagate = Propagate::Skip;
        }
        Ok(Reply::int(added))
    }

    fn name(&self) -> &'static str {
        "SADD"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn writes(&self) -> bool {
        true
    }
}

/// SREM command - Remove members from a set
///
/// Syntax: SREM key member [member ...]
pub struct SRemCommand;

impl Command for SRemCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        let store = ctx.db_mut(db);

        let Some(value) = store.get_mut(&args[0], now) else {
            ctx.propagate = Propagate::Skip;
            return Ok(Reply::int(0));
        };
        let set = value.as_set_mut().ok_or(EngineError::WrongType)?;

        let mut removed = 0;
        for member in &args[1..] {
            if set.remove(member) {
                removed += 1;
            }
        }
        let emptied = set.is_empty();
        if emptied {
            store.delete(&args[0], now);
        }
        if removed == 0 {
            ctx.propagate = Propagate::Skip;
        }
        Ok(Reply::int(removed))
    }

    fn name(&self) -> &'static str {
        "SREM"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn writes(&self) -> bool {
        true
    }
}

/// SMEMBERS command - All members of a set
///
/// Syntax: SMEMBERS key
///
/// Members are returned sorted so replies are stable across runs.
pub struct SMembersCommand;

impl Command for SMembersCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let set = value.as_set().ok_or(EngineError::WrongType)?;
                let mut members: Vec<Bytes> = set.iter().cloned().collect();
                members.sort();
                Ok(Reply::array(members.into_iter().map(Reply::bulk).collect()))
            }
            None => Ok(Reply::array(Vec::new())),
        }
    }

    fn name(&self) -> &'static str {
        "SMEMBERS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// SISMEMBER command - Membership test
///
/// Syntax: SISMEMBER key member
pub struct SIsMemberCommand;

impl Command for SIsMemberCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let set = value.as_set().ok_or(EngineError::WrongType)?;
                Ok(Reply::int(set.contains(&args[1]) as i64))
            }
            None => Ok(Reply::int(0)),
        }
    }

    fn name(&self) -> &'static str {
        "SISMEMBER"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// SCARD command - Cardinality of a set
///
/// Syntax: SCARD key
pub struct SCardCommand;

impl Command for SCardCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let set = value.as_set().ok_or(EngineError::WrongType)?;
                Ok(Reply::int(set.len() as i64))
            }
            None => Ok(Reply::int(0)),
        }
    }

    fn name(&self) -> &'static str {
        "SCARD"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}
