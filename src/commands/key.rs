//! Generic key commands (DEL, EXISTS, TYPE, KEYS, DBSIZE, FLUSHDB)

use super::{Command, CommandContext, Propagate};
use crate::error::EngineError;
use crate::reply::Reply;
use bytes::Bytes;

/// DEL command - Delete one or more keys
///
/// Syntax: DEL key [key ...]
pub struct DelCommand;

impl Command for DelCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        let store = ctx.db_mut(db);
        let mut deleted = 0;
        for key in args {
            if store.delete(key, now) {
                deleted += 1;
            }
        }
        if deleted == 0 {
            ctx.propagate = Propagate::Skip;
        }
        Ok(Reply::int(deleted))
    }

    fn name(&self) -> &'static str {
        "DEL"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn writes(&self) -> bool {
        true
    }
}

/// EXISTS command - Count how many of the given keys exist
///
/// Syntax: EXISTS key [key ...]
pub struct ExistsCommand;

impl Command for ExistsCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        let store = ctx.db_mut(db);
        let found = args.iter().filter(|key| store.exists(key, now)).count();
        Ok(Reply::int(found as i64))
    }

    fn name(&self) -> &'static str {
        "EXISTS"
    }

    fn min_args(&self) -> usize {
        1
    }
}

/// TYPE command - Variant name of the value stored at key
///
/// Syntax: TYPE key
pub struct TypeCommand;

impl Command for TypeCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => Ok(Reply::simple(value.type_name())),
            None => Ok(Reply::simple("none")),
        }
    }

    fn name(&self) -> &'static str {
        "TYPE"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// KEYS command - All live keys matching a glob pattern
///
/// Syntax: KEYS pattern
///
/// Expensive (full scan); replies are sorted for stable output.
pub struct KeysCommand;

impl Command for KeysCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        let mut keys: Vec<Bytes> = ctx
            .db_mut(db)
            .keys(now)
            .into_iter()
            .filter(|key| glob_match(&args[0], key))
            .collect();
        keys.sort();
        Ok(Reply::array(keys.into_iter().map(Reply::bulk).collect()))
    }

    fn name(&self) -> &'static str {
        "KEYS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// DBSIZE command - Number of live keys in the namespace
///
/// Syntax: DBSIZE
pub struct DbSizeCommand;

impl Command for DbSizeCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        _args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        let store = ctx.db_mut(db);
        Ok(Reply::int(store.live_len(now) as i64))
    }

    fn name(&self) -> &'static str {
        "DBSIZE"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }
}

/// FLUSHDB command - Remove every key in the namespace
///
/// Syntax: FLUSHDB
pub struct FlushDbCommand;

impl Command for FlushDbCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        _args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        ctx.db_mut(db).clear();
        Ok(Reply::ok())
    }

    fn name(&self) -> &'static str {
        "FLUSHDB"
    }

    fn max_args(&self) -> Option<usize> {
        Some(0)
    }

    fn writes(&self) -> bool {
        true
    }
}

/// Glob matching with `*` (any run) and `?` (any single byte).
fn glob_match(pattern: &[u8], text: &[u8]) -> bool {
    // iterative wildcard matching with backtracking on the last '*'
    let (mut p, mut t) = (0usize, 0usize);
    let (mut star_p, mut star_t) = (usize::MAX, 0usize);

    while t < text.len() {
        if p < pattern.len() && (pattern[p] == b'?' || pattern[p] == text[t]) {
            p += 1;
            t += 1;
        } else if p < pattern.len() && pattern[p] == b'*' {
            star_p = p;
            star_t = t;
            p += 1;
        } else if star_p != usize::MAX {
            p = star_p + 1;
            star_t += 1;
            t = star_t;
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == b'*' {
        p += 1;
    }
    p == pattern.len()
}
