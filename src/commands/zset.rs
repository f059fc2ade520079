//! Sorted set commands (ZADD, ZRANGE, ZREVRANGE, ZRANK, ZREVRANK,
//! ZSCORE, ZCARD, ZCOUNT, ZREM, ZINCRBY)
//!
//! Ordering is by (score, member); equal scores tie-break on the member
//! bytes so every ranked query is deterministic.

use super::{parse_float, parse_int, Command, CommandContext, Propagate};
use crate::error::EngineError;
use crate::reply::Reply;
use crate::store::Value;
use bytes::Bytes;

/// Render a score the way it was stored: integral values lose the
/// trailing ".0".
fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.is_finite() {
        format!("{}", score as i64)
    } else {
        format!("{}", score)
    }
}

/// ZADD command - Add or update scored members
///
/// Syntax: ZADD key score member [score member ...]
///
/// Returns the number of members newly added (updates count zero).
pub struct ZAddCommand;

impl Command for ZAddCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        if args[1..].len() % 2 != 0 {
            return Err(EngineError::Arity("ZADD".into()));
        }
        // validate every score before touching the set
        let mut pairs = Vec::with_capacity(args[1..].len() / 2);
        for chunk in args[1..].chunks_exact(2) {
            pairs.push((parse_float(&chunk[0])?, chunk[1].clone()));
        }

        let now = ctx.now;
        let store = ctx.db_mut(db);
        if let Some(value) = store.get(&args[0], now) {
            if value.as_sorted_set().is_none() {
                return Err(EngineError::WrongType);
            }
        }

        let value = store.get_or_insert_with(&args[0], now, Value::empty_sorted_set);
        let zset = value.as_sorted_set_mut().ok_or(EngineError::WrongType)?;
        let mut added = 0;
        for (score, member) in pairs {
            if zset.insert(member, score) {
                added += 1;
            }
        }
        Ok(Reply::int(added))
    }

    fn name(&self) -> &'static str {
        "ZADD"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn writes(&self) -> bool {
        true
    }
}

/// ZRANGE command - Members by ascending rank
///
/// Syntax: ZRANGE key start stop [WITHSCORES]
pub struct ZRangeCommand;

impl Command for ZRangeCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        ranged(ctx, db, args, false)
    }

    fn name(&self) -> &'static str {
        "ZRANGE"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(4)
    }
}

/// ZREVRANGE command - Members by descending rank
///
/// Syntax: ZREVRANGE key start stop [WITHSCORES]
pub struct ZRevRangeCommand;

impl Command for ZRevRangeCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        ranged(ctx, db, args, true)
    }

    fn name(&self) -> &'static str {
        "ZREVRANGE"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(4)
    }
}

fn ranged(
    ctx: &mut CommandContext,
    db: usize,
    args: &[Bytes],
    rev: bool,
) -> Result<Reply, EngineError> {
    let start = parse_int(&args[1])?;
    let stop = parse_int(&args[2])?;
    let with_scores = match args.get(3) {
        None => false,
        Some(flag) if flag.eq_ignore_ascii_case(b"WITHSCORES") => true,
        Some(_) => {
            return Err(EngineError::BadArgument("syntax error".into()));
        }
    };

    let now = ctx.now;
    let Some(value) = ctx.db_mut(db).get(&args[0], now) else {
        return Ok(Reply::array(Vec::new()));
    };
    let zset = value.as_sorted_set().ok_or(EngineError::WrongType)?;

    let slice = if rev {
        zset.rev_range(start, stop)
    } else {
        zset.range(start, stop)
    };
    let mut items = Vec::with_capacity(slice.len() * if with_scores { 2 } else { 1 });
    for (member, score) in slice {
        items.push(Reply::bulk(member));
        if with_scores {
            items.push(Reply::bulk(format_score(score)));
        }
    }
    Ok(Reply::array(items))
}

/// ZRANK command - Ascending rank of a member
///
/// Syntax: ZRANK key member
pub struct ZRankCommand;

impl Command for ZRankCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        rank(ctx, db, args, false)
    }

    fn name(&self) -> &'static str {
        "ZRANK"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// ZREVRANK command - Descending rank of a member
///
/// Syntax: ZREVRANK key member
pub struct ZRevRankCommand;

impl Command for ZRevRankCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        rank(ctx, db, args, true)
    }

    fn name(&self) -> &'static str {
        "ZREVRANK"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

fn rank(
    ctx: &mut CommandContext,
    db: usize,
    args: &[Bytes],
    rev: bool,
) -> Result<Reply, EngineError> {
    let now = ctx.now;
    let Some(value) = ctx.db_mut(db).get(&args[0], now) else {
        return Ok(Reply::nil());
    };
    let zset = value.as_sorted_set().ok_or(EngineError::WrongType)?;
    let found = if rev {
        zset.rev_rank(&args[1])
    } else {
        zset.rank(&args[1])
    };
    Ok(found.map(|r| Reply::int(r as i64)).unwrap_or(Reply::Nil))
}

/// ZSCORE command - Score of a member
///
/// Syntax: ZSCORE key member
pub struct ZScoreCommand;

impl Command for ZScoreCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        let Some(value) = ctx.db_mut(db).get(&args[0], now) else {
            return Ok(Reply::nil());
        };
        let zset = value.as_sorted_set().ok_or(EngineError::WrongType)?;
        Ok(zset
            .score(&args[1])
            .map(|s| Reply::bulk(format_score(s)))
            .unwrap_or(Reply::Nil))
    }

    fn name(&self) -> &'static str {
        "ZSCORE"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// ZCARD command - Cardinality of a sorted set
///
/// Syntax: ZCARD key
pub struct ZCardCommand;

impl Command for ZCardCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let zset = value.as_sorted_set().ok_or(EngineError::WrongType)?;
                Ok(Reply::int(zset.len() as i64))
            }
            None => Ok(Reply::int(0)),
        }
    }

    fn name(&self) -> &'static str {
        "ZCARD"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// ZCOUNT command - Members with score inside an inclusive range
///
/// Syntax: ZCOUNT key min max
pub struct ZCountCommand;

impl Command for ZCountCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let min = parse_float(&args[1])?;
        let max = parse_float(&args[2])?;
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let zset = value.as_sorted_set().ok_or(EngineError::WrongType)?;
                Ok(Reply::int(zset.count_in_range(min, max) as i64))
            }
            None => Ok(Reply::int(0)),
        }
    }

    fn name(&self) -> &'static str {
        "ZCOUNT"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }
}

/// ZREM command - Remove members from a sorted set
///
/// Syntax: ZREM key member [member ...]
pub struct ZRemCommand;

impl Command for ZRemCommand {
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
        let zset = value.as_sorted_set_mut().ok_or(EngineError::WrongType)?;

        let mut removed = 0;
        for member in &args[1..] {
            if zset.remove(member) {
                removed += 1;
            }
        }
        let emptied = zset.is_empty();
        if emptied {
            store.delete(&args[0], now);
        }
        if removed == 0 {
            ctx.propagate = Propagate::Skip;
        }
        Ok(Reply::int(removed))
    }

    fn name(&self) -> &'static str {
        "ZREM"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn writes(&self) -> bool {
        true
    }
}

/// ZINCRBY command - Add a delta to a member's score
///
/// Syntax: ZINCRBY key delta member
///
/// A missing member starts at zero. Returns the new score as bulk text.
pub struct ZIncrByCommand;

impl Command for ZIncrByCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let delta = parse_float(&args[1])?;
        let now = ctx.now;
        let store = ctx.db_mut(db);

        if let Some(value) = store.get(&args[0], now) {
            if value.as_sorted_set().is_none() {
                return Err(EngineError::WrongType);
            }
        }

        let value = store.get_or_insert_with(&args[0], now, Value::empty_sorted_set);
        let zset = value.as_sorted_set_mut().ok_or(EngineError::WrongType)?;
        let next = zset.increment(args[2].clone(), delta);
        Ok(Reply::bulk(format_score(next)))
    }

    fn name(&self) -> &'static str {
        "ZINCRBY"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }

    fn writes(&self) -> bool {
        true
    }
}
