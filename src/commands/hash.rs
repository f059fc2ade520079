//! Hash commands (HSET, HGET, HGETALL, HDEL, HEXISTS, HKEYS, HINCRBY)

use super::{parse_int, Command, CommandContext, Propagate};
use crate::error::EngineError;
use crate::reply::Reply;
use crate::store::Value;
use bytes::Bytes;

/// HSET command - Set one or more field/value pairs on a hash
///
/// Syntax: HSET key field value [field value ...]
///
/// Returns the number of fields that were newly created.
pub struct HSetCommand;

impl Command for HSetCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        if args[1..].len() % 2 != 0 {
            return Err(EngineError::Arity("HSET".into()));
        }
        let now = ctx.now;
        let store = ctx.db_mut(db);

        if let Some(value) = store.get(&args[0], now) {
            if value.as_hash().is_none() {
                return Err(EngineError::WrongType);
            }
        }

        let value = store.get_or_insert_with(&args[0], now, Value::empty_hash);
        let hash = value.as_hash_mut().ok_or(EngineError::WrongType)?;
        let mut created = 0;
        for pair in args[1..].chunks_exact(2) {
            if hash.insert(pair[0].clone(), pair[1].clone()).is_none() {
                created += 1;
            }
        }
        Ok(Reply::int(created))
    }

    fn name(&self) -> &'static str {
        "HSET"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn writes(&self) -> bool {
        true
    }
}

/// HGET command - Value of a single hash field
///
/// Syntax: HGET key field
pub struct HGetCommand;

impl Command for HGetCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let hash = value.as_hash().ok_or(EngineError::WrongType)?;
                Ok(hash
                    .get(&args[1])
                    .map(|v| Reply::bulk(v.clone()))
                    .unwrap_or(Reply::Nil))
            }
            None => Ok(Reply::nil()),
        }
    }

    fn name(&self) -> &'static str {
        "HGET"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// HGETALL command - All field/value pairs, flattened
///
/// Syntax: HGETALL key
///
/// Pairs are sorted by field so replies are stable across runs.
pub struct HGetAllCommand;

impl Command for HGetAllCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let hash = value.as_hash().ok_or(EngineError::WrongType)?;
                let mut pairs: Vec<(&Bytes, &Bytes)> = hash.iter().collect();
                pairs.sort_by_key(|(field, _)| (*field).clone());
                let mut items = Vec::with_capacity(pairs.len() * 2);
                for (field, val) in pairs {
                    items.push(Reply::bulk(field.clone()));
                    items.push(Reply::bulk(val.clone()));
                }
                Ok(Reply::array(items))
            }
            None => Ok(Reply::array(Vec::new())),
        }
    }

    fn name(&self) -> &'static str {
        "HGETALL"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// HDEL command - Remove fields from a hash
///
/// Syntax: HDEL key field [field ...]
pub struct HDelCommand;

impl Command for HDelCommand {
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
        let hash = value.as_hash_mut().ok_or(EngineError::WrongType)?;

        let mut removed = 0;
        for field in &args[1..] {
            if hash.remove(field).is_some() {
                removed += 1;
            }
        }
        let emptied = hash.is_empty();
        if emptied {
            store.delete(&args[0], now);
        }
        if removed == 0 {
            ctx.propagate = Propagate::Skip;
        }
        Ok(Reply::int(removed))
    }

    fn name(&self) -> &'static str {
        "HDEL"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn writes(&self) -> bool {
        true
    }
}

/// HEXISTS command - Field presence test
///
/// Syntax: HEXISTS key field
pub struct HExistsCommand;

impl Command for HExistsCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let hash = value.as_hash().ok_or(EngineError::WrongType)?;
                Ok(Reply::int(hash.contains_key(&args[1]) as i64))
            }
            None => Ok(Reply::int(0)),
        }
    }

    fn name(&self) -> &'static str {
        "HEXISTS"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// HKEYS command - All field names, sorted
///
/// Syntax: HKEYS key
pub struct HKeysCommand;

impl Command for HKeysCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let hash = value.as_hash().ok_or(EngineError::WrongType)?;
                let mut fields: Vec<Bytes> = hash.keys().cloned().collect();
                fields.sort();
                Ok(Reply::array(fields.into_iter().map(Reply::bulk).collect()))
            }
            None => Ok(Reply::array(Vec::new())),
        }
    }

    fn name(&self) -> &'static str {
        "HKEYS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(1)
    }
}

/// HINCRBY command - Add a signed delta to an integer hash field
///
/// Syntax: HINCRBY key field delta
///
/// A missing field starts at zero. A non-integer field value is a type
/// error, not a parse error.
pub struct HIncrByCommand;

impl Command for HIncrByCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let delta = parse_int(&args[2])?;
        let now = ctx.now;
        let store = ctx.db_mut(db);

        if let Some(value) = store.get(&args[0], now) {
            if value.as_hash().is_none() {
                return Err(EngineError::WrongType);
            }
        }

        let value = store.get_or_insert_with(&args[0], now, Value::empty_hash);
        let hash = value.as_hash_mut().ok_or(EngineError::WrongType)?;

        let current = match hash.get(&args[1]) {
            Some(raw) => std::str::from_utf8(raw)
                .ok()
                .and_then(|s| s.parse::<i64>().ok())
                .ok_or(EngineError::WrongType)?,
            None => 0,
        };
        let next = current.checked_add(delta).ok_or_else(|| {
            EngineError::BadArgument("increment or decrement would overflow".into())
        })?;
        hash.insert(args[1].clone(), Bytes::from(next.to_string()));
        Ok(Reply::int(next))
    }

    fn name(&self) -> &'static str {
        "HINCRBY"
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

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_hset_multi_and_created_count() {
        let mut ctx = CommandContext::new(1, 16);
        let r = HSetCommand
            .execute(&mut ctx, 0, &[b("h"), b("f1"), b("v1"), b("f2"), b("v2")])
            .unwrap();
        assert_eq!(r, Reply::int(2));

        // overwrite counts zero, new field counts one
        let r = HSetCommand
            .execute(&mut ctx, 0, &[b("h"), b("f1"), b("x"), b("f3"), b("v3")])
            .unwrap();
        assert_eq!(r, Reply::int(1));
    }

    #[test]
    fn test_hset_odd_pairs_is_arity_error() {
        let mut ctx = CommandContext::new(1, 16);
        assert!(matches!(
            HSetCommand.execute(&mut ctx, 0, &[b("h"), b("f1"), b("v1"), b("f2")]),
            Err(EngineError::Arity(_))
        ));
    }

    #[test]
    fn test_hget_hgetall() {
        let mut ctx = CommandContext::new(1, 16);
        HSetCommand
            .execute(&mut ctx, 0, &[b("h"), b("b"), b("2"), b("a"), b("1")])
            .unwrap();

        let r = HGetCommand.execute(&mut ctx, 0, &[b("h"), b("a")]).unwrap();
        assert_eq!(r, Reply::bulk("1"));
        let r = HGetCommand.execute(&mut ctx, 0, &[b("h"), b("z")]).unwrap();
        assert!(r.is_nil());

        let r = HGetAllCommand.execute(&mut ctx, 0, &[b("h")]).unwrap();
        assert_eq!(
            r,
            Reply::array(vec![
                Reply::bulk("a"),
                Reply::bulk("1"),
                Reply::bulk("b"),
                Reply::bulk("2"),
            ])
        );
    }

    #[test]
    fn test_hdel_empties_key() {
        let mut ctx = CommandContext::new(1, 16);
        HSetCommand
            .execute(&mut ctx, 0, &[b("h"), b("f"), b("v")])
            .unwrap();
        let r = HDelCommand.execute(&mut ctx, 0, &[b("h"), b("f")]).unwrap();
        assert_eq!(r, Reply::int(1));
        assert!(!ctx.db_mut(0).exists(&b("h"), 0));
    }

    #[test]
    fn test_hincrby() {
        let mut ctx = CommandContext::new(1, 16);
        let r = HIncrByCommand
            .execute(&mut ctx, 0, &[b("h"), b("n"), b("5")])
            .unwrap();
        assert_eq!(r, Reply::int(5));
        let r = HIncrByCommand
            .execute(&mut ctx, 0, &[b("h"), b("n"), b("-2")])
            .unwrap();
        assert_eq!(r, Reply::int(3));

        HSetCommand
            .execute(&mut ctx, 0, &[b("h"), b("txt"), b("abc")])
            .unwrap();
        assert!(matches!(
            HIncrByCommand.execute(&mut ctx, 0, &[b("h"), b("txt"), b("1")]),
            Err(EngineError::WrongType)
        ));
    }

    #[test]
    fn test_hkeys_hexists() {
        let mut ctx = CommandContext::new(1, 16);
        HSetCommand
            .execute(&mut ctx, 0, &[b("h"), b("z"), b("1"), b("a"), b("2")])
            .unwrap();

        let r = HKeysCommand.execute(&mut ctx, 0, &[b("h")]).unwrap();
        assert_eq!(r, Reply::array(vec![Reply::bulk("a"), Reply::bulk("z")]));

        let r = HExistsCommand.execute(&mut ctx, 0, &[b("h"), b("a")]).unwrap();
        assert_eq!(r, Reply::int(1));
        let r = HExistsCommand.execute(&mut ctx, 0, &[b("h"), b("q")]).unwrap();
        assert_eq!(r, Reply::int(0));
    }
}
