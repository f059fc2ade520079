//! Stream commands (XADD, XRANGE, XLEN)

use super::{arg_str, Command, CommandContext, Propagate};
use crate::error::EngineError;
use crate::reply::Reply;
use crate::store::{StreamId, Value};
use bytes::Bytes;

/// XADD command - Append an entry to a stream
///
/// Syntax: XADD key id|* field value [field value ...]
///
/// With `*` the engine assigns the next id from its clock. The assigned
/// id replaces the `*` in the log, so replay and replication reproduce
/// the exact same entry.
pub struct XAddCommand;

impl Command for XAddCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        if args[2..].len() % 2 != 0 {
            return Err(EngineError::Arity("XADD".into()));
        }
        let fields: Vec<(Bytes, Bytes)> = args[2..]
            .chunks_exact(2)
            .map(|pair| (pair[0].clone(), pair[1].clone()))
            .collect();

        let id_arg = arg_str(&args[1])?;
        let explicit = if id_arg == "*" {
            None
        } else {
            Some(
                id_arg
                    .parse::<StreamId>()
                    .map_err(EngineError::BadArgument)?,
            )
        };

        let now = ctx.now;
        let store = ctx.db_mut(db);
        if let Some(value) = store.get(&args[0], now) {
            if value.as_stream().is_none() {
                return Err(EngineError::WrongType);
            }
        }

        let value = store.get_or_insert_with(&args[0], now, Value::empty_stream);
        let stream = value.as_stream_mut().ok_or(EngineError::WrongType)?;

        let id = match explicit {
            Some(id) => {
                stream
                    .append(id, fields)
                    .map_err(EngineError::BadArgument)?;
                id
            }
            None => {
                let id = stream.append_auto(now, fields);
                let mut logged = vec![args[0].clone(), Bytes::from(id.to_string())];
                logged.extend_from_slice(&args[2..]);
                ctx.propagate = Propagate::As("XADD", logged);
                id
            }
        };
        Ok(Reply::bulk(id.to_string()))
    }

    fn name(&self) -> &'static str {
        "XADD"
    }

    fn min_args(&self) -> usize {
        4
    }

    fn writes(&self) -> bool {
        true
    }
}

/// XRANGE command - Entries with ids inside an inclusive range
///
/// Syntax: XRANGE key start end
///
/// `-` and `+` stand for the smallest and largest possible id. Each
/// entry is [id, [field, value, ...]].
pub struct XRangeCommand;

impl Command for XRangeCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let start = parse_bound(&args[1], StreamId::MIN)?;
        let end = parse_bound(&args[2], StreamId::MAX)?;
        let now = ctx.now;

        let Some(value) = ctx.db_mut(db).get(&args[0], now) else {
            return Ok(Reply::array(Vec::new()));
        };
        let stream = value.as_stream().ok_or(EngineError::WrongType)?;

        let entries = stream
            .range(start, end)
            .into_iter()
            .map(|entry| {
                let mut fields = Vec::with_capacity(entry.fields.len() * 2);
                for (field, val) in &entry.fields {
                    fields.push(Reply::bulk(field.clone()));
                    fields.push(Reply::bulk(val.clone()));
                }
                Reply::array(vec![
                    Reply::bulk(entry.id.to_string()),
                    Reply::array(fields),
                ])
            })
            .collect();
        Ok(Reply::array(entries))
    }

    fn name(&self) -> &'static str {
        "XRANGE"
    }

    fn min_args(&self) -> usize {
        3
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }
}

fn parse_bound(arg: &Bytes, open: StreamId) -> Result<StreamId, EngineError> {
    let s = arg_str(arg)?;
    if s == "-" || s == "+" {
        return Ok(open);
    }
    s.parse::<StreamId>().map_err(EngineError::BadArgument)
}

/// XLEN command - Number of entries in a stream
///
/// Syntax: XLEN key
pub struct XLenCommand;

impl Command for XLenCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let now = ctx.now;
        match ctx.db_mut(db).get(&args[0], now) {
            Some(value) => {
                let stream = value.as_stream().ok_or(EngineError::WrongType)?;
                Ok(Reply::int(stream.len() as i64))
            }
            None => Ok(Reply::int(0)),
        }
    }

    fn name(&self) -> &'static str {
        "XLEN"
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
    fn test_xadd_auto_id_rewrites_propagation() {
        let mut ctx = CommandContext::new(1, 16);
        ctx.now = 1234;

        let r = XAddCommand
            .execute(&mut ctx, 0, &[b("s"), b("*"), b("f"), b("v")])
            .unwrap();
        assert_eq!(r, Reply::bulk("1234-0"));
        assert_eq!(
            ctx.propagate,
            Propagate::As("XADD", vec![b("s"), b("1234-0"), b("f"), b("v")])
        );

        // same millisecond bumps the sequence
        let r = XAddCommand
            .execute(&mut ctx, 0, &[b("s"), b("*"), b("f"), b("v2")])
            .unwrap();
        assert_eq!(r, Reply::bulk("1234-1"));
    }

    #[test]
    fn test_xadd_explicit_id_must_increase() {
        let mut ctx = CommandContext::new(1, 16);
        XAddCommand
            .execute(&mut ctx, 0, &[b("s"), b("5-0"), b("f"), b("v")])
            .unwrap();

        let err = XAddCommand
            .execute(&mut ctx, 0, &[b("s"), b("5-0"), b("f"), b("v")])
            .unwrap_err();
        assert!(matches!(err, EngineError::BadArgument(_)));

        let r = XAddCommand
            .execute(&mut ctx, 0, &[b("s"), b("5-1"), b("f"), b("v")])
            .unwrap();
        assert_eq!(r, Reply::bulk("5-1"));
    }

    #[test]
    fn test_xadd_odd_fields_is_arity_error() {
        let mut ctx = CommandContext::new(1, 16);
        assert!(matches!(
            XAddCommand.execute(&mut ctx, 0, &[b("s"), b("*"), b("f"), b("v"), b("g")]),
            Err(EngineError::Arity(_))
        ));
    }

    #[test]
    fn test_xrange_bounds() {
        let mut ctx = CommandContext::new(1, 16);
        for (id, val) in [("1-0", "a"), ("2-0", "b"), ("3-0", "c")] {
            XAddCommand
                .execute(&mut ctx, 0, &[b("s"), b(id), b("f"), b(val)])
                .unwrap();
        }

        let r = XRangeCommand
            .execute(&mut ctx, 0, &[b("s"), b("2"), b("+")])
            .unwrap();
        let entries = r.as_array().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(
            entries[0],
            Reply::array(vec![
                Reply::bulk("2-0"),
                Reply::array(vec![Reply::bulk("f"), Reply::bulk("b")]),
            ])
        );

        let r = XRangeCommand
            .execute(&mut ctx, 0, &[b("missing"), b("-"), b("+")])
            .unwrap();
        assert_eq!(r, Reply::array(Vec::new()));
    }

    #[test]
    fn test_xlen() {
        let mut ctx = CommandContext::new(1, 16);
        assert_eq!(
            XLenCommand.execute(&mut ctx, 0, &[b("s")]).unwrap(),
            Reply::int(0)
        );
        XAddCommand
            .execute(&mut ctx, 0, &[b("s"), b("1-0"), b("f"), b("v")])
            .unwrap();
        assert_eq!(
            XLenCommand.execute(&mut ctx, 0, &[b("s")]).unwrap(),
            Reply::int(1)
        );
    }
}
