//! Bitmap commands (SETBIT, GETBIT, BITCOUNT)

use super::{parse_int, Command, CommandContext, Propagate};
use crate::error::EngineError;
use crate::reply::Reply;
use crate::store::Value;
use bytes::Bytes;

const MAX_BIT_OFFSET: u64 = 1 << 32;

fn parse_offset(arg: &Bytes) -> Result<u64, EngineError> {
    let offset = parse_int(arg)?;
    if offset < 0 || offset as u64 >= MAX_BIT_OFFSET {
        return Err(EngineError::BadArgument(
            "bit offset is not an integer or out of range".into(),
        ));
    }
    Ok(offset as u64)
}

/// SETBIT command - Set a single bit, growing the bitmap as needed
///
/// Syntax: SETBIT key offset value
///
/// Returns the previous bit value. Offsets are capped at 2^32 bits.
pub struct SetBitCommand;

impl Command for SetBitCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let offset = parse_offset(&args[1])?;
        let bit = match parse_int(&args[2])? {
            0 => false,
            1 => true,
            _ => {
                return Err(EngineError::BadArgument(
                    "bit is not an integer or out of range".into(),
                ))
            }
        };

        let now = ctx.now;
        let store = ctx.db_mut(db);
        if let Some(value) = store.get(&args[0], now) {
            if value.as_bitmap().is_none() {
                return Err(EngineError::WrongType);
            }
        }

        let value = store.get_or_insert_with(&args[0], now, Value::empty_bitmap);
        let bytes = value.as_bitmap_mut().ok_or(EngineError::WrongType)?;

        let byte_index = (offset / 8) as usize;
        let bit_index = (offset % 8) as u32;
        if byte_index >= bytes.len() {
            bytes.resize(byte_index + 1, 0);
        }
        let mask = 1u8 << bit_index;
        let old = bytes[byte_index] & mask != 0;
        if bit {
            bytes[byte_index] |= mask;
        } else {
            bytes[byte_index] &= !mask;
        }
        if old == bit {
            ctx.propagate = Propagate::Skip;
        }
        Ok(Reply::int(old as i64))
    }

    fn name(&self) -> &'static str {
        "SETBIT"
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

/// GETBIT command - Read a single bit
///
/// Syntax: GETBIT key offset
///
/// Bits beyond the stored length read as zero.
pub struct GetBitCommand;

impl Command for GetBitCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let offset = parse_offset(&args[1])?;
        let now = ctx.now;

        let Some(value) = ctx.db_mut(db).get(&args[0], now) else {
            return Ok(Reply::int(0));
        };
        let bytes = value.as_bitmap().ok_or(EngineError::WrongType)?;

        let byte_index = (offset / 8) as usize;
        let bit_index = (offset % 8) as u32;
        let bit = bytes
            .get(byte_index)
            .map(|byte| byte & (1u8 << bit_index) != 0)
            .unwrap_or(false);
        Ok(Reply::int(bit as i64))
    }

    fn name(&self) -> &'static str {
        "GETBIT"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

/// BITCOUNT command - Population count, optionally over a byte range
///
/// Syntax: BITCOUNT key [start end]
///
/// start/end are inclusive byte indexes; negatives count from the end.
pub struct BitCountCommand;

impl Command for BitCountCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        if args.len() == 2 {
            return Err(EngineError::Arity("BITCOUNT".into()));
        }
        let bounds = if args.len() == 3 {
            Some((parse_int(&args[1])?, parse_int(&args[2])?))
        } else {
            None
        };

        let now = ctx.now;
        let Some(value) = ctx.db_mut(db).get(&args[0], now) else {
            return Ok(Reply::int(0));
        };
        let bytes = value.as_bitmap().ok_or(EngineError::WrongType)?;

        let slice = match bounds {
            None => &bytes[..],
            Some((start, end)) => match super::clamp_range(bytes.len(), start, end) {
                Some((start, end)) => &bytes[start..=end],
                None => return Ok(Reply::int(0)),
            },
        };
        let count: u32 = slice.iter().map(|byte| byte.count_ones()).sum();
        Ok(Reply::int(count as i64))
    }

    fn name(&self) -> &'static str {
        "BITCOUNT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn max_args(&self) -> Option<usize> {
        Some(3)
    }
}
