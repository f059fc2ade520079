//! Log record format
//!
//! Binary layout: [sequence(u64)] [db(u32)] [name_len(u16)] [name]
//! [argc(u32)] ([arg_len(u32)] [arg_bytes])* [checksum(u64)]
//!
//! One record per committed mutating command, in commit order. The same
//! record is the unit of AOF persistence and of the replication stream.

use bytes::Bytes;

/// A committed mutating command.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    /// Strictly increasing, gap-free per engine instance
    pub sequence: u64,
    /// Database namespace index
    pub db: u32,
    /// Command name, uppercase
    pub name: String,
    /// Argument list as passed to the dispatcher
    pub args: Vec<Bytes>,
}

impl LogRecord {
    /// Create a new record
    pub fn new(sequence: u64, db: u32, name: impl Into<String>, args: Vec<Bytes>) -> Self {
        LogRecord {
            sequence,
            db,
            name: name.into(),
            args,
        }
    }

    /// Serialize to bytes with trailing checksum
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();

        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&self.db.to_le_bytes());

        let name = self.name.as_bytes();
        buf.extend_from_slice(&(name.len() as u16).to_le_bytes());
        buf.extend_from_slice(name);

        buf.extend_from_slice(&(self.args.len() as u32).to_le_bytes());
        for arg in &self.args {
            buf.extend_from_slice(&(arg.len() as u32).to_le_bytes());
            buf.extend_from_slice(arg);
        }

        // Checksum of all preceding bytes
        let checksum = xxhash_rust::xxh64::xxh64(&buf, 0);
        buf.extend_from_slice(&checksum.to_le_bytes());

        buf
    }

    /// Deserialize one record from the front of `data`, verifying the
    /// checksum. Returns the record and the number of bytes consumed.
    pub fn from_bytes(data: &[u8]) -> Result<(Self, usize), String> {
        // Minimum: 8 (seq) + 4 (db) + 2 (name_len) + 4 (argc) + 8 (checksum)
        if data.len() < 26 {
            return Err("truncated record header".to_string());
        }

        let mut pos = 0;

        let sequence = u64::from_le_bytes(data[pos..pos + 8].try_into().unwrap());
        pos += 8;

        let db = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap());
        pos += 4;

        let name_len = u16::from_le_bytes(data[pos..pos + 2].try_into().unwrap()) as usize;
        pos += 2;

        if pos + name_len > data.len() {
            return Err("truncated command name".to_string());
        }
        let name = std::str::from_utf8(&data[pos..pos + name_len])
            .map_err(|_| "command name is not valid UTF-8".to_string())?
            .to_string();
        pos += name_len;

        if pos + 4 > data.len() {
            return Err("truncated argument count".to_string());
        }
        let argc = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;

        let mut args = Vec::with_capacity(argc);
        for _ in 0..argc {
            if pos + 4 > data.len() {
                return Err("truncated argument length".to_string());
            }
            let len = u32::from_le_bytes(data[pos..pos + 4].try_into().unwrap()) as usize;
            pos += 4;

            if pos + len > data.len() {
                return Err("truncated argument payload".to_string());
            }
            args.push(Bytes::copy_from_slice(&data[pos..pos + len]));
            pos += len;
        }

        if pos + 8 > data.len() {
            return Err("missing checksum".to_string());
        }
        let stored = u64::from_le_bytes(data[pos..pos + 8].try_into().unwrap());
        let computed = xxhash_rust::xxh64::xxh64(&data[..pos], 0);
        pos += 8;

        if stored != computed {
            return Err(format!(
                "checksum mismatch: stored {:#x}, computed {:#x}",
                stored, computed
            ));
        }

        Ok((
            LogRecord {
                sequence,
                db,
                name,
                args,
            },
            pos,
        ))
    }
}
