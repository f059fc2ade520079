//! Snapshot binary format
//!
//! Layout: [magic "CPDB"] [version(u8)] [sequence(u64)] [db_count(u32)]
//! then per database [key_count(u64)] followed by its entries, and a
//! trailing xxh64 checksum of everything before it.
//!
//! Entry: [key] [expiry flag(u8)] [expiry(u64) if set] [value].
//! Value: [tag(u8)] + variant payload; byte strings are u32
//! length-prefixed throughout.

use crate::store::{Entry, MemoryStore, SortedSet, Stream, StreamId, Value};
use bytes::Bytes;

const MAGIC: &[u8; 4] = b"CPDB";
const VERSION: u8 = 1;

const TAG_STRING: u8 = 1;
const TAG_LIST: u8 = 2;
const TAG_SET: u8 = 3;
const TAG_HASH: u8 = 4;
const TAG_ZSET: u8 = 5;
const TAG_STREAM: u8 = 6;
const TAG_BITMAP: u8 = 7;

/// A complete point-in-time serialization of all namespaces.
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotData {
    /// Sequence number at which the snapshot was taken
    pub sequence: u64,
    /// Per-namespace (key, entry) pairs, indexed by namespace
    pub dbs: Vec<Vec<(Bytes, Entry)>>,
}

impl SnapshotData {
    /// Capture the live contents of `stores` at `now`.
    ///
    /// Entry values are cloned; `Bytes` payloads are reference-counted,
    /// so the pause is proportional to key count, not payload size.
    pub fn capture(stores: &[MemoryStore], sequence: u64, now: u64) -> Self {
        let dbs = stores
            .iter()
            .map(|store| {
                store
                    .iter()
                    .filter(|(_, entry)| !entry.is_expired(now))
                    .map(|(key, entry)| (key.clone(), entry.clone()))
                    .collect()
            })
            .collect();

        SnapshotData { sequence, dbs }
    }

    /// Serialize with trailing checksum.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(MAGIC);
        buf.push(VERSION);
        buf.extend_from_slice(&self.sequence.to_le_bytes());
        buf.extend_from_slice(&(self.dbs.len() as u32).to_le_bytes());

        for db in &self.dbs {
            buf.extend_from_slice(&(db.len() as u64).to_le_bytes());
            for (key, entry) in db {
                put_bytes(&mut buf, key);
                match entry.expire_at {
                    Some(at) => {
                        buf.push(1);
                        buf.extend_from_slice(&at.to_le_bytes());
                    }
                    None => buf.push(0),
                }
                encode_value(&mut buf, &entry.value);
            }
        }

        let checksum = xxhash_rust::xxh64::xxh64(&buf, 0);
        buf.extend_from_slice(&checksum.to_le_bytes());
        buf
    }

    /// Deserialize, verifying magic, version and checksum.
    pub fn decode(data: &[u8]) -> Result<Self, String> {
        if data.len() < MAGIC.len() + 1 + 8 + 4 + 8 {
            return Err("snapshot too short".to_string());
        }

        let body_len = data.len() - 8;
        let stored = u64::from_le_bytes(data[body_len..].try_into().unwrap());
        let computed = xxhash_rust::xxh64::xxh64(&data[..body_len], 0);
        if stored != computed {
            return Err(format!(
                "snapshot checksum mismatch: stored {:#x}, computed {:#x}",
                stored, computed
            ));
        }

        let mut cur = Cursor {
            data: &data[..body_len],
            pos: 0,
        };

        if cur.take(4)? != MAGIC {
            return Err("bad snapshot magic".to_string());
        }
        let version = cur.u8()?;
        if version != VERSION {
            return Err(format!("unsupported snapshot version {}", version));
        }

        let sequence = cur.u64()?;
        let db_count = cur.u32()? as usize;

        let mut dbs = Vec::with_capacity(db_count);
        for _ in 0..db_count {
            let key_count = cur.u64()? as usize;
            let mut entries = Vec::with_capacity(key_count);
            for _ in 0..key_count {
                let key = cur.bytes()?;
                let expire_at = match cur.u8()? {
                    0 => None,
                    1 => Some(cur.u64()?),
                    f => return Err(format!("bad expiry flag {}", f)),
                };
                let value = decode_value(&mut cur)?;
                entries.push((key, Entry { value, expire_at }));
            }
            dbs.push(entries);
        }

        if cur.pos != cur.data.len() {
            return Err("trailing bytes after snapshot body".to_string());
        }

        Ok(SnapshotData { sequence, dbs })
    }
}

fn put_bytes(buf: &mut Vec<u8>, b: &[u8]) {
    buf.extend_from_slice(&(b.len() as u32).to_le_bytes());
    buf.extend_from_slice(b);
}

fn encode_value(buf: &mut Vec<u8>, value: &Value) {
    match value {
        Value::String(b) => {
            buf.push(TAG_STRING);
            put_bytes(buf, b);
        }
        Value::List(list) => {
            buf.push(TAG_LIST);
            buf.extend_from_slice(&(list.len() as u32).to_le_bytes());
            for item in list {
                put_bytes(buf, item);
            }
        }
        Value::Set(set) => {
            buf.push(TAG_SET);
            buf.extend_from_slice(&(set.len() as u32).to_le_bytes());
            for item in set {
                put_bytes(buf, item);
            }
        }
        Value::Hash(hash) => {
            buf.push(TAG_HASH);
            buf.extend_from_slice(&(hash.len() as u32).to_le_bytes());
            for (field, val) in hash {
                put_bytes(buf, field);
                put_bytes(buf, val);
            }
        }
        Value::SortedSet(zset) => {
            buf.push(TAG_ZSET);
            buf.extend_from_slice(&(zset.len() as u32).to_le_bytes());
            for (member, score) in zset.iter() {
                put_bytes(buf, member);
                buf.extend_from_slice(&score.to_bits().to_le_bytes());
            }
        }
        Value::Stream(stream) => {
            buf.push(TAG_STREAM);
            buf.extend_from_slice(&(stream.len() as u32).to_le_bytes());
            for entry in stream.iter() {
                buf.extend_from_slice(&entry.id.ms.to_le_bytes());
                buf.extend_from_slice(&entry.id.seq.to_le_bytes());
                buf.extend_from_slice(&(entry.fields.len() as u32).to_le_bytes());
                for (field, val) in &entry.fields {
                    put_bytes(buf, field);
                    put_bytes(buf, val);
                }
            }
        }
        Value::Bitmap(bits) => {
            buf.push(TAG_BITMAP);
            put_bytes(buf, bits);
        }
    }
}

fn decode_value(cur: &mut Cursor<'_>) -> Result<Value, String> {
    let tag = cur.u8()?;
    match tag {
        TAG_STRING => Ok(Value::String(cur.bytes()?)),
        TAG_LIST => {
            let count = cur.u32()? as usize;
            let mut list = std::collections::VecDeque::with_capacity(count);
            for _ in 0..count {
                list.push_back(cur.bytes()?);
            }
            Ok(Value::List(list))
        }
        TAG_SET => {
            let count = cur.u32()? as usize;
            let mut set = std::collections::HashSet::with_capacity(count);
            for _ in 0..count {
                set.insert(cur.bytes()?);
            }
            Ok(Value::Set(set))
        }
        TAG_HASH => {
            let count = cur.u32()? as usize;
            let mut hash = std::collections::HashMap::with_capacity(count);
            for _ in 0..count {
                let field = cur.bytes()?;
                let val = cur.bytes()?;
                hash.insert(field, val);
            }
            Ok(Value::Hash(hash))
        }
        TAG_ZSET => {
            let count = cur.u32()? as usize;
            let mut zset = SortedSet::new();
            for _ in 0..count {
                let member = cur.bytes()?;
                let score = f64::from_bits(cur.u64()?);
                zset.insert(member, score);
            }
            Ok(Value::SortedSet(zset))
        }
        TAG_STREAM => {
            let count = cur.u32()? as usize;
            let mut stream = Stream::new();
            for _ in 0..count {
                let ms = cur.u64()?;
                let seq = cur.u64()?;
                let field_count = cur.u32()? as usize;
                let mut fields = Vec::with_capacity(field_count);
                for _ in 0..field_count {
                    let field = cur.bytes()?;
                    let val = cur.bytes()?;
                    fields.push((field, val));
                }
                stream
                    .append(StreamId::new(ms, seq), fields)
                    .map_err(|e| format!("stream entry out of order: {}", e))?;
            }
            Ok(Value::Stream(stream))
        }
        TAG_BITMAP => Ok(Value::Bitmap(cur.bytes()?.to_vec())),
        other => Err(format!("unknown value tag {}", other)),
    }
}

struct Cursor<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn take(&mut self, n: usize) -> Result<&'a [u8], String> {
        if self.pos + n > self.data.len() {
            return Err("truncated snapshot".to_string());
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, String> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, String> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    fn u64(&mut self) -> Result<u64, String> {
        Ok(u64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    fn bytes(&mut self) -> Result<Bytes, String> {
        let len = self.u32()? as usize;
        Ok(Bytes::copy_from_slice(self.take(len)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StreamId;

    fn populated_stores() -> Vec<MemoryStore> {
        let mut db0 = MemoryStore::new();
        db0.set("s", Value::string("hello"));
        db0.set("l", {
            let mut v = Value::empty_list();
            v.as_list_mut().unwrap().push_back(Bytes::from("x"));
            v.as_list_mut().unwrap().push_back(Bytes::from("y"));
            v
        });
        db0.set_expiry(&Bytes::from("s"), 50_000, 0);

        let mut db1 = MemoryStore::new();
        let mut zset = SortedSet::new();
        zset.insert(Bytes::from("m"), 1.5);
        db1.set("z", Value::SortedSet(zset));

        let mut stream = Stream::new();
        stream
            .append(
                StreamId::new(10, 0),
                vec![(Bytes::from("f"), Bytes::from("v"))],
            )
            .unwrap();
        db1.set("x", Value::Stream(stream));
        db1.set("b", Value::Bitmap(vec![0b1010_0001]));

        vec![db0, db1]
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let stores = populated_stores();
        let snap = SnapshotData::capture(&stores, 9, 0);

        let decoded = SnapshotData::decode(&snap.encode()).unwrap();
        assert_eq!(decoded.sequence, 9);
        assert_eq!(decoded.dbs.len(), 2);

        // order within a db is map order; compare as sets
        let db0: std::collections::HashMap<_, _> = decoded.dbs[0].iter().cloned().collect();
        assert_eq!(db0.get(&Bytes::from("s")).unwrap().expire_at, Some(50_000));
        let db1: std::collections::HashMap<_, _> = decoded.dbs[1].iter().cloned().collect();
        let z = db1.get(&Bytes::from("z")).unwrap();
        assert_eq!(
            z.value.as_sorted_set().unwrap().score(&Bytes::from("m")),
            Some(1.5)
        );
        let x = db1.get(&Bytes::from("x")).unwrap();
        assert_eq!(x.value.as_stream().unwrap().last_id(), StreamId::new(10, 0));
    }

    #[test]
    fn test_capture_excludes_expired() {
        let mut db = MemoryStore::new();
        db.set("dead", Value::string("v"));
        db.set_expiry(&Bytes::from("dead"), 100, 0);
        db.set("live", Value::string("v"));

        let snap = SnapshotData::capture(&[db], 1, 500);
        assert_eq!(snap.dbs[0].len(), 1);
        assert_eq!(snap.dbs[0][0].0, Bytes::from("live"));
    }

    #[test]
    fn test_corruption_detected() {
        let stores = populated_stores();
        let mut bytes = SnapshotData::capture(&stores, 1, 0).encode();
        let mid = bytes.len() / 2;
        bytes[mid] ^= 0x01;
        assert!(SnapshotData::decode(&bytes).is_err());
    }
}
