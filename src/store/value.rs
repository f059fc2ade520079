//! Value types for the key-value store

use super::sorted_set::SortedSet;
use super::stream::Stream;
use bytes::Bytes;
use std::collections::{HashMap, HashSet, VecDeque};

/// The closed set of value variants a key can hold.
///
/// A key maps to exactly one variant at a time; type-mismatched
/// operations fail with a type error. Adding a variant requires updating
/// every dispatch site (exhaustive matching, on purpose).
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// String value (binary-safe)
    String(Bytes),

    /// List of values (insertion order)
    List(VecDeque<Bytes>),

    /// Set of unique values (unordered)
    Set(HashSet<Bytes>),

    /// Hash map (field -> value)
    Hash(HashMap<Bytes, Bytes>),

    /// Members ordered by (score, member)
    SortedSet(SortedSet),

    /// Append-only log of id -> field pairs
    Stream(Stream),

    /// Bit-addressable byte sequence
    Bitmap(Vec<u8>),
}

impl Value {
    /// Create a string value
    pub fn string(bytes: impl Into<Bytes>) -> Self {
        Value::String(bytes.into())
    }

    /// Create an empty list
    pub fn empty_list() -> Self {
        Value::List(VecDeque::new())
    }

    /// Create an empty set
    pub fn empty_set() -> Self {
        Value::Set(HashSet::new())
    }

    /// Create an empty hash
    pub fn empty_hash() -> Self {
        Value::Hash(HashMap::new())
    }

    /// Create an empty sorted set
    pub fn empty_sorted_set() -> Self {
        Value::SortedSet(SortedSet::new())
    }

    /// Create an empty stream
    pub fn empty_stream() -> Self {
        Value::Stream(Stream::new())
    }

    /// Create an empty bitmap
    pub fn empty_bitmap() -> Self {
        Value::Bitmap(Vec::new())
    }

    /// Get the type name as reported by TYPE
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Set(_) => "set",
            Value::Hash(_) => "hash",
            Value::SortedSet(_) => "zset",
            Value::Stream(_) => "stream",
            Value::Bitmap(_) => "bitmap",
        }
    }

    /// Try to get as string bytes
    pub fn as_string(&self) -> Option<&Bytes> {
        match self {
            Value::String(b) => Some(b),
            _ => None,
        }
    }

    /// Try to get as list reference
    pub fn as_list(&self) -> Option<&VecDeque<Bytes>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to get as mutable list
    pub fn as_list_mut(&mut self) -> Option<&mut VecDeque<Bytes>> {
        match self {
            Value::List(list) => Some(list),
            _ => None,
        }
    }

    /// Try to get as set reference
    pub fn as_set(&self) -> Option<&HashSet<Bytes>> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    /// Try to get as mutable set
    pub fn as_set_mut(&mut self) -> Option<&mut HashSet<Bytes>> {
        match self {
            Value::Set(set) => Some(set),
            _ => None,
        }
    }

    /// Try to get as hash reference
    pub fn as_hash(&self) -> Option<&HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(hash) => Some(hash),
            _ => None,
        }
    }

    /// Try to get as mutable hash
    pub fn as_hash_mut(&mut self) -> Option<&mut HashMap<Bytes, Bytes>> {
        match self {
            Value::Hash(hash) => Some(hash),
            _ => None,
        }
    }

    /// Try to get as sorted set reference
    pub fn as_sorted_set(&self) -> Option<&SortedSet> {
        match self {
            Value::SortedSet(zset) => Some(zset),
            _ => None,
        }
    }

    /// Try to get as mutable sorted set
    pub fn as_sorted_set_mut(&mut self) -> Option<&mut SortedSet> {
        match self {
            Value::SortedSet(zset) => Some(zset),
            _ => None,
        }
    }

    /// Try to get as stream reference
    pub fn as_stream(&self) -> Option<&Stream> {
        match self {
            Value::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// Try to get as mutable stream
    pub fn as_stream_mut(&mut self) -> Option<&mut Stream> {
        match self {
            Value::Stream(stream) => Some(stream),
            _ => None,
        }
    }

    /// Try to get as bitmap reference
    pub fn as_bitmap(&self) -> Option<&Vec<u8>> {
        match self {
            Value::Bitmap(bits) => Some(bits),
            _ => None,
        }
    }

    /// Try to get as mutable bitmap
    pub fn as_bitmap_mut(&mut self) -> Option<&mut Vec<u8>> {
        match self {
            Value::Bitmap(bits) => Some(bits),
            _ => None,
        }
    }

    /// Calculate approximate memory usage in bytes
    pub fn memory_usage(&self) -> usize {
        match self {
            Value::String(bytes) => bytes.len(),
            Value::List(list) => {
                let items: usize = list.iter().map(|b| b.len()).sum();
                items + std::mem::size_of::<VecDeque<Bytes>>()
            }
            Value::Set(set) => {
                let items: usize = set.iter().map(|b| b.len()).sum();
                items + std::mem::size_of::<HashSet<Bytes>>()
            }
            Value::Hash(hash) => {
                let items: usize = hash.iter().map(|(k, v)| k.len() + v.len()).sum();
                items + std::mem::size_of::<HashMap<Bytes, Bytes>>()
            }
            Value::SortedSet(zset) => zset.memory_usage(),
            Value::Stream(stream) => stream.memory_usage(),
            Value::Bitmap(bits) => bits.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_names() {
        assert_eq!(Value::string("x").type_name(), "string");
        assert_eq!(Value::empty_list().type_name(), "list");
        assert_eq!(Value::empty_set().type_name(), "set");
        assert_eq!(Value::empty_hash().type_name(), "hash");
        assert_eq!(Value::empty_sorted_set().type_name(), "zset");
        assert_eq!(Value::empty_stream().type_name(), "stream");
        assert_eq!(Value::empty_bitmap().type_name(), "bitmap");
    }

    #[test]
    fn test_accessors_reject_other_variants() {
        let v = Value::string("x");
        assert!(v.as_list().is_none());
        assert!(v.as_sorted_set().is_none());
        assert!(v.as_string().is_some());

        let mut v = Value::empty_list();
        assert!(v.as_string().is_none());
        assert!(v.as_list_mut().is_some());
    }
}
