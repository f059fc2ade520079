//! Typed value store
//!
//! One [`MemoryStore`] per database namespace; each holds the mapping
//! from key to typed [`Value`] plus expiry metadata.

mod entry;
mod memory;
mod sorted_set;
mod stream;
mod value;

pub use entry::Entry;
pub use memory::MemoryStore;
pub use sorted_set::SortedSet;
pub use stream::{Stream, StreamEntry, StreamId};
pub use value::Value;
