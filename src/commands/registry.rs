//! Command registry
//!
//! Maps command names to their implementations. Lookup is
//! case-insensitive; names are stored uppercase.

use super::Command;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of all available commands
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
}

impl CommandRegistry {
    /// Create a registry with the full command set registered.
    pub fn new() -> Self {
        let mut registry = CommandRegistry {
            commands: HashMap::new(),
        };

        // keys
        registry.register(Arc::new(super::key::DelCommand));
        registry.register(Arc::new(super::key::ExistsCommand));
        registry.register(Arc::new(super::key::TypeCommand));
        registry.register(Arc::new(super::key::KeysCommand));
        registry.register(Arc::new(super::key::DbSizeCommand));
        registry.register(Arc::new(super::key::FlushDbCommand));

        // expiration
        registry.register(Arc::new(super::ttl::ExpireCommand));
        registry.register(Arc::new(super::ttl::PExpireAtCommand));
        registry.register(Arc::new(super::ttl::TtlCommand));
        registry.register(Arc::new(super::ttl::PersistCommand));

        // strings
        registry.register(Arc::new(super::string::SetCommand));
        registry.register(Arc::new(super::string::GetCommand));
        registry.register(Arc::new(super::string::AppendCommand));
        registry.register(Arc::new(super::string::StrLenCommand));

        // counters
        registry.register(Arc::new(super::counter::IncrCommand));
        registry.register(Arc::new(super::counter::DecrCommand));
        registry.register(Arc::new(super::counter::IncrByCommand));
        registry.register(Arc::new(super::counter::DecrByCommand));

        // lists
        registry.register(Arc::new(super::list::LPushCommand));
        registry.register(Arc::new(super::list::RPushCommand));
        registry.register(Arc::new(super::list::LPopCommand));
        registry.register(Arc::new(super::list::RPopCommand));
        registry.register(Arc::new(super::list::LRangeCommand));
        registry.register(Arc::new(super::list::LLenCommand));

        // sets
        registry.register(Arc::new(super::set::SAddCommand));
        registry.register(Arc::new(super::set::SRemCommand));
        registry.register(Arc::new(super::set::SMembersCommand));
        registry.register(Arc::new(super::set::SIsMemberCommand));
        registry.register(Arc::new(super::set::SCardCommand));

        // hashes
        registry.register(Arc::new(super::hash::HSetCommand));
        registry.register(Arc::new(super::hash::HGetCommand));
        registry.register(Arc::new(super::hash::HGetAllCommand));
        registry.register(Arc::new(super::hash::HDelCommand));
        registry.register(Arc::new(super::hash::HExistsCommand));
        registry.register(Arc::new(super::hash::HKeysCommand));
        registry.register(Arc::new(super::hash::HIncrByCommand));

        // sorted sets
        registry.register(Arc::new(super::zset::ZAddCommand));
        registry.register(Arc::new(super::zset::ZRangeCommand));
        registry.register(Arc::new(super::zset::ZRevRangeCommand));
        registry.register(Arc::new(super::zset::ZRankCommand));
        registry.register(Arc::new(super::zset::ZRevRankCommand));
        registry.register(Arc::new(super::zset::ZScoreCommand));
        registry.register(Arc::new(super::zset::ZCardCommand));
        registry.register(Arc::new(super::zset::ZCountCommand));
        registry.register(Arc::new(super::zset::ZRemCommand));
        registry.register(Arc::new(super::zset::ZIncrByCommand));

        // streams
        registry.register(Arc::new(super::stream::XAddCommand));
        registry.register(Arc::new(super::stream::XRangeCommand));
        registry.register(Arc::new(super::stream::XLenCommand));

        // bitmaps
        registry.register(Arc::new(super::bitmap::SetBitCommand));
        registry.register(Arc::new(super::bitmap::GetBitCommand));
        registry.register(Arc::new(super::bitmap::BitCountCommand));

        // pub/sub
        registry.register(Arc::new(super::pubsub::PublishCommand));

        debug!(commands = registry.commands.len(), "command registry ready");
        registry
    }

    fn register(&mut self, command: Arc<dyn Command>) {
        self.commands.insert(command.name().to_string(), command);
    }

    /// Look up a command by name, case-insensitively.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Command>> {
        self.commands.get(&name.to_uppercase()).cloned()
    }

    /// Check whether a command exists.
    pub fn has_command(&self, name: &str) -> bool {
        self.commands.contains_key(&name.to_uppercase())
    }

    /// All registered command names, sorted.
    pub fn command_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.commands.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for CommandRegistry {
    fn default() -> Self {
        Self::new()
    }
}
