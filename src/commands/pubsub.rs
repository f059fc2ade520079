//! PUBLISH command
//!
//! Subscription management lives on the engine handle; only the
//! publishing side goes through the dispatcher. Published messages are
//! fire and forget and never enter the command log.

use super::{Command, CommandContext};
use crate::error::EngineError;
use crate::reply::Reply;
use bytes::Bytes;

/// PUBLISH command - Broadcast a payload to channel subscribers
///
/// Syntax: PUBLISH channel payload
///
/// Returns the number of subscribers that received the message.
pub struct PublishCommand;

impl Command for PublishCommand {
    fn execute(
        &self,
        ctx: &mut CommandContext,
        _db: usize,
        args: &[Bytes],
    ) -> Result<Reply, EngineError> {
        let delivered = ctx.pubsub.publish(&args[0], args[1].clone());
        Ok(Reply::int(delivered as i64))
    }

    fn name(&self) -> &'static str {
        "PUBLISH"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn max_args(&self) -> Option<usize> {
        Some(2)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn b(s: &str) -> Bytes {
        Bytes::from(s.to_string())
    }

    #[test]
    fn test_publish_without_subscribers() {
        let mut ctx = CommandContext::new(1, 16);
        let r = PublishCommand
            .execute(&mut ctx, 0, &[b("news"), b("hello")])
            .unwrap();
        assert_eq!(r, Reply::int(0));
    }

    #[test]
    fn test_publish_reaches_subscriber() {
        let mut ctx = CommandContext::new(1, 16);
        let mut rx = ctx.pubsub.subscribe(b("news"));

        let r = PublishCommand
            .execute(&mut ctx, 0, &[b("news"), b("hello")])
            .unwrap();
        assert_eq!(r, Reply::int(1));

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.channel, b("news"));
        assert_eq!(msg.payload, b("hello"));
    }
}
