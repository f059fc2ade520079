//! Follower-side replication driver
//!
//! Connects a replica engine to its leader: handshake with the last
//! applied sequence, install a snapshot if the leader demands a full
//! resync, then apply the record feed in order. Any detected gap tears
//! the session down and re-handshakes, which converges by construction
//! because the handshake always restarts from the replica's true
//! offset.

use crate::engine::EngineHandle;
use crate::error::EngineError;
use crate::repl::SyncStart;
use std::time::Duration;
use tracing::{debug, info, warn};

const RETRY_DELAY: Duration = Duration::from_millis(500);

/// Drive `replica` from `leader` until either engine stops.
///
/// In-process replication: both handles live in this process, which is
/// the transport this crate ships. A network transport would speak the
/// same handshake over its own framing.
pub async fn run_follower(leader: EngineHandle, replica: EngineHandle) {
    loop {
        match sync_session(&leader, &replica).await {
            Ok(()) => {
                info!("replication session closed, leader gone");
                return;
            }
            Err(EngineError::Stopped) => {
                info!("replication session closed, engine stopped");
                return;
            }
            Err(EngineError::ReplicationGap { expected, got }) => {
                warn!(expected, got, "sequence gap, full resync");
                // re-handshake; the leader will answer with a snapshot
            }
            Err(err) => {
                warn!(error = %err, "replication session failed, retrying");
                tokio::time::sleep(RETRY_DELAY).await;
            }
        }
    }
}

async fn sync_session(
    leader: &EngineHandle,
    replica: &EngineHandle,
) -> Result<(), EngineError> {
    let offset = replica.offset().await?;
    let (start, mut feed) = leader.sync(offset).await?;

    match start {
        SyncStart::Continue => {
            debug!(offset, "partial resync accepted");
        }
        SyncStart::FullResync(blob) => {
            info!(sequence = blob.sequence, "installing full resync snapshot");
            replica.install_snapshot(blob).await?;
        }
    }

    while let Some(record) = feed.recv().await {
        replica.replicate(record).await?;
    }
    Ok(())
}
