//! Transaction sessions
//!
//! MULTI/EXEC queueing is per-connection state, so it lives outside the
//! engine loop: the session collects commands locally and hands the
//! whole queue to the engine at EXEC time. The engine applies the queue
//! as one uninterrupted burst; no other command interleaves with it.
//!
//! Queued commands are not validated while queuing. By default a
//! command that fails inside the burst reports its own error and the
//! rest still apply; `txn_abort_on_error` tightens this to reject the
//! whole queue on any statically invalid command.

use bytes::Bytes;

/// Per-connection transaction state.
#[derive(Debug, Default)]
pub struct TxnSession {
    queue: Option<Vec<(String, Vec<Bytes>)>>,
}

impl TxnSession {
    pub fn new() -> Self {
        TxnSession { queue: None }
    }

    /// True if a MULTI is open.
    pub fn in_txn(&self) -> bool {
        self.queue.is_some()
    }

    /// MULTI: open a queue.
    pub fn begin(&mut self) -> Result<(), String> {
        if self.queue.is_some() {
            return Err("MULTI calls can not be nested".to_string());
        }
        self.queue = Some(Vec::new());
        Ok(())
    }

    /// Queue one command. Only callable while a MULTI is open.
    pub fn enqueue(&mut self, name: impl Into<String>, args: Vec<Bytes>) -> Result<(), String> {
        match self.queue.as_mut() {
            Some(queue) => {
                queue.push((name.into(), args));
                Ok(())
            }
            None => Err("no MULTI in progress".to_string()),
        }
    }

    /// DISCARD: drop the queue without executing anything.
    pub fn discard(&mut self) -> Result<(), String> {
        match self.queue.take() {
            Some(_) => Ok(()),
            None => Err("DISCARD without MULTI".to_string()),
        }
    }

    /// EXEC: close the session and hand back the queue for execution.
    pub fn take_queue(&mut self) -> Result<Vec<(String, Vec<Bytes>)>, String> {
        self.queue
            .take()
            .ok_or_else(|| "EXEC without MULTI".to_string())
    }

    /// Number of queued commands, if a MULTI is open.
    pub fn queued(&self) -> usize {
        self.queue.as_ref().map(Vec::len).unwrap_or(0)
    }
}
