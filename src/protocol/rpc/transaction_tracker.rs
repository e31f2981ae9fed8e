//! Correlation of outstanding calls with the replies that answer them.
//!
//! UDP gives no ordering and no delivery guarantee, so the only link
//! between a reply and its call is the transaction id. Every call registers
//! a one-shot completion slot under its xid before the datagram leaves the
//! socket; the receive loop hands each reply to [TransactionTracker::deliver].
//!
//! The tracker enforces no timeouts. A caller that gives up abandons its
//! entry, and entries whose caller went away are swept on the next
//! registration.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;
use tracing::{debug, trace};

/// Receiving half of a completion slot; resolves to the reply body.
pub type ReplySlot = oneshot::Receiver<Vec<u8>>;

/// Tracks in-flight RPC transactions by xid.
#[derive(Default)]
pub struct TransactionTracker {
    pending: Mutex<HashMap<u32, oneshot::Sender<Vec<u8>>>>,
}

impl TransactionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the completion slot for `xid`.
    ///
    /// Returns `None` if a call with the same xid is still outstanding; the
    /// caller has to pick another xid.
    pub fn register(&self, xid: u32) -> Option<ReplySlot> {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        housekeeping(&mut pending);
        if pending.contains_key(&xid) {
            return None;
        }
        let (sender, receiver) = oneshot::channel();
        pending.insert(xid, sender);
        trace!("registered xid {}", xid);
        Some(receiver)
    }

    /// Fulfils the slot registered for `xid` and forgets it.
    ///
    /// Returns false when nobody waits for this xid (a late or duplicate
    /// reply, or an abandoned call); the payload is dropped.
    pub fn deliver(&self, xid: u32, payload: Vec<u8>) -> bool {
        let sender = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            pending.remove(&xid)
        };
        match sender {
            Some(sender) => {
                if sender.send(payload).is_err() {
                    debug!("caller of xid {} went away before its reply arrived", xid);
                    return false;
                }
                true
            }
            None => {
                debug!("discarding reply for unknown xid {}", xid);
                false
            }
        }
    }

    /// Drops the slot of a call whose caller stopped waiting.
    pub fn abandon(&self, xid: u32) {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        if pending.remove(&xid).is_some() {
            trace!("abandoned xid {}", xid);
        }
    }

    /// Number of calls still waiting for a reply.
    pub fn outstanding(&self) -> usize {
        let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
        housekeeping(&mut pending);
        pending.len()
    }
}

/// Removes slots whose receiving side has been dropped.
fn housekeeping(pending: &mut HashMap<u32, oneshot::Sender<Vec<u8>>>) {
    pending.retain(|_, sender| !sender.is_closed());
}
