//! UDP transport for RPC calls to the players.
//!
//! One socket bound to an ephemeral port carries every call. A background
//! task reads datagrams off the socket, splits them into xid and reply
//! body, and hands them to the [TransactionTracker]; callers wait on the
//! completion slot they registered before sending.
//!
//! Anything odd arriving on the socket (calls, truncated or garbage
//! datagrams, replies nobody waits for, receive errors caused by ICMP
//! messages) is logged and dropped. Nothing is retransmitted here.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::UdpSocket;
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::error::Error;
use crate::protocol::rpc::{wire, Procedure, RpcCaller, TransactionTracker};
use crate::xdr::rpc::{auth_unix, opaque_auth};

/// Stamp sent in the `AUTH_UNIX` credential of every call.
pub const DEFAULT_AUTH_STAMP: u32 = 0xdead_beef;

/// RPC client transport over a single UDP socket.
pub struct RpcUdpTransport {
    socket: Arc<UdpSocket>,
    tracker: Arc<TransactionTracker>,
    /// Last xid handed out
    xid: AtomicU32,
    credential: opaque_auth,
    call_timeout: Duration,
    receiver: Mutex<Option<JoinHandle<()>>>,
}

impl RpcUdpTransport {
    /// Binds the socket to `local` (usually port 0) and starts the receive
    /// loop on the current runtime.
    ///
    /// Every call waits at most `call_timeout` for its reply.
    pub async fn bind(
        local: SocketAddr,
        auth_stamp: u32,
        call_timeout: Duration,
    ) -> Result<RpcUdpTransport, Error> {
        let socket = Arc::new(UdpSocket::bind(local).await?);
        info!("RPC client bound to {}", socket.local_addr()?);
        let credential = opaque_auth::unix(&auth_unix::with_stamp(auth_stamp))?;
        let tracker = Arc::new(TransactionTracker::new());
        let receiver = tokio::spawn(receive_forever(socket.clone(), tracker.clone()));
        Ok(RpcUdpTransport {
            socket,
            tracker,
            xid: AtomicU32::new(1),
            credential,
            call_timeout,
            receiver: Mutex::new(Some(receiver)),
        })
    }

    /// Address the socket is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, Error> {
        Ok(self.socket.local_addr()?)
    }

    /// Number of calls still waiting for a reply.
    pub fn outstanding_calls(&self) -> usize {
        self.tracker.outstanding()
    }

    /// Stops the receive loop. Calls in flight never see their reply and
    /// end with their own timeout.
    pub fn stop(&self) {
        let receiver = self.receiver.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(receiver) = receiver {
            debug!("stopping RPC receive loop");
            receiver.abort();
        }
    }

    /// Takes the next free xid and registers its completion slot.
    fn register_next(&self) -> (u32, crate::protocol::rpc::ReplySlot) {
        loop {
            let xid = self.xid.fetch_add(1, Ordering::Relaxed).wrapping_add(1);
            if let Some(slot) = self.tracker.register(xid) {
                return (xid, slot);
            }
            trace!("xid {} still outstanding, skipping", xid);
        }
    }
}

impl Drop for RpcUdpTransport {
    fn drop(&mut self) {
        self.stop();
    }
}

#[async_trait]
impl RpcCaller for RpcUdpTransport {
    async fn call(
        &self,
        address: SocketAddr,
        procedure: Procedure,
        args: Vec<u8>,
    ) -> Result<Vec<u8>, Error> {
        let (xid, slot) = self.register_next();
        let datagram =
            wire::encode_call(xid, procedure, &self.credential, &args).map_err(Error::Codec)?;
        trace!("sending {} xid {} to {} ({} bytes)", procedure, xid, address, datagram.len());
        if let Err(e) = self.socket.send_to(&datagram, address).await {
            self.tracker.abandon(xid);
            return Err(Error::Transport(e));
        }
        match tokio::time::timeout(self.call_timeout, slot).await {
            Ok(Ok(reply)) => wire::accepted_results(&reply),
            Ok(Err(_)) => Err(Error::Stopped),
            Err(_) => {
                debug!("{} xid {} to {} timed out", procedure, xid, address);
                self.tracker.abandon(xid);
                Err(Error::Timeout)
            }
        }
    }
}

/// Reads datagrams until the task is aborted.
async fn receive_forever(socket: Arc<UdpSocket>, tracker: Arc<TransactionTracker>) {
    let mut buf = vec![0_u8; wire::MAX_DATAGRAM_SIZE];
    loop {
        let (len, peer) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                // ICMP errors from earlier sends surface here on some systems
                warn!("receive error on RPC socket: {}", e);
                continue;
            }
        };
        match wire::split_reply(&buf[..len]) {
            Ok(Some((xid, reply))) => {
                trace!("reply xid {} from {} ({} bytes)", xid, peer, len);
                if !tracker.deliver(xid, reply) {
                    debug!("dropped orphaned reply xid {} from {}", xid, peer);
                }
            }
            Ok(None) => warn!("ignoring RPC call received from {}", peer),
            Err(e) => warn!("dropping malformed datagram from {}: {:?}", peer, e),
        }
    }
}
