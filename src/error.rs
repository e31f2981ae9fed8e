//! Errors reported to callers of the client.
//!
//! Protocol failures are turned into typed variants where they are detected
//! and travel unchanged up to the caller. Anomalies on the socket (garbage
//! datagrams, replies nobody waits for) never show up here; the transport
//! logs and drops them.

use std::path::PathBuf;

use crate::xdr::nfs2::nfsstat;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The UDP socket could not be bound or a datagram could not be sent.
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    /// Portmap has no port for the program, the player does not run it.
    #[error("program {program} version {version} is not available")]
    ServiceUnavailable { program: u32, version: u32 },

    #[error("mount rejected with status {code}")]
    MountRejected { code: u32 },

    #[error("path component {component:?} not found: {status}")]
    PathNotFound { component: String, status: nfsstat },

    #[error("read failed: {status}")]
    ReadFailed { status: nfsstat },

    #[error("no export configured for slot {0:?}")]
    UnknownSlot(String),

    #[error("no reply within the deadline")]
    Timeout,

    /// The call reached the server but was not executed.
    #[error("call rejected: {0}")]
    RpcRejected(String),

    /// Arguments could not be encoded or a reply could not be decoded.
    #[error("malformed message: {0}")]
    Codec(std::io::Error),

    #[error(
        "chunk size {0} is outside {}..={}",
        crate::config::MIN_CHUNK_SIZE,
        crate::config::MAX_CHUNK_SIZE
    )]
    InvalidChunkSize(u32),

    #[error("no file name in path {0:?}")]
    InvalidPath(PathBuf),

    /// The client is not running or was stopped while the request was pending.
    #[error("client stopped")]
    Stopped,
}
