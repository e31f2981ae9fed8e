//! READ (procedure 6).

use std::net::SocketAddr;

use tracing::trace;

use crate::error::Error;
use crate::protocol::rpc::{self, NfsRead, RpcCaller};
use crate::xdr::nfs2::fattr;
use crate::xdr::nfs2::fhandle;
use crate::xdr::nfs2::file::{readargs, readres};

/// Data returned by one READ.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadChunk {
    /// Attributes of the file after the read
    pub attributes: fattr,
    pub data: Vec<u8>,
    /// Number of bytes that were asked for
    pub requested: u32,
}

impl ReadChunk {
    /// A chunk shorter than requested is the last one of the file.
    pub fn is_eof(&self) -> bool {
        self.data.len() < self.requested as usize
    }
}

/// Reads up to `count` bytes at `offset` from `file`.
///
/// A non-OK status is reported as [Error::ReadFailed].
pub async fn nfsproc_read(
    caller: &dyn RpcCaller,
    address: SocketAddr,
    file: fhandle,
    offset: u32,
    count: u32,
) -> Result<ReadChunk, Error> {
    let args = readargs { file, offset, count, totalcount: 0 };
    trace!("nfsproc_read({}, offset {}, count {})", address, offset, count);
    match rpc::call::<NfsRead>(caller, address, &args).await? {
        readres::Ok(res) => {
            Ok(ReadChunk { attributes: res.attributes, data: res.data, requested: count })
        }
        readres::Err(status) => Err(Error::ReadFailed { status }),
    }
}
