//! UMNT (procedure 3): telling the server a mount is no longer used.

use std::net::SocketAddr;

use tracing::debug;

use crate::error::Error;
use crate::protocol::rpc::{self, MountUmnt, RpcCaller};
use crate::xdr::mount::dirpath;

/// Removes the mount entry for `export`. The reply carries no status.
pub async fn mountproc_umnt(
    caller: &dyn RpcCaller,
    address: SocketAddr,
    export: &str,
) -> Result<(), Error> {
    debug!("mountproc_umnt({}, {:?})", address, export);
    rpc::call::<MountUmnt>(caller, address, &dirpath::from(export)).await
}
