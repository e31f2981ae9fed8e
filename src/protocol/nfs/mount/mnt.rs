//! MNT (procedure 1): mounting an export.

use std::net::SocketAddr;

use tracing::debug;

use crate::error::Error;
use crate::protocol::rpc::{self, MountMnt, RpcCaller};
use crate::xdr::mount::{dirpath, fhstatus};
use crate::xdr::nfs2::fhandle;

/// Mounts `export` on the MOUNT service at `address` and returns the file
/// handle of the export root.
///
/// The handle stays valid for as long as the player keeps the mount;
/// nothing here releases it.
pub async fn mountproc_mnt(
    caller: &dyn RpcCaller,
    address: SocketAddr,
    export: &str,
) -> Result<fhandle, Error> {
    debug!("mountproc_mnt({}, {:?})", address, export);
    match rpc::call::<MountMnt>(caller, address, &dirpath::from(export)).await? {
        fhstatus::Mounted(handle) => {
            debug!("\t{:?} --> {:?}", export, handle);
            Ok(handle)
        }
        fhstatus::Failed(code) => {
            debug!("\t{:?} --> status {}", export, code);
            Err(Error::MountRejected { code })
        }
    }
}
