//! LOOKUP (procedure 4) and path resolution on top of it.
//!
//! NFS has no "look up this path" call; a path is resolved by looking up
//! one component at a time, each lookup starting from the handle returned
//! by the previous one.

use std::net::SocketAddr;

use smallvec::SmallVec;
use tracing::debug;

use crate::error::Error;
use crate::protocol::rpc::{self, NfsLookup, RpcCaller};
use crate::xdr::nfs2::dir::{diropargs, diropres};
use crate::xdr::nfs2::{fattr, fhandle};

/// Handle and attributes of a looked up object.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LookupResult {
    pub handle: fhandle,
    pub attributes: fattr,
}

/// Looks up `name` inside the directory `dir`.
///
/// Any status other than `NFS_OK` is reported as [Error::PathNotFound]
/// for `name`.
pub async fn nfsproc_lookup(
    caller: &dyn RpcCaller,
    address: SocketAddr,
    dir: fhandle,
    name: &str,
) -> Result<LookupResult, Error> {
    let args = diropargs { dir, name: name.into() };
    debug!("nfsproc_lookup({}, {:?})", address, name);
    match rpc::call::<NfsLookup>(caller, address, &args).await? {
        diropres::Ok(res) => Ok(LookupResult { handle: res.file, attributes: res.attributes }),
        diropres::Err(status) => {
            debug!("\t{:?} --> {:?}", name, status);
            Err(Error::PathNotFound { component: name.to_owned(), status })
        }
    }
}

/// Resolves the slash separated `path` below `root`, one LOOKUP per
/// component. Empty components (leading, trailing or doubled slashes) are
/// skipped.
///
/// An empty path resolves to nothing and is reported as not found.
pub async fn nfsproc_lookup_path(
    caller: &dyn RpcCaller,
    address: SocketAddr,
    root: fhandle,
    path: &str,
) -> Result<LookupResult, Error> {
    let components: SmallVec<[&str; 8]> =
        path.split('/').filter(|component| !component.is_empty()).collect();
    let mut dir = root;
    let mut resolved = None;
    for component in components {
        debug!("looking up {:?}", component);
        let res = nfsproc_lookup(caller, address, dir, component).await?;
        dir = res.handle;
        resolved = Some(res);
    }
    resolved.ok_or_else(|| Error::PathNotFound {
        component: path.to_owned(),
        status: crate::xdr::nfs2::nfsstat::NFSERR_NOENT,
    })
}
