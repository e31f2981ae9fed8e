//! Typed client operations of the three RPC programs a player runs.
//!
//! - `portmap`: locating the MOUNT and NFS services
//! - `mount`: turning an export path into the root file handle
//! - `v2`: NFS version 2 LOOKUP and READ
//!
//! Every operation is exactly one round trip through an [RpcCaller] and
//! turns a non-OK status into the matching [Error](crate::Error) variant.
//! None of them retries.
//!
//! [RpcCaller]: crate::protocol::rpc::RpcCaller

pub mod mount;
pub mod portmap;
pub mod v2;
