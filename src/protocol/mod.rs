//! Protocol layers of the client, bottom up:
//!
//! - `xdr`: External Data Representation (RFC 4506) of the RPC, PORTMAP,
//!   MOUNT and NFS version 2 structures.
//!
//! - `rpc`: RPC version 2 messages over UDP, the procedure table and the
//!   correlation of replies with outstanding calls.
//!
//! - `nfs`: typed PORTMAP, MOUNT and NFS procedures on top of `rpc`.

pub mod nfs;
pub mod rpc;
pub mod xdr;
