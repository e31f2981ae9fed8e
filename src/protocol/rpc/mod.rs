//! Client side of ONC RPC version 2 (RFC 5531) over UDP.
//!
//! - `procedure`: the table of supported remote procedures and their types
//! - `transaction_tracker`: xid → waiting caller correlation
//! - `wire`: datagram encoding of calls and splitting of replies
//!
//! Everything above this layer talks to the network through [RpcCaller].

use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::Error;

mod procedure;
mod transaction_tracker;
pub mod wire;

pub use procedure::{
    decode_reply, encode_args, MountMnt, MountUmnt, NfsLookup, NfsRead, PmapGetPort, Procedure,
    RpcProcedure,
};
pub use transaction_tracker::{ReplySlot, TransactionTracker};

/// Something that can perform one RPC round trip.
///
/// Implemented by the UDP transport; procedure and download code only see
/// this trait.
#[async_trait]
pub trait RpcCaller: Send + Sync {
    /// Sends one call of `procedure` with the encoded `args` to `address`
    /// and waits for its reply.
    ///
    /// Returns the procedure results of an accepted, successful reply.
    /// Implementations do not retry.
    async fn call(
        &self,
        address: SocketAddr,
        procedure: Procedure,
        args: Vec<u8>,
    ) -> Result<Vec<u8>, Error>;
}

/// Performs a typed call of `P`.
pub async fn call<P: RpcProcedure>(
    caller: &dyn RpcCaller,
    address: SocketAddr,
    args: &P::Args,
) -> Result<P::Reply, Error> {
    let args = encode_args::<P>(args).map_err(Error::Codec)?;
    let results = caller.call(address, P::PROCEDURE, args).await?;
    decode_reply::<P>(&results).map_err(Error::Codec)
}
