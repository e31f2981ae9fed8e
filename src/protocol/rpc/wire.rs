//! RPC message framing over UDP.
//!
//! One datagram carries exactly one message, so no record marking is
//! involved: a call is the envelope immediately followed by the procedure
//! arguments, a reply is the envelope followed by the procedure results.
//!
//! Splitting a datagram only looks at the xid and the message type. The
//! rest of a reply is decoded by the caller that registered the xid, which
//! keeps the receive loop independent of the procedures in flight.

use std::io::{Cursor, Read};

use anyhow::anyhow;

use crate::error::Error;
use crate::protocol::rpc::Procedure;
use crate::xdr::rpc::{
    accept_body, call_body, opaque_auth, reply_body, rpc_body, rpc_msg, MSG_TYPE_CALL,
    MSG_TYPE_REPLY, RPC_VERSION,
};
use crate::xdr::{self, deserialize, Serialize, ALIGNMENT};

/// Largest datagram the receive loop accepts.
pub const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Encodes a complete call datagram.
///
/// The arguments are appended as they are and zero padded to the XDR
/// alignment.
pub fn encode_call(
    xid: u32,
    procedure: Procedure,
    cred: &opaque_auth,
    args: &[u8],
) -> std::io::Result<Vec<u8>> {
    let msg = rpc_msg {
        xid,
        body: rpc_body::CALL(call_body {
            rpcvers: RPC_VERSION,
            prog: procedure.program(),
            vers: procedure.version(),
            proc: procedure.number(),
            cred: cred.clone(),
            verf: opaque_auth::default(),
        }),
    };
    let mut datagram = Vec::with_capacity(64 + args.len());
    msg.serialize(&mut datagram)?;
    datagram.extend_from_slice(args);
    datagram.resize(datagram.len().next_multiple_of(ALIGNMENT), 0);
    Ok(datagram)
}

/// Splits a received datagram into its xid and the bytes after the
/// message type.
///
/// Returns `Ok(None)` for calls, which a client has no use for.
pub fn split_reply(datagram: &[u8]) -> anyhow::Result<Option<(u32, Vec<u8>)>> {
    let mut src = Cursor::new(datagram);
    let xid = deserialize::<u32>(&mut src).map_err(|e| anyhow!("truncated xid: {e}"))?;
    let msg_type =
        deserialize::<u32>(&mut src).map_err(|e| anyhow!("truncated message type: {e}"))?;
    match msg_type {
        MSG_TYPE_CALL => Ok(None),
        MSG_TYPE_REPLY => {
            let mut body = Vec::with_capacity(datagram.len().saturating_sub(8));
            src.read_to_end(&mut body)?;
            Ok(Some((xid, body)))
        }
        other => Err(anyhow!("invalid message type {other} in datagram with xid {xid}")),
    }
}

/// Checks the reply status and returns the procedure results of a
/// successful call.
pub fn accepted_results(reply: &[u8]) -> Result<Vec<u8>, Error> {
    let mut src = Cursor::new(reply);
    let body = deserialize::<reply_body>(&mut src).map_err(Error::Codec)?;
    match body {
        reply_body::MSG_ACCEPTED(ref accepted) if accepted.reply_data == accept_body::SUCCESS => {
            let mut results = Vec::new();
            src.read_to_end(&mut results).map_err(Error::Codec)?;
            Ok(results)
        }
        rejected => Err(Error::RpcRejected(rejected.to_string())),
    }
}

/// Encodes a complete reply datagram; the counterpart of [split_reply] and
/// [accepted_results], used by tools that answer calls.
pub fn encode_reply(msg: &rpc_msg, results: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut datagram = xdr::serialize_to_vec(msg)?;
    datagram.extend_from_slice(results);
    datagram.resize(datagram.len().next_multiple_of(ALIGNMENT), 0);
    Ok(datagram)
}
