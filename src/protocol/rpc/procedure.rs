//! The closed set of remote procedures the client calls.
//!
//! Each [Procedure] knows its program, version and procedure number, and
//! each has a marker type implementing [RpcProcedure] that fixes the XDR
//! structures of its arguments and reply. Encoders are always selected
//! through this table, never by inspecting a payload.

use std::fmt;

use num_traits::ToPrimitive;

use crate::xdr::{self, mount, nfs2, portmap, Deserialize, Serialize};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Procedure {
    PortmapGetPort,
    MountMnt,
    MountUmnt,
    NfsLookup,
    NfsRead,
}

impl Procedure {
    pub const ALL: [Procedure; 5] = [
        Procedure::PortmapGetPort,
        Procedure::MountMnt,
        Procedure::MountUmnt,
        Procedure::NfsLookup,
        Procedure::NfsRead,
    ];

    pub fn program(self) -> u32 {
        match self {
            Procedure::PortmapGetPort => portmap::PROGRAM,
            Procedure::MountMnt | Procedure::MountUmnt => mount::PROGRAM,
            Procedure::NfsLookup | Procedure::NfsRead => nfs2::PROGRAM,
        }
    }

    pub fn version(self) -> u32 {
        match self {
            Procedure::PortmapGetPort => portmap::VERSION,
            Procedure::MountMnt | Procedure::MountUmnt => mount::VERSION,
            Procedure::NfsLookup | Procedure::NfsRead => nfs2::VERSION,
        }
    }

    pub fn number(self) -> u32 {
        let number = match self {
            Procedure::PortmapGetPort => portmap::PortmapProgram::PMAPPROC_GETPORT.to_u32(),
            Procedure::MountMnt => mount::MountProgram::MOUNTPROC_MNT.to_u32(),
            Procedure::MountUmnt => mount::MountProgram::MOUNTPROC_UMNT.to_u32(),
            Procedure::NfsLookup => nfs2::NFSProgram::NFSPROC_LOOKUP.to_u32(),
            Procedure::NfsRead => nfs2::NFSProgram::NFSPROC_READ.to_u32(),
        };
        // every discriminant above is a small non-negative literal
        number.unwrap_or_default()
    }

    /// Maps the header of a call back to the procedure it invokes.
    pub fn from_call(prog: u32, vers: u32, proc: u32) -> Option<Procedure> {
        Procedure::ALL
            .into_iter()
            .find(|p| p.program() == prog && p.version() == vers && p.number() == proc)
    }
}

impl fmt::Display for Procedure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Procedure::PortmapGetPort => "portmap getport",
            Procedure::MountMnt => "mount mnt",
            Procedure::MountUmnt => "mount umnt",
            Procedure::NfsLookup => "nfs lookup",
            Procedure::NfsRead => "nfs read",
        };
        f.write_str(name)
    }
}

/// Ties a [Procedure] to the structures it exchanges.
pub trait RpcProcedure {
    const PROCEDURE: Procedure;
    type Args: Serialize + Sync;
    type Reply: Deserialize + Default;
}

pub struct PmapGetPort;
impl RpcProcedure for PmapGetPort {
    const PROCEDURE: Procedure = Procedure::PortmapGetPort;
    type Args = portmap::mapping;
    type Reply = u32;
}

pub struct MountMnt;
impl RpcProcedure for MountMnt {
    const PROCEDURE: Procedure = Procedure::MountMnt;
    type Args = mount::dirpath;
    type Reply = mount::fhstatus;
}

pub struct MountUmnt;
impl RpcProcedure for MountUmnt {
    const PROCEDURE: Procedure = Procedure::MountUmnt;
    type Args = mount::dirpath;
    type Reply = ();
}

pub struct NfsLookup;
impl RpcProcedure for NfsLookup {
    const PROCEDURE: Procedure = Procedure::NfsLookup;
    type Args = nfs2::dir::diropargs;
    type Reply = nfs2::dir::diropres;
}

pub struct NfsRead;
impl RpcProcedure for NfsRead {
    const PROCEDURE: Procedure = Procedure::NfsRead;
    type Args = nfs2::file::readargs;
    type Reply = nfs2::file::readres;
}

/// Encodes the arguments of `P`.
pub fn encode_args<P: RpcProcedure>(args: &P::Args) -> std::io::Result<Vec<u8>> {
    xdr::serialize_to_vec(args)
}

/// Decodes the reply of `P`. Bytes after the known structure are ignored.
pub fn decode_reply<P: RpcProcedure>(results: &[u8]) -> std::io::Result<P::Reply> {
    xdr::deserialize::<P::Reply>(&mut std::io::Cursor::new(results))
}
