//! MOUNT version 1 structures (RFC 1094 Appendix A).
//!
//! The players implement the first MOUNT protocol version that pairs with NFS
//! version 2: MNT answers an `fhstatus` carrying a fixed-size file handle.

#![allow(non_camel_case_types)]

use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::nfs2::{fhandle, utf16string};
use super::*;

/// MOUNT program number for RPC
pub const PROGRAM: u32 = 100005;
/// MOUNT protocol version 1
pub const VERSION: u32 = 1;

/// Maximum bytes in a path name
pub const MNTPATHLEN: u32 = 1024;

/// Export path on the server, UTF-16LE on the players.
pub type dirpath = utf16string;

/// Procedure numbers of the MOUNT version 1 protocol.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum MountProgram {
    MOUNTPROC_NULL = 0,
    MOUNTPROC_MNT = 1,
    MOUNTPROC_DUMP = 2,
    MOUNTPROC_UMNT = 3,
    MOUNTPROC_UMNTALL = 4,
    MOUNTPROC_EXPORT = 5,
}

/// Result of MNT: a zero status followed by the handle of the export
/// root, or a non-zero UNIX errno and nothing else.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum fhstatus {
    Mounted(fhandle),
    Failed(u32),
}

impl Default for fhstatus {
    fn default() -> Self {
        fhstatus::Failed(0)
    }
}

impl Serialize for fhstatus {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            fhstatus::Mounted(handle) => {
                0_u32.serialize(dest)?;
                handle.serialize(dest)
            }
            fhstatus::Failed(status) => status.serialize(dest),
        }
    }
}

impl Deserialize for fhstatus {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<u32>(src)? {
            0 => fhstatus::Mounted(deserialize(src)?),
            status => fhstatus::Failed(status),
        };
        Ok(())
    }
}
