//! NFS version 2 data types (RFC 1094).
//!
//! The players serve their media over NFSv2: 32-bit offsets and sizes,
//! fixed 32-byte file handles and no EOF flag on READ. File names are
//! UTF-16LE strings rather than the ASCII the RFC describes.

// Allow unused items, the RFC tables are kept complete
#![allow(dead_code)]
#![allow(non_camel_case_types)]

use std::fmt;
use std::io::{Read, Write};

use num_derive::{FromPrimitive, ToPrimitive};

use super::{deserialize, utils, Deserialize, DeserializeEnum, Serialize, SerializeEnum};
use crate::{DeserializeStruct, SerializeStruct};

pub mod dir;
pub mod file;

/// The RPC program number of NFS.
pub const PROGRAM: u32 = 100003;
/// NFS protocol version 2.
pub const VERSION: u32 = 2;

/// Size in bytes of the opaque file handle.
pub const FHSIZE: usize = 32;
/// Largest amount of data in a READ or WRITE request.
pub const MAXDATA: u32 = 8192;
/// Maximum bytes in a file name.
pub const MAXNAMLEN: u32 = 255;

/// Procedure numbers of NFS version 2.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, PartialEq, Eq, FromPrimitive, ToPrimitive)]
pub enum NFSProgram {
    NFSPROC_NULL = 0,
    NFSPROC_GETATTR = 1,
    NFSPROC_SETATTR = 2,
    NFSPROC_ROOT = 3,
    NFSPROC_LOOKUP = 4,
    NFSPROC_READLINK = 5,
    NFSPROC_READ = 6,
    NFSPROC_WRITECACHE = 7,
    NFSPROC_WRITE = 8,
    NFSPROC_CREATE = 9,
    NFSPROC_REMOVE = 10,
    NFSPROC_RENAME = 11,
    NFSPROC_LINK = 12,
    NFSPROC_SYMLINK = 13,
    NFSPROC_MKDIR = 14,
    NFSPROC_RMDIR = 15,
    NFSPROC_READDIR = 16,
    NFSPROC_STATFS = 17,
}

macro_rules! nfs_status {
    ($($(#[$doc:meta])* $name:ident = $value:literal,)*) => {
        impl nfsstat {
            $($(#[$doc])* pub const $name: nfsstat = nfsstat($value);)*

            /// RFC 1094 name of the status, if it is one the RFC lists.
            pub fn name(self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

/// Status of an NFS call.
///
/// Firmware answers codes the RFC does not list, so any value decodes and
/// every value other than `NFS_OK` is a failure.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct nfsstat(pub u32);

nfs_status! {
    NFS_OK = 0,
    /// Not owner
    NFSERR_PERM = 1,
    /// No such file or directory
    NFSERR_NOENT = 2,
    /// Hard I/O error
    NFSERR_IO = 5,
    /// No such device or address
    NFSERR_NXIO = 6,
    /// Permission denied
    NFSERR_ACCES = 13,
    /// File exists
    NFSERR_EXIST = 17,
    /// No such device
    NFSERR_NODEV = 19,
    /// Not a directory
    NFSERR_NOTDIR = 20,
    /// Is a directory
    NFSERR_ISDIR = 21,
    /// File too large
    NFSERR_FBIG = 27,
    /// No space left on device
    NFSERR_NOSPC = 28,
    /// Read-only file system
    NFSERR_ROFS = 30,
    /// File name too long
    NFSERR_NAMETOOLONG = 63,
    /// Directory not empty
    NFSERR_NOTEMPTY = 66,
    /// Disc quota exceeded
    NFSERR_DQUOT = 69,
    /// Stale file handle
    NFSERR_STALE = 70,
    /// Write cache flushed
    NFSERR_WFLUSH = 99,
}

impl nfsstat {
    pub fn is_ok(self) -> bool {
        self == nfsstat::NFS_OK
    }
}

impl fmt::Debug for nfsstat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "nfsstat({})", self.0),
        }
    }
}

impl fmt::Display for nfsstat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl Serialize for nfsstat {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}

impl Deserialize for nfsstat {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.deserialize(src)
    }
}

/// Type of a file system object.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, FromPrimitive, ToPrimitive)]
#[repr(u32)]
pub enum ftype {
    #[default]
    NFNON = 0,
    NFREG = 1,
    NFDIR = 2,
    NFBLK = 3,
    NFCHR = 4,
    NFLNK = 5,
}
impl SerializeEnum for ftype {}
impl DeserializeEnum for ftype {}

/// Opaque handle of a file or directory within a mount. Only ever handed
/// back to the server that issued it.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash)]
pub struct fhandle(pub [u8; FHSIZE]);

impl fmt::Debug for fhandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl Serialize for fhandle {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        self.0.serialize(dest)
    }
}

impl Deserialize for fhandle {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        self.0.deserialize(src)
    }
}

/// A path or file name as the players put it on the wire: UTF-16LE code
/// units inside a variable-length opaque, the length counting bytes.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct utf16string(pub String);

impl utf16string {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for utf16string {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl From<String> for utf16string {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Debug for utf16string {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.0)
    }
}

impl fmt::Display for utf16string {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for utf16string {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        let bytes: Vec<u8> = self.0.encode_utf16().flat_map(u16::to_le_bytes).collect();
        bytes.serialize(dest)
    }
}

impl Deserialize for utf16string {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        let bytes = deserialize::<Vec<u8>>(src)?;
        if bytes.len() % 2 != 0 {
            return Err(utils::invalid_data("odd length UTF-16 string"));
        }
        let units: Vec<u16> =
            bytes.chunks_exact(2).map(|unit| u16::from_le_bytes([unit[0], unit[1]])).collect();
        self.0 = String::from_utf16(&units).map_err(|_| utils::invalid_data("invalid UTF-16"))?;
        Ok(())
    }
}

/// Seconds and microseconds since the epoch.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct timeval {
    pub seconds: u32,
    pub useconds: u32,
}
DeserializeStruct!(timeval, seconds, useconds);
SerializeStruct!(timeval, seconds, useconds);

impl From<timeval> for filetime::FileTime {
    fn from(time: timeval) -> Self {
        filetime::FileTime::from_unix_time(time.seconds as i64, time.useconds.saturating_mul(1000))
    }
}

/// File attributes returned with every LOOKUP and READ result.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct fattr {
    pub ftype: ftype,
    pub mode: u32,
    pub nlink: u32,
    pub uid: u32,
    pub gid: u32,
    pub size: u32,
    pub blocksize: u32,
    pub rdev: u32,
    pub blocks: u32,
    pub fsid: u32,
    pub fileid: u32,
    pub atime: timeval,
    pub mtime: timeval,
    pub ctime: timeval,
}
DeserializeStruct!(
    fattr, ftype, mode, nlink, uid, gid, size, blocksize, rdev, blocks, fsid, fileid, atime,
    mtime, ctime
);
SerializeStruct!(
    fattr, ftype, mode, nlink, uid, gid, size, blocksize, rdev, blocks, fsid, fileid, atime,
    mtime, ctime
);
