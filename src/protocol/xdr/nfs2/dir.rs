//! Directory operation arguments and results (RFC 1094 section 2.3.10).

use std::io::{Read, Write};

use super::*;

/// A name inside a directory, as sent to LOOKUP.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct diropargs {
    pub dir: fhandle,
    pub name: utf16string,
}
DeserializeStruct!(diropargs, dir, name);
SerializeStruct!(diropargs, dir, name);

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct diropokres {
    pub file: fhandle,
    pub attributes: fattr,
}
DeserializeStruct!(diropokres, file, attributes);
SerializeStruct!(diropokres, file, attributes);

/// LOOKUP result: the handle and attributes of the object on success,
/// only the status otherwise.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum diropres {
    Ok(diropokres),
    Err(nfsstat),
}

impl Default for diropres {
    fn default() -> Self {
        diropres::Ok(diropokres::default())
    }
}

impl Serialize for diropres {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            diropres::Ok(res) => {
                nfsstat::NFS_OK.serialize(dest)?;
                res.serialize(dest)
            }
            diropres::Err(stat) => stat.serialize(dest),
        }
    }
}

impl Deserialize for diropres {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<nfsstat>(src)? {
            nfsstat::NFS_OK => diropres::Ok(deserialize(src)?),
            stat => diropres::Err(stat),
        };
        Ok(())
    }
}
