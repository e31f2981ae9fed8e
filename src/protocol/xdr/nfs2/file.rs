//! READ arguments and results (RFC 1094 section 2.2.7).

use std::io::{Read, Write};

use super::*;

/// Arguments of READ. `totalcount` is unused by the protocol and sent as 0.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct readargs {
    pub file: fhandle,
    pub offset: u32,
    pub count: u32,
    pub totalcount: u32,
}
DeserializeStruct!(readargs, file, offset, count, totalcount);
SerializeStruct!(readargs, file, offset, count, totalcount);

/// Successful READ: the attributes after the read and the data itself.
/// NFSv2 has no EOF flag, a reply shorter than requested marks the end.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct readokres {
    pub attributes: fattr,
    pub data: Vec<u8>,
}
DeserializeStruct!(readokres, attributes, data);
SerializeStruct!(readokres, attributes, data);

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum readres {
    Ok(readokres),
    Err(nfsstat),
}

impl Default for readres {
    fn default() -> Self {
        readres::Ok(readokres::default())
    }
}

impl Serialize for readres {
    fn serialize<W: Write>(&self, dest: &mut W) -> std::io::Result<()> {
        match self {
            readres::Ok(res) => {
                nfsstat::NFS_OK.serialize(dest)?;
                res.serialize(dest)
            }
            readres::Err(stat) => stat.serialize(dest),
        }
    }
}

impl Deserialize for readres {
    fn deserialize<R: Read>(&mut self, src: &mut R) -> std::io::Result<()> {
        *self = match deserialize::<nfsstat>(src)? {
            nfsstat::NFS_OK => readres::Ok(deserialize(src)?),
            stat => readres::Err(stat),
        };
        Ok(())
    }
}
