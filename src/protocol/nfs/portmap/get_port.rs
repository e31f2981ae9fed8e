//! GETPORT (procedure 3) of the port mapper.

use std::net::{IpAddr, SocketAddr};

use tracing::debug;

use crate::error::Error;
use crate::protocol::rpc::{self, PmapGetPort, RpcCaller};
use crate::xdr::portmap;

/// Asks the port mapper at `host:portmap_port` where `program`/`version`
/// listens for `protocol` (one of the `IPPROTO_*` constants).
///
/// A port of zero means the program is not registered and is reported as
/// [Error::ServiceUnavailable].
pub async fn pmapproc_getport(
    caller: &dyn RpcCaller,
    host: IpAddr,
    portmap_port: u16,
    program: u32,
    version: u32,
    protocol: u32,
) -> Result<u16, Error> {
    let args = portmap::mapping { prog: program, vers: version, prot: protocol, port: 0 };
    debug!("pmapproc_getport({}, {:?})", host, args);
    let port = rpc::call::<PmapGetPort>(caller, SocketAddr::new(host, portmap_port), &args).await?;
    debug!("\t{} program {} --> port {}", host, program, port);
    match u16::try_from(port) {
        Ok(0) => Err(Error::ServiceUnavailable { program, version }),
        Ok(port) => Ok(port),
        Err(_) => Err(Error::Codec(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("port {port} out of range"),
        ))),
    }
}
