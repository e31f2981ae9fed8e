//! Downloading one file from a player.
//!
//! A download walks through the states of [DownloadState]: the MOUNT and
//! NFS ports are looked up through the port mapper, the export of the
//! requested slot is mounted, the remote path is resolved one component at
//! a time and the file is read sequentially in chunks until the player
//! returns fewer bytes than asked for.
//!
//! Reads of one download never overlap: the next READ is only sent once the
//! previous reply arrived. Different downloads interleave freely on the
//! shared transport.

use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Instant;

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, trace, warn};

use crate::config::{validate_chunk_size, ClientConfig};
use crate::error::{Error, Result};
use crate::protocol::nfs::{mount, portmap, v2};
use crate::protocol::rpc::RpcCaller;
use crate::xdr::nfs2::{self, fattr, fhandle, nfsstat};

/// What to download and where to put it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DownloadRequest {
    pub address: IpAddr,
    /// Media slot, a key of the [ExportTable](crate::ExportTable)
    pub slot: String,
    /// Slash separated path below the export
    pub remote_path: String,
    /// Local file to write; the contents are kept in memory when `None`
    pub destination: Option<PathBuf>,
    /// Overrides the configured READ size
    pub chunk_size: Option<u32>,
}

impl DownloadRequest {
    /// Downloads into memory.
    pub fn to_buffer(
        address: IpAddr,
        slot: impl Into<String>,
        remote_path: impl Into<String>,
    ) -> Self {
        DownloadRequest {
            address,
            slot: slot.into(),
            remote_path: remote_path.into(),
            destination: None,
            chunk_size: None,
        }
    }

    /// Downloads into the local file `destination`.
    pub fn to_file(
        address: IpAddr,
        slot: impl Into<String>,
        remote_path: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        DownloadRequest {
            destination: Some(destination.into()),
            ..DownloadRequest::to_buffer(address, slot, remote_path)
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: u32) -> Self {
        self.chunk_size = Some(chunk_size);
        self
    }
}

impl fmt::Display for DownloadRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.address, self.slot, self.remote_path)
    }
}

/// Result of a successful download.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Downloaded {
    Buffer(Vec<u8>),
    File { path: PathBuf, size: u64 },
}

impl Downloaded {
    /// Number of bytes downloaded.
    pub fn len(&self) -> u64 {
        match self {
            Downloaded::Buffer(data) => data.len() as u64,
            Downloaded::File { size, .. } => *size,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Progress of a download.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DownloadState {
    ResolvingPort,
    Mounting,
    ResolvingPath,
    Reading,
    Complete,
    Failed,
}

/// Where the file contents go.
enum Sink {
    Buffer(Vec<u8>),
    File { file: tokio::fs::File, path: PathBuf, written: u64 },
}

impl Sink {
    async fn open(destination: Option<&Path>) -> Result<Sink> {
        let Some(path) = destination else {
            return Ok(Sink::Buffer(Vec::new()));
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let file = tokio::fs::File::create(path).await?;
        Ok(Sink::File { file, path: path.to_path_buf(), written: 0 })
    }

    async fn append(&mut self, data: &[u8]) -> Result<()> {
        match self {
            Sink::Buffer(buffer) => buffer.extend_from_slice(data),
            Sink::File { file, written, .. } => {
                file.write_all(data).await?;
                *written += data.len() as u64;
            }
        }
        Ok(())
    }

    async fn finish(self) -> Result<Downloaded> {
        match self {
            Sink::Buffer(buffer) => Ok(Downloaded::Buffer(buffer)),
            Sink::File { mut file, path, written } => {
                file.flush().await?;
                Ok(Downloaded::File { path, size: written })
            }
        }
    }
}

/// State of one download run.
struct DownloadSession<'a> {
    caller: &'a dyn RpcCaller,
    config: &'a ClientConfig,
    request: &'a DownloadRequest,
    state: DownloadState,
}

impl<'a> DownloadSession<'a> {
    fn enter(&mut self, state: DownloadState) {
        trace!("{}: {:?} -> {:?}", self.request, self.state, state);
        self.state = state;
    }

    async fn service_address(&self, program: u32, version: u32) -> Result<SocketAddr> {
        let port = portmap::pmapproc_getport(
            self.caller,
            self.request.address,
            self.config.portmap_port,
            program,
            version,
            crate::xdr::portmap::IPPROTO_UDP,
        )
        .await?;
        Ok(SocketAddr::new(self.request.address, port))
    }

    async fn run(&mut self, export: &str, chunk_size: u32) -> Result<Downloaded> {
        self.enter(DownloadState::ResolvingPort);
        let mount_address =
            self.service_address(crate::xdr::mount::PROGRAM, crate::xdr::mount::VERSION).await?;
        let nfs_address = self.service_address(nfs2::PROGRAM, nfs2::VERSION).await?;
        debug!("{}: mount at {}, nfs at {}", self.request, mount_address, nfs_address);

        self.enter(DownloadState::Mounting);
        let root = mount::mountproc_mnt(self.caller, mount_address, export).await?;

        let result = self.fetch(nfs_address, root, chunk_size).await;

        if self.config.unmount_after_download {
            if let Err(e) = mount::mountproc_umnt(self.caller, mount_address, export).await {
                warn!("{}: unmounting {} failed: {}", self.request, export, e);
            }
        }
        result
    }

    async fn fetch(
        &mut self,
        nfs_address: SocketAddr,
        root: fhandle,
        chunk_size: u32,
    ) -> Result<Downloaded> {
        self.enter(DownloadState::ResolvingPath);
        let target =
            v2::nfsproc_lookup_path(self.caller, nfs_address, root, &self.request.remote_path)
                .await?;

        self.enter(DownloadState::Reading);
        let mut sink = Sink::open(self.request.destination.as_deref()).await?;
        let attributes =
            read_to_end(self.caller, nfs_address, &target, chunk_size, &mut sink, self.request)
                .await?;
        let downloaded = sink.finish().await?;

        if self.config.preserve_mtime {
            if let Downloaded::File { path, .. } = &downloaded {
                set_mtime(path, &attributes);
            }
        }
        Ok(downloaded)
    }
}

/// Reads the whole file into `sink` and returns the last attributes the
/// player reported for it.
async fn read_to_end(
    caller: &dyn RpcCaller,
    nfs_address: SocketAddr,
    target: &v2::LookupResult,
    chunk_size: u32,
    sink: &mut Sink,
    request: &DownloadRequest,
) -> Result<fattr> {
    let expected = target.attributes.size;
    let started = Instant::now();
    let mut attributes = target.attributes;
    let mut offset: u32 = 0;
    let mut reported_decile = 0;
    loop {
        let chunk = v2::nfsproc_read(caller, nfs_address, target.handle, offset, chunk_size).await?;
        attributes = chunk.attributes;
        sink.append(&chunk.data).await?;
        let received = u32::try_from(chunk.data.len()).unwrap_or(u32::MAX);
        offset = offset
            .checked_add(received)
            .ok_or(Error::ReadFailed { status: nfsstat::NFSERR_FBIG })?;

        if expected > 0 {
            let decile = (u64::from(offset) * 10 / u64::from(expected)).min(10);
            if decile > reported_decile {
                reported_decile = decile;
                debug!("{}: {}/{} bytes", request, offset, expected);
            }
        }
        if chunk.is_eof() {
            break;
        }
    }
    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > 0.0 {
        debug!(
            "{}: read {} bytes in {:.2}s ({:.1} KiB/s)",
            request,
            offset,
            elapsed,
            f64::from(offset) / 1024.0 / elapsed
        );
    }
    Ok(attributes)
}

fn set_mtime(path: &Path, attributes: &fattr) {
    let mtime = filetime::FileTime::from(attributes.mtime);
    if let Err(e) = filetime::set_file_mtime(path, mtime) {
        warn!("could not set modification time of {}: {}", path.display(), e);
    }
}

/// Runs `request` to completion.
///
/// The slot and the chunk size are checked before anything is sent. Errors
/// of the failing step are returned unchanged; a partially written file is
/// left in place.
pub async fn download(
    caller: &dyn RpcCaller,
    config: &ClientConfig,
    request: &DownloadRequest,
) -> Result<Downloaded> {
    let export = config
        .exports
        .export_for(&request.slot)
        .ok_or_else(|| Error::UnknownSlot(request.slot.clone()))?;
    let chunk_size = match request.chunk_size {
        Some(chunk_size) => validate_chunk_size(chunk_size)?,
        None => config.chunk_size(),
    };

    info!("downloading {} from export {}", request, export);
    let mut session =
        DownloadSession { caller, config, request, state: DownloadState::ResolvingPort };
    match session.run(export, chunk_size).await {
        Ok(downloaded) => {
            session.enter(DownloadState::Complete);
            info!("{}: downloaded {} bytes", request, downloaded.len());
            Ok(downloaded)
        }
        Err(e) => {
            let failed_in = session.state;
            session.enter(DownloadState::Failed);
            debug!("{}: failed while {:?}: {}", request, failed_in, e);
            Err(e)
        }
    }
}
