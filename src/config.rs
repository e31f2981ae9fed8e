//! Client configuration.
//!
//! [ClientConfig] is a plain value with defaults suited to real players and
//! `with_*` builder methods. It is handed to the client once and never
//! changes afterwards.

use std::collections::BTreeMap;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::udp::DEFAULT_AUTH_STAMP;
use crate::xdr::portmap;

/// Bytes requested per READ unless a request overrides it.
pub const DEFAULT_CHUNK_SIZE: u32 = 1350;
pub const MIN_CHUNK_SIZE: u32 = 1000;
pub const MAX_CHUNK_SIZE: u32 = 60_000;

pub const DEFAULT_DOWNLOAD_DIRECTORY: &str = "./downloads/";
pub const DEFAULT_SYNC_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// Maps media slot names to the export path a player serves them under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExportTable {
    exports: BTreeMap<String, String>,
}

impl Default for ExportTable {
    fn default() -> Self {
        ExportTable::empty().with_export("sd", "/B/").with_export("usb", "/C/")
    }
}

impl ExportTable {
    /// A table without any slot.
    pub fn empty() -> Self {
        ExportTable { exports: BTreeMap::new() }
    }

    /// Adds or replaces the export of `slot`.
    pub fn with_export(mut self, slot: impl Into<String>, export: impl Into<String>) -> Self {
        self.exports.insert(slot.into(), export.into());
        self
    }

    pub fn export_for(&self, slot: &str) -> Option<&str> {
        self.exports.get(slot).map(String::as_str)
    }

    pub fn slots(&self) -> impl Iterator<Item = &str> {
        self.exports.keys().map(String::as_str)
    }
}

/// Settings of an [NfsClient](crate::NfsClient).
#[derive(Clone, Debug)]
pub struct ClientConfig {
    pub exports: ExportTable,
    chunk_size: u32,
    /// Directory mount-info downloads are saved into
    pub download_directory: PathBuf,
    /// How long the blocking entry points wait for a result
    pub sync_timeout: Duration,
    /// How long a single RPC call waits for its reply
    pub call_timeout: Duration,
    /// Port of the port mapper on the players
    pub portmap_port: u16,
    /// Local address the UDP socket binds to
    pub bind_address: SocketAddr,
    /// Stamp of the `AUTH_UNIX` credential
    pub auth_stamp: u32,
    /// Send MOUNT UMNT once a download finished
    pub unmount_after_download: bool,
    /// Give downloaded files the modification time reported by the player
    pub preserve_mtime: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            exports: ExportTable::default(),
            chunk_size: DEFAULT_CHUNK_SIZE,
            download_directory: PathBuf::from(DEFAULT_DOWNLOAD_DIRECTORY),
            sync_timeout: DEFAULT_SYNC_TIMEOUT,
            call_timeout: DEFAULT_CALL_TIMEOUT,
            portmap_port: portmap::PORT,
            bind_address: SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)),
            auth_stamp: DEFAULT_AUTH_STAMP,
            unmount_after_download: false,
            preserve_mtime: false,
        }
    }
}

impl ClientConfig {
    pub fn chunk_size(&self) -> u32 {
        self.chunk_size
    }

    /// Sets the default READ size; it must lie within
    /// [MIN_CHUNK_SIZE]..=[MAX_CHUNK_SIZE].
    pub fn with_chunk_size(mut self, chunk_size: u32) -> Result<Self> {
        self.chunk_size = validate_chunk_size(chunk_size)?;
        Ok(self)
    }

    pub fn with_exports(mut self, exports: ExportTable) -> Self {
        self.exports = exports;
        self
    }

    pub fn with_download_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_directory = dir.into();
        self
    }

    pub fn with_sync_timeout(mut self, timeout: Duration) -> Self {
        self.sync_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Duration) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_portmap_port(mut self, port: u16) -> Self {
        self.portmap_port = port;
        self
    }

    pub fn with_bind_address(mut self, address: SocketAddr) -> Self {
        self.bind_address = address;
        self
    }

    pub fn with_auth_stamp(mut self, stamp: u32) -> Self {
        self.auth_stamp = stamp;
        self
    }

    pub fn with_unmount_after_download(mut self, unmount: bool) -> Self {
        self.unmount_after_download = unmount;
        self
    }

    pub fn with_preserve_mtime(mut self, preserve: bool) -> Self {
        self.preserve_mtime = preserve;
        self
    }
}

pub(crate) fn validate_chunk_size(chunk_size: u32) -> Result<u32> {
    if (MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&chunk_size) {
        Ok(chunk_size)
    } else {
        Err(Error::InvalidChunkSize(chunk_size))
    }
}
