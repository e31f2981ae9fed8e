//! prodj-nfs - pulling media files off networked DJ players
//!
//! Players on a Pro DJ Link network export their media slots over NFS
//! version 2. This crate is a small ONC RPC client that locates the MOUNT
//! and NFS services through the port mapper, mounts the export of a slot
//! and reads a file in chunks over UDP, delivering it as an in-memory
//! buffer or a file on disk.
//!
//! ## Main Components
//!
//! - `client`: [NfsClient], the facade used by other threads. It owns the
//!   event loop thread, queues download requests and hands back results.
//!
//! - `download`: the steps of a single download, from port lookup to the
//!   last READ.
//!
//! - `udp`: the RPC transport, one UDP socket with a receive loop that
//!   matches replies to calls by transaction id.
//!
//! - `protocol`: XDR encoding, the RPC message layer and typed PORTMAP,
//!   MOUNT and NFS procedures.
//!
//! - `config`: [ClientConfig] and the slot to export table.
//!
//! ## Standards
//!
//! - RFC 1094: NFS Version 2 Protocol Specification (including MOUNT v1)
//! - RFC 5531: RPC: Remote Procedure Call Protocol Specification Version 2
//! - RFC 4506: XDR: External Data Representation Standard
//! - RFC 1833: Binding Protocols for ONC RPC Version 2
//!
//! The players deviate from RFC 1094 in one place: path names sent to MOUNT
//! and LOOKUP are UTF-16LE encoded.
//!
//! ## Usage
//!
//! Create an [NfsClient] from a [ClientConfig], call [NfsClient::start] and
//! enqueue [DownloadRequest]s.

pub mod client;
pub mod command_queue;
pub mod config;
pub mod download;
pub mod error;
pub mod protocol;
pub mod udp;

pub use client::{DataRequest, DownloadHandle, MountInfo, NfsClient, PlayerDirectory};
pub use config::{ClientConfig, ExportTable};
pub use download::{DownloadRequest, DownloadState, Downloaded};
pub use error::{Error, Result};
pub use protocol::xdr;
