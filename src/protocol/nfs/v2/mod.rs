//! NFS version 2 client procedures (RFC 1094 section 2.2).

mod lookup;
mod read;

pub use lookup::{nfsproc_lookup, nfsproc_lookup_path, LookupResult};
pub use read::{nfsproc_read, ReadChunk};
