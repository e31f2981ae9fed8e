//! MOUNT version 1 client procedures (RFC 1094 Appendix A).

mod mnt;
mod umnt;

pub use mnt::mountproc_mnt;
pub use umnt::mountproc_umnt;
