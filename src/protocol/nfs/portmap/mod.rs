//! PORTMAP client procedures (RFC 1833 section 3.2).

mod get_port;

pub use get_port::pmapproc_getport;
