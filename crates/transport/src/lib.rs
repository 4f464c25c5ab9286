//! treesum-transport: TCP wire layer
//!
//! Dials and serves the checksum protocol: a plain-TCP client session, a
//! per-connection server handler, and a listener that optionally terminates
//! TLS.

pub mod client;
pub mod config;
pub mod listen;
pub mod server;

pub use client::Client;
pub use config::{ServerConfig, TlsConfig};
pub use listen::serve;
pub use server::Handler;
