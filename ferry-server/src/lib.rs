//! Ferry file transfer server
//!
//! Serves authenticated uploads, downloads, and listings over one
//! persistent TCP connection per client. Integration tests drive the
//! server through these modules; the `ferryd` binary wires them to the
//! command line and signal handling.

pub mod args;
pub mod connection;
pub mod constants;
pub mod files;
pub mod registry;
pub mod server;
pub mod transfers;
pub mod users;
