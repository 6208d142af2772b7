//! Client-side error taxonomy

use std::fmt;
use std::io;

/// Everything a client call can fail with.
///
/// `Auth` and `Transfer` carry the server's `ERROR|` detail text and leave
/// the connection usable; the other variants mean the connection (or the
/// received file) should not be trusted further.
#[derive(Debug)]
pub enum ClientError {
    /// The stream or local disk failed.
    Io(io::Error),
    /// The peer spoke something that is not the protocol (bad handshake,
    /// unparseable reply).
    Protocol(String),
    /// The server rejected credentials or a signup.
    Auth(String),
    /// The server aborted the current transfer.
    Transfer(String),
    /// The received file does not match the checksum the server sent.
    ChecksumMismatch,
    /// The server announced shutdown; no further requests will be served.
    ServerShutdown,
}

impl fmt::Display for ClientError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientError::Io(e) => write!(f, "I/O error: {e}"),
            ClientError::Protocol(msg) => write!(f, "protocol error: {msg}"),
            ClientError::Auth(msg) => write!(f, "authentication failed: {msg}"),
            ClientError::Transfer(msg) => write!(f, "transfer failed: {msg}"),
            ClientError::ChecksumMismatch => {
                write!(f, "received file does not match the server checksum")
            }
            ClientError::ServerShutdown => write!(f, "server is shutting down"),
        }
    }
}

impl std::error::Error for ClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClientError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for ClientError {
    fn from(e: io::Error) -> Self {
        ClientError::Io(e)
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
