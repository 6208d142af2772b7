//! Transfer engine: UPLOAD, DOWNLOAD, and LIST handling
//!
//! Each handler runs one request/response exchange on the session's stream.
//! A [`TransferError`] aborts only the current transfer: it is reported to
//! the peer as `ERROR|<message>` and the session stays active. An
//! [`io::Error`] means the stream or disk failed underneath us and
//! propagates up to tear the connection down.

use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};

use ferry_common::framing::{LineReader, LineWriter};
use ferry_common::protocol::error_reply;

use crate::constants::ERR_STORAGE_UNAVAILABLE;
use crate::files::PathError;
use crate::users::UserStore;

pub mod download;
pub mod list;
pub mod upload;

/// Recoverable transfer failure, reported to the peer in-protocol.
#[derive(Debug, Clone)]
pub struct TransferError {
    /// Text sent to the peer after `ERROR|`
    pub message: String,
}

impl TransferError {
    /// Create a new transfer error
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransferError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for TransferError {}

/// How one transfer exchange ended short of success.
#[derive(Debug)]
pub(crate) enum TransferFailure {
    /// Recoverable; the session replies `ERROR|` and stays active
    Aborted(TransferError),
    /// Fatal; propagates and tears the connection down
    Io(io::Error),
}

impl From<TransferError> for TransferFailure {
    fn from(e: TransferError) -> Self {
        TransferFailure::Aborted(e)
    }
}

impl From<io::Error> for TransferFailure {
    fn from(e: io::Error) -> Self {
        TransferFailure::Io(e)
    }
}

pub(crate) type TransferResult<T> = Result<T, TransferFailure>;

/// Per-session context shared by every transfer handler.
pub struct TransferContext<'a> {
    pub users: &'a UserStore,
    pub username: &'a str,
    pub peer_addr: SocketAddr,
    pub debug: bool,
}

/// Resolve and canonicalize the authenticated user's storage root.
///
/// Canonicalized per transfer rather than cached; containment checks
/// compare against the canonical form.
pub(crate) fn resolve_storage_root(ctx: &TransferContext<'_>) -> Result<PathBuf, TransferError> {
    let root = ctx
        .users
        .storage_root(ctx.username)
        .ok_or_else(|| TransferError::new(ERR_STORAGE_UNAVAILABLE))?;
    std::fs::canonicalize(&root).map_err(|_| TransferError::new(ERR_STORAGE_UNAVAILABLE))
}

/// Read the next control line inside a transfer exchange.
///
/// The peer owes us a reply here, so EOF is not a clean close; it becomes
/// `UnexpectedEof` and tears the connection down.
pub(crate) async fn expect_line<R>(reader: &mut LineReader<R>) -> TransferResult<String>
where
    R: AsyncRead + Unpin,
{
    match reader.read_line().await {
        Ok(Some(line)) => Ok(line),
        Ok(None) => Err(TransferFailure::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "peer closed the stream mid-transfer",
        ))),
        Err(e) => Err(TransferFailure::Io(e)),
    }
}

/// Convert a transfer outcome into the session's command-loop result.
///
/// Recoverable failures become an `ERROR|` reply and `Ok(())`; fatal ones
/// propagate.
pub(crate) async fn report<W>(
    writer: &mut LineWriter<W>,
    result: TransferResult<()>,
) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    match result {
        Ok(()) => Ok(()),
        Err(TransferFailure::Aborted(e)) => writer.write_line(&error_reply(&e.message)).await,
        Err(TransferFailure::Io(e)) => Err(e),
    }
}

/// Map a path resolution failure to a recoverable transfer error.
pub(crate) fn invalid_name(_e: PathError) -> TransferError {
    TransferError::new(crate::constants::ERR_INVALID_FILENAME)
}
