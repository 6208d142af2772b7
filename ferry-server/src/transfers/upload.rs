//! UPLOAD handling
//!
//! Receives one file from the peer: collision-safe naming, declared size,
//! checksum exchange, exact-length streaming, then SHA-256 verification of
//! what actually hit the disk. A file that fails verification or arrives
//! short never survives.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite};

use ferry_common::framing::{LineReader, LineWriter};
use ferry_common::hash::compute_sha256;
use ferry_common::protocol::{
    CHECKSUM_OK, FILENAME_OK, NEW_FILENAME, READY, SEPARATOR, SUCCESS, error_reply, parse_checksum,
};

use crate::constants::{
    ERR_CHECKSUM_MISMATCH, ERR_INVALID_CHECKSUM, ERR_INVALID_SIZE, ERR_UPLOAD_INCOMPLETE,
};
use crate::files;

use super::{
    TransferContext, TransferError, TransferResult, expect_line, invalid_name, report,
    resolve_storage_root,
};

/// Handle an UPLOAD command for an authenticated session.
pub async fn handle_upload<R, W>(
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    ctx: &TransferContext<'_>,
    requested: &str,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let transfer_id = uuid::Uuid::new_v4().simple().to_string();

    if ctx.debug {
        eprintln!(
            "Upload {transfer_id}: '{requested}' from {} (user: {})",
            ctx.peer_addr, ctx.username
        );
    }

    let result = receive_file(reader, writer, ctx, requested).await;

    if ctx.debug {
        match &result {
            Ok(stored) => eprintln!("Upload {transfer_id}: stored as '{stored}'"),
            Err(e) => eprintln!("Upload {transfer_id}: failed: {e:?}"),
        }
    }

    report(writer, result.map(|_| ())).await
}

/// Run the upload exchange, returning the stored filename.
async fn receive_file<R, W>(
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    ctx: &TransferContext<'_>,
    requested: &str,
) -> TransferResult<String>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let storage_root = resolve_storage_root(ctx)?;

    // Validate the name before replying; a bad name aborts the transfer
    // before the peer commits to sending anything
    files::resolve_new(&storage_root, requested).map_err(invalid_name)?;

    let (dest_path, stored_name) = files::unique_destination(&storage_root, requested);
    if stored_name == requested {
        writer.write_line(FILENAME_OK).await?;
    } else {
        writer
            .write_line(&format!("{NEW_FILENAME}{SEPARATOR}{stored_name}"))
            .await?;
    }

    let size_line = expect_line(reader).await?;
    let declared_size: u64 = size_line
        .parse()
        .map_err(|_| TransferError::new(ERR_INVALID_SIZE))?;

    writer.write_line(READY).await?;

    let checksum_line = expect_line(reader).await?;
    let declared_checksum = parse_checksum(&checksum_line)
        .ok_or_else(|| TransferError::new(ERR_INVALID_CHECKSUM))?
        .to_ascii_lowercase();

    writer.write_line(CHECKSUM_OK).await?;

    stream_to_file(reader, writer, &dest_path, declared_size).await?;

    // Hash what the disk actually holds, not what passed through memory
    let actual_checksum = match compute_sha256(&dest_path).await {
        Ok(hex) => hex,
        Err(e) => {
            let _ = tokio::fs::remove_file(&dest_path).await;
            return Err(e.into());
        }
    };

    if actual_checksum != declared_checksum {
        let _ = tokio::fs::remove_file(&dest_path).await;
        return Err(TransferError::new(ERR_CHECKSUM_MISMATCH).into());
    }

    writer.write_line(SUCCESS).await?;

    Ok(stored_name)
}

/// Stream exactly `declared_size` bytes into `dest_path`.
///
/// A short stream means the peer disconnected mid-payload: the partial file
/// is deleted, an `ERROR|` is attempted best-effort, and the failure
/// propagates as fatal since the stream is dead anyway.
async fn stream_to_file<R, W>(
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    dest_path: &Path,
    declared_size: u64,
) -> TransferResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut file = tokio::fs::File::create(dest_path).await?;

    if let Err(e) = reader.read_payload(declared_size, &mut file).await {
        drop(file);
        let _ = tokio::fs::remove_file(dest_path).await;
        if e.kind() == std::io::ErrorKind::UnexpectedEof {
            let _ = writer.write_line(&error_reply(ERR_UPLOAD_INCOMPLETE)).await;
        }
        return Err(e.into());
    }

    if let Err(e) = file.sync_all().await {
        drop(file);
        let _ = tokio::fs::remove_file(dest_path).await;
        return Err(e.into());
    }

    Ok(())
}
