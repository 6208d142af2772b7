//! DOWNLOAD handling
//!
//! Sends one stored file to the peer. The target resolves under the
//! authenticated user's storage root with full canonicalization; anything
//! that escapes the root answers exactly like a file that is not there.

use tokio::io::{AsyncRead, AsyncWrite};

use ferry_common::framing::{LineReader, LineWriter};
use ferry_common::hash::compute_sha256;
use ferry_common::protocol::{CHECKSUM_OK, FILE_NOT_FOUND, READY, SUCCESS, checksum_line};

use crate::constants::ERR_UNEXPECTED_REPLY;
use crate::files;

use super::{TransferContext, TransferError, TransferResult, expect_line, report, resolve_storage_root};

/// Handle a DOWNLOAD command for an authenticated session.
pub async fn handle_download<R, W>(
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
            "Download {transfer_id}: '{requested}' to {} (user: {})",
            ctx.peer_addr, ctx.username
        );
    }

    let result = send_file(reader, writer, ctx, requested).await;

    if ctx.debug {
        match &result {
            Ok(sent) => eprintln!("Download {transfer_id}: sent {sent} bytes"),
            Err(e) => eprintln!("Download {transfer_id}: failed: {e:?}"),
        }
    }

    report(writer, result.map(|_| ())).await
}

/// Run the download exchange, returning the byte count sent.
async fn send_file<R, W>(
    reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    ctx: &TransferContext<'_>,
    requested: &str,
) -> TransferResult<u64>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let storage_root = resolve_storage_root(ctx)?;

    // Escape attempts and missing files are indistinguishable to the peer
    let path = match files::resolve_existing(&storage_root, requested) {
        Ok(path) => path,
        Err(_) => {
            writer.write_line(FILE_NOT_FOUND).await?;
            return Ok(0);
        }
    };

    let metadata = match tokio::fs::metadata(&path).await {
        Ok(m) if m.is_file() => m,
        _ => {
            writer.write_line(FILE_NOT_FOUND).await?;
            return Ok(0);
        }
    };
    let size = metadata.len();

    writer.write_line(&size.to_string()).await?;

    let reply = expect_line(reader).await?;
    if reply != READY {
        return Err(TransferError::new(ERR_UNEXPECTED_REPLY).into());
    }

    let digest = compute_sha256(&path).await?;
    writer.write_line(&checksum_line(&digest)).await?;

    let reply = expect_line(reader).await?;
    if reply != CHECKSUM_OK {
        return Err(TransferError::new(ERR_UNEXPECTED_REPLY).into());
    }

    let mut file = tokio::fs::File::open(&path).await?;
    writer.write_payload(&mut file, size).await?;
    writer.write_line(SUCCESS).await?;

    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use tempfile::TempDir;
    use tokio::io::{AsyncWriteExt, duplex};

    use crate::users::UserStore;
    use ferry_common::hash::sha256_hex;

    fn test_peer() -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 50000)
    }

    async fn setup_user(name: &str) -> (TempDir, UserStore) {
        let temp_dir = TempDir::new().unwrap();
        let storage_root = temp_dir.path().canonicalize().unwrap();
        let users_file = temp_dir.path().join("users.json");
        let store = UserStore::load(&users_file, &storage_root, true).unwrap();
        store.create(name, "pw").await.unwrap();
        (temp_dir, store)
    }

    /// Drive handle_download with a scripted peer, returning the peer's
    /// read half for inspection and the handler result.
    async fn run_download(
        store: &UserStore,
        requested: &str,
        peer_script: &'static [u8],
    ) -> (LineReader<tokio::io::ReadHalf<tokio::io::DuplexStream>>, std::io::Result<()>) {
        let (peer, server) = duplex(256 * 1024);
        let (peer_read, mut peer_write) = tokio::io::split(peer);

        let feeder = tokio::spawn(async move {
            peer_write.write_all(peer_script).await.unwrap();
        });

        let (server_read, server_write) = tokio::io::split(server);
        let mut reader = LineReader::new(server_read);
        let mut writer = LineWriter::new(server_write);
        let ctx = TransferContext {
            users: store,
            username: "alice",
            peer_addr: test_peer(),
            debug: false,
        };

        let result = handle_download(&mut reader, &mut writer, &ctx, requested).await;
        feeder.await.unwrap();
        drop(writer);

        (LineReader::new(peer_read), result)
    }

    #[tokio::test]
    async fn test_download_sends_file() {
        let (_temp, store) = setup_user("alice").await;
        let content = b"downloadable content";
        let root = store.storage_root("alice").unwrap();
        std::fs::write(root.join("data.bin"), content).unwrap();

        let (mut peer, result) =
            run_download(&store, "data.bin", b"READY\nCHECKSUM_OK\n").await;
        result.unwrap();

        let size: u64 = peer.read_line().await.unwrap().unwrap().parse().unwrap();
        assert_eq!(size, content.len() as u64);

        let checksum = peer.read_line().await.unwrap().unwrap();
        assert_eq!(checksum, format!("CHECKSUM:{}", sha256_hex(content)));

        let mut received = Vec::new();
        {
            let mut dest = std::io::Cursor::new(&mut received);
            peer.read_payload(size, &mut dest).await.unwrap();
        }
        assert_eq!(received, content);

        assert_eq!(peer.read_line().await.unwrap(), Some("SUCCESS".to_string()));
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let (_temp, store) = setup_user("alice").await;

        let (mut peer, result) = run_download(&store, "nothing.txt", b"").await;
        result.unwrap();

        assert_eq!(
            peer.read_line().await.unwrap(),
            Some("FILE_NOT_FOUND".to_string())
        );
        assert_eq!(peer.read_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_download_escape_answers_not_found() {
        let (_temp, store) = setup_user("alice").await;

        let (mut peer, result) = run_download(&store, "../users.json", b"").await;
        result.unwrap();

        assert_eq!(
            peer.read_line().await.unwrap(),
            Some("FILE_NOT_FOUND".to_string())
        );
    }

    #[tokio::test]
    async fn test_download_directory_answers_not_found() {
        let (_temp, store) = setup_user("alice").await;
        let root = store.storage_root("alice").unwrap();
        std::fs::create_dir(root.join("subdir")).unwrap();

        let (mut peer, result) = run_download(&store, "subdir", b"").await;
        result.unwrap();

        assert_eq!(
            peer.read_line().await.unwrap(),
            Some("FILE_NOT_FOUND".to_string())
        );
    }

    #[tokio::test]
    async fn test_download_unexpected_reply_aborts_transfer_only() {
        let (_temp, store) = setup_user("alice").await;
        let root = store.storage_root("alice").unwrap();
        std::fs::write(root.join("data.bin"), b"x").unwrap();

        let (mut peer, result) = run_download(&store, "data.bin", b"WHATEVER\n").await;

        // Recoverable: the handler returns Ok so the session stays active
        result.unwrap();

        let size = peer.read_line().await.unwrap().unwrap();
        assert_eq!(size, "1");
        assert_eq!(
            peer.read_line().await.unwrap(),
            Some(format!("ERROR|{ERR_UNEXPECTED_REPLY}"))
        );
    }
}
