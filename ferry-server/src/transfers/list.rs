//! LIST handling
//!
//! Enumerates the regular files directly inside the authenticated user's
//! storage root. Subdirectories are skipped, never descended into. The
//! reply is one block of newline-joined `name|size` records, sorted by
//! name so repeated calls come back in the same order.

use tokio::io::{AsyncRead, AsyncWrite};

use ferry_common::framing::{LineReader, LineWriter};
use ferry_common::protocol::SEPARATOR;

use crate::constants::ERR_NO_FILES;

use super::{TransferContext, TransferError, TransferResult, report, resolve_storage_root};

/// Handle a LIST command for an authenticated session.
pub async fn handle_list<R, W>(
    _reader: &mut LineReader<R>,
    writer: &mut LineWriter<W>,
    ctx: &TransferContext<'_>,
) -> std::io::Result<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let result = send_listing(writer, ctx).await;

    if ctx.debug {
        match &result {
            Ok(count) => eprintln!("List for {} (user: {}): {count} files", ctx.peer_addr, ctx.username),
            Err(e) => eprintln!("List for {} (user: {}): failed: {e:?}", ctx.peer_addr, ctx.username),
        }
    }

    report(writer, result.map(|_| ())).await
}

/// Write the listing block, returning the record count.
async fn send_listing<W>(
    writer: &mut LineWriter<W>,
    ctx: &TransferContext<'_>,
) -> TransferResult<usize>
where
    W: AsyncWrite + Unpin,
{
    let storage_root = resolve_storage_root(ctx)?;

    let mut entries = collect_entries(&storage_root).await?;
    if entries.is_empty() {
        return Err(TransferError::new(ERR_NO_FILES).into());
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let records: Vec<String> = entries
        .into_iter()
        .map(|(name, size)| format!("{name}{SEPARATOR}{size}"))
        .collect();
    let count = records.len();

    // One write so the whole block lands as a single reply
    writer.write_line(&records.join("\n")).await?;

    Ok(count)
}

/// Gather `(name, size)` for every regular file directly in `dir`.
///
/// Entries whose names are not valid UTF-8 are skipped; they could never
/// have arrived through the line protocol in the first place.
async fn collect_entries(dir: &std::path::Path) -> std::io::Result<Vec<(String, u64)>> {
    let mut entries = Vec::new();
    let mut read_dir = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = read_dir.next_entry().await? {
        let metadata = entry.metadata().await?;
        if !metadata.is_file() {
            continue;
        }
        let Ok(name) = entry.file_name().into_string() else {
            continue;
        };
        entries.push((name, metadata.len()));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{IpAddr, Ipv4Addr, SocketAddr};

    use tempfile::TempDir;
    use tokio::io::duplex;

    use crate::users::UserStore;

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

    async fn run_list(store: &UserStore) -> String {
        let (peer, server) = duplex(64 * 1024);

        let (server_read, server_write) = tokio::io::split(server);
        let mut reader = LineReader::new(server_read);
        let mut writer = LineWriter::new(server_write);
        let ctx = TransferContext {
            users: store,
            username: "alice",
            peer_addr: test_peer(),
            debug: false,
        };

        handle_list(&mut reader, &mut writer, &ctx).await.unwrap();
        drop(writer);
        drop(reader);

        let (peer_read, _peer_write) = tokio::io::split(peer);
        let mut peer_reader = LineReader::new(peer_read);
        peer_reader.read_block().await.unwrap().unwrap()
    }

    #[tokio::test]
    async fn test_list_sorted_records() {
        let (_temp, store) = setup_user("alice").await;
        let root = store.storage_root("alice").unwrap();
        std::fs::write(root.join("beta.txt"), b"12345").unwrap();
        std::fs::write(root.join("alpha.txt"), b"abc").unwrap();

        let block = run_list(&store).await;
        assert_eq!(block, "alpha.txt|3\nbeta.txt|5");
    }

    #[tokio::test]
    async fn test_list_empty_root_is_error() {
        let (_temp, store) = setup_user("alice").await;

        let block = run_list(&store).await;
        assert_eq!(block, format!("ERROR|{ERR_NO_FILES}"));
    }

    #[tokio::test]
    async fn test_list_skips_directories() {
        let (_temp, store) = setup_user("alice").await;
        let root = store.storage_root("alice").unwrap();
        std::fs::write(root.join("file.txt"), b"x").unwrap();
        std::fs::create_dir(root.join("nested")).unwrap();
        std::fs::write(root.join("nested").join("inner.txt"), b"hidden").unwrap();

        let block = run_list(&store).await;
        assert_eq!(block, "file.txt|1");
    }

    #[tokio::test]
    async fn test_list_stable_across_calls() {
        let (_temp, store) = setup_user("alice").await;
        let root = store.storage_root("alice").unwrap();
        for name in ["c.bin", "a.bin", "b.bin"] {
            std::fs::write(root.join(name), b"x").unwrap();
        }

        let first = run_list(&store).await;
        let second = run_list(&store).await;
        assert_eq!(first, "a.bin|1\nb.bin|1\nc.bin|1");
        assert_eq!(first, second);
    }
}
