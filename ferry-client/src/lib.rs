//! Ferry client library
//!
//! Drives the transfer protocol over one persistent connection: VERSION
//! handshake at connect, LOGIN/SIGNUP, then any number of UPLOAD /
//! DOWNLOAD / LIST exchanges. Works over any async byte stream; the TCP
//! constructor is a convenience. Downloads are verified against the
//! server's checksum before they are considered delivered.

use std::path::Path;

use tokio::io::{AsyncRead, AsyncWrite, ReadHalf, WriteHalf};
use tokio::net::{TcpStream, ToSocketAddrs};

use ferry_common::PROTOCOL_VERSION;
use ferry_common::framing::{LineReader, LineWriter};
use ferry_common::hash::compute_sha256;
use ferry_common::protocol::{
    CHECKSUM_OK, ERROR, FILE_NOT_FOUND, FILENAME_OK, NEW_FILENAME, READY, SEPARATOR,
    SERVER_SHUTDOWN, SUCCESS, VERSION_OK, checksum_line, parse_checksum, split_reply,
};

mod error;

pub use error::{ClientError, Result};

/// One file in a LIST reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    pub name: String,
    pub size: u64,
}

/// A connected, version-negotiated protocol client.
pub struct Client<S> {
    reader: LineReader<ReadHalf<S>>,
    writer: LineWriter<WriteHalf<S>>,
}

impl Client<TcpStream> {
    /// Connect over TCP and perform the version handshake.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Self::handshake(stream).await
    }
}

impl<S> Client<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Perform the version handshake over an already-established stream.
    pub async fn handshake(stream: S) -> Result<Self> {
        let (read_half, write_half) = tokio::io::split(stream);
        let mut client = Self {
            reader: LineReader::new(read_half),
            writer: LineWriter::new(write_half),
        };

        client
            .writer
            .write_line(&format!("VERSION {PROTOCOL_VERSION}"))
            .await?;
        let reply = client.read_reply().await?;
        if reply != VERSION_OK {
            return Err(ClientError::Protocol(format!(
                "version {PROTOCOL_VERSION} rejected: {reply}"
            )));
        }

        Ok(client)
    }

    /// Authenticate an existing account.
    pub async fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.writer
            .write_line(&format!("LOGIN{SEPARATOR}{username}{SEPARATOR}{password}"))
            .await?;
        self.expect_success(ClientError::Auth).await
    }

    /// Create an account. The server leaves the session unauthenticated;
    /// follow up with [`login`](Self::login).
    pub async fn signup(&mut self, username: &str, password: &str) -> Result<()> {
        self.writer
            .write_line(&format!("SIGNUP{SEPARATOR}{username}{SEPARATOR}{password}"))
            .await?;
        self.expect_success(ClientError::Auth).await
    }

    /// Upload a local file, returning the name the server stored it under
    /// (renamed when the requested name was taken).
    pub async fn upload(&mut self, path: &Path) -> Result<String> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| ClientError::Transfer("path has no usable filename".to_string()))?;
        let size = tokio::fs::metadata(path).await?.len();
        let digest = compute_sha256(path).await?;

        self.writer.write_line(&format!("UPLOAD {name}")).await?;
        let reply = self.read_reply().await?;
        let stored_name = match split_reply(&reply) {
            (FILENAME_OK, _) => name.to_string(),
            (NEW_FILENAME, Some(new_name)) => new_name.to_string(),
            (ERROR, detail) => {
                return Err(ClientError::Transfer(detail.unwrap_or_default().to_string()));
            }
            _ => return Err(ClientError::Protocol(format!("unexpected reply: {reply}"))),
        };

        self.writer.write_line(&size.to_string()).await?;
        self.expect_token(READY).await?;

        self.writer.write_line(&checksum_line(&digest)).await?;
        self.expect_token(CHECKSUM_OK).await?;

        let mut file = tokio::fs::File::open(path).await?;
        self.writer.write_payload(&mut file, size).await?;

        self.expect_token(SUCCESS).await?;
        Ok(stored_name)
    }

    /// Download a stored file into `dest`, verifying it against the
    /// server's checksum. On mismatch the file is deleted and the call
    /// fails with [`ClientError::ChecksumMismatch`].
    pub async fn download(&mut self, name: &str, dest: &Path) -> Result<()> {
        self.writer.write_line(&format!("DOWNLOAD {name}")).await?;

        let reply = self.read_reply().await?;
        let size: u64 = match split_reply(&reply) {
            (FILE_NOT_FOUND, _) => {
                return Err(ClientError::Transfer(format!("no such file: {name}")));
            }
            (ERROR, detail) => {
                return Err(ClientError::Transfer(detail.unwrap_or_default().to_string()));
            }
            _ => reply
                .parse()
                .map_err(|_| ClientError::Protocol(format!("unexpected reply: {reply}")))?,
        };

        self.writer.write_line(READY).await?;

        let reply = self.read_reply().await?;
        let expected_digest = parse_checksum(&reply)
            .ok_or_else(|| ClientError::Protocol(format!("unexpected reply: {reply}")))?
            .to_ascii_lowercase();

        self.writer.write_line(CHECKSUM_OK).await?;

        let mut file = tokio::fs::File::create(dest).await?;
        if let Err(e) = self.reader.read_payload(size, &mut file).await {
            drop(file);
            let _ = tokio::fs::remove_file(dest).await;
            return Err(e.into());
        }
        file.sync_all().await?;
        drop(file);

        self.expect_token(SUCCESS).await?;

        // Verify against what actually reached the disk
        let actual_digest = compute_sha256(dest).await?;
        if actual_digest != expected_digest {
            let _ = tokio::fs::remove_file(dest).await;
            return Err(ClientError::ChecksumMismatch);
        }

        Ok(())
    }

    /// List the files in the account's storage area, sorted by name.
    ///
    /// An empty storage area comes back as an empty vec, not an error.
    pub async fn list(&mut self) -> Result<Vec<FileEntry>> {
        self.writer.write_line("LIST").await?;

        let block = match self.reader.read_block().await? {
            Some(block) => block,
            None => return Err(closed_early()),
        };
        if block == SERVER_SHUTDOWN {
            return Err(ClientError::ServerShutdown);
        }
        if let (ERROR, _) = split_reply(&block) {
            return Ok(Vec::new());
        }

        let mut entries = Vec::new();
        for record in block.lines() {
            let entry = record
                .rsplit_once(SEPARATOR)
                .and_then(|(name, size)| {
                    let size = size.parse().ok()?;
                    Some(FileEntry {
                        name: name.to_string(),
                        size,
                    })
                })
                .ok_or_else(|| {
                    ClientError::Protocol(format!("unparseable listing record: {record}"))
                })?;
            entries.push(entry);
        }
        Ok(entries)
    }

    /// End the session in-protocol and release the connection.
    pub async fn close(mut self) -> Result<()> {
        // An empty line tells the server this session is done
        self.writer.write_line("").await?;
        Ok(())
    }

    /// Read one reply line, surfacing shutdown and abrupt closes.
    async fn read_reply(&mut self) -> Result<String> {
        match self.reader.read_line().await? {
            Some(line) if line == SERVER_SHUTDOWN => Err(ClientError::ServerShutdown),
            Some(line) => Ok(line),
            None => Err(closed_early()),
        }
    }

    /// Read a reply that must be exactly `token`; an `ERROR|` becomes a
    /// transfer failure, anything else a protocol error.
    async fn expect_token(&mut self, token: &str) -> Result<()> {
        let reply = self.read_reply().await?;
        if reply == token {
            return Ok(());
        }
        match split_reply(&reply) {
            (ERROR, detail) => Err(ClientError::Transfer(detail.unwrap_or_default().to_string())),
            _ => Err(ClientError::Protocol(format!("unexpected reply: {reply}"))),
        }
    }

    /// Read a `SUCCESS|`-or-`ERROR|` reply, wrapping the failure detail
    /// with `wrap`.
    async fn expect_success(&mut self, wrap: fn(String) -> ClientError) -> Result<()> {
        let reply = self.read_reply().await?;
        match split_reply(&reply) {
            (SUCCESS, _) => Ok(()),
            (ERROR, detail) => Err(wrap(detail.unwrap_or_default().to_string())),
            _ => Err(ClientError::Protocol(format!("unexpected reply: {reply}"))),
        }
    }
}

fn closed_early() -> ClientError {
    ClientError::Io(std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "server closed the connection",
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;
    use tokio::io::DuplexStream;
    use tokio::task::JoinHandle;

    use ferry_common::hash::sha256_hex;

    type ServerReader = LineReader<ReadHalf<DuplexStream>>;
    type ServerWriter = LineWriter<WriteHalf<DuplexStream>>;

    /// Spawn a scripted peer that answers the handshake and then runs
    /// `script`, and hand back the connected client.
    async fn connect_scripted<F, Fut>(script: F) -> (Client<DuplexStream>, JoinHandle<()>)
    where
        F: FnOnce(ServerReader, ServerWriter) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send,
    {
        let (client_stream, server_stream) = tokio::io::duplex(256 * 1024);

        let handle = tokio::spawn(async move {
            let (read_half, write_half) = tokio::io::split(server_stream);
            let mut reader = LineReader::new(read_half);
            let mut writer = LineWriter::new(write_half);

            assert_eq!(
                reader.read_line().await.unwrap().unwrap(),
                "VERSION 1.0"
            );
            writer.write_line("VERSION_OK").await.unwrap();

            script(reader, writer).await;
        });

        let client = Client::handshake(client_stream).await.unwrap();
        (client, handle)
    }

    // =========================================================================
    // Handshake
    // =========================================================================

    #[tokio::test]
    async fn test_handshake_rejected() {
        let (client_stream, server_stream) = tokio::io::duplex(4096);

        let handle = tokio::spawn(async move {
            let (read_half, write_half) = tokio::io::split(server_stream);
            let mut reader = LineReader::new(read_half);
            let mut writer = LineWriter::new(write_half);
            reader.read_line().await.unwrap();
            writer.write_line("VERSION_ERROR").await.unwrap();
        });

        match Client::handshake(client_stream).await {
            Err(ClientError::Protocol(_)) => {}
            other => panic!("expected protocol error, got {:?}", other.map(|_| ())),
        }
        handle.await.unwrap();
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    #[tokio::test]
    async fn test_login_success_and_failure() {
        let (mut client, handle) = connect_scripted(|mut reader, mut writer| async move {
            assert_eq!(
                reader.read_line().await.unwrap().unwrap(),
                "LOGIN|alice|right"
            );
            writer.write_line("SUCCESS|Login successful").await.unwrap();

            assert_eq!(
                reader.read_line().await.unwrap().unwrap(),
                "LOGIN|alice|wrong"
            );
            writer
                .write_line("ERROR|Invalid username or password, 2 attempts remaining")
                .await
                .unwrap();
        })
        .await;

        client.login("alice", "right").await.unwrap();
        match client.login("alice", "wrong").await {
            Err(ClientError::Auth(msg)) => assert!(msg.contains("2 attempts remaining")),
            other => panic!("expected auth error, got {:?}", other),
        }
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_signup_duplicate() {
        let (mut client, handle) = connect_scripted(|mut reader, mut writer| async move {
            assert_eq!(reader.read_line().await.unwrap().unwrap(), "SIGNUP|bob|pw");
            writer.write_line("ERROR|Username already taken").await.unwrap();
        })
        .await;

        match client.signup("bob", "pw").await {
            Err(ClientError::Auth(msg)) => assert_eq!(msg, "Username already taken"),
            other => panic!("expected auth error, got {:?}", other),
        }
        handle.await.unwrap();
    }

    // =========================================================================
    // Upload
    // =========================================================================

    #[tokio::test]
    async fn test_upload_renamed() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("report.txt");
        let content = b"upload me";
        std::fs::write(&path, content).unwrap();
        let digest = sha256_hex(content);

        let expected_digest = digest.clone();
        let (mut client, handle) = connect_scripted(move |mut reader, mut writer| async move {
            assert_eq!(
                reader.read_line().await.unwrap().unwrap(),
                "UPLOAD report.txt"
            );
            writer.write_line("NEW_FILENAME|report (1).txt").await.unwrap();

            assert_eq!(reader.read_line().await.unwrap().unwrap(), "9");
            writer.write_line("READY").await.unwrap();

            assert_eq!(
                reader.read_line().await.unwrap().unwrap(),
                format!("CHECKSUM:{expected_digest}")
            );
            writer.write_line("CHECKSUM_OK").await.unwrap();

            let mut received = Vec::new();
            {
                let mut dest = std::io::Cursor::new(&mut received);
                reader.read_payload(9, &mut dest).await.unwrap();
            }
            assert_eq!(received, b"upload me");
            writer.write_line("SUCCESS").await.unwrap();
        })
        .await;

        let stored = client.upload(&path).await.unwrap();
        assert_eq!(stored, "report (1).txt");
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_upload_server_abort() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("data.bin");
        std::fs::write(&path, b"x").unwrap();

        let (mut client, handle) = connect_scripted(|mut reader, mut writer| async move {
            reader.read_line().await.unwrap();
            writer.write_line("FILENAME_OK").await.unwrap();
            reader.read_line().await.unwrap();
            writer.write_line("ERROR|Invalid file size").await.unwrap();
        })
        .await;

        match client.upload(&path).await {
            Err(ClientError::Transfer(msg)) => assert_eq!(msg, "Invalid file size"),
            other => panic!("expected transfer error, got {:?}", other),
        }
        handle.await.unwrap();
    }

    // =========================================================================
    // Download
    // =========================================================================

    #[tokio::test]
    async fn test_download_verified() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("fetched.bin");
        let content = b"verified content";
        let digest = sha256_hex(content);

        let (mut client, handle) = connect_scripted(move |mut reader, mut writer| async move {
            assert_eq!(
                reader.read_line().await.unwrap().unwrap(),
                "DOWNLOAD fetched.bin"
            );
            writer.write_line(&content.len().to_string()).await.unwrap();

            assert_eq!(reader.read_line().await.unwrap().unwrap(), "READY");
            writer.write_line(&format!("CHECKSUM:{digest}")).await.unwrap();

            assert_eq!(reader.read_line().await.unwrap().unwrap(), "CHECKSUM_OK");
            let mut src = std::io::Cursor::new(content.as_slice());
            writer.write_payload(&mut src, content.len() as u64).await.unwrap();
            writer.write_line("SUCCESS").await.unwrap();
        })
        .await;

        client.download("fetched.bin", &dest).await.unwrap();
        assert_eq!(std::fs::read(&dest).unwrap(), content);
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_download_checksum_mismatch_deletes_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("fetched.bin");
        let content = b"corrupted in flight";
        // The server claims different content
        let wrong_digest = sha256_hex(b"what was intended");

        let (mut client, handle) = connect_scripted(move |mut reader, mut writer| async move {
            reader.read_line().await.unwrap();
            writer.write_line(&content.len().to_string()).await.unwrap();
            reader.read_line().await.unwrap();
            writer
                .write_line(&format!("CHECKSUM:{wrong_digest}"))
                .await
                .unwrap();
            reader.read_line().await.unwrap();
            let mut src = std::io::Cursor::new(content.as_slice());
            writer.write_payload(&mut src, content.len() as u64).await.unwrap();
            writer.write_line("SUCCESS").await.unwrap();
        })
        .await;

        match client.download("fetched.bin", &dest).await {
            Err(ClientError::ChecksumMismatch) => {}
            other => panic!("expected checksum mismatch, got {:?}", other),
        }
        assert!(!dest.exists());
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_download_missing_file() {
        let temp_dir = TempDir::new().unwrap();
        let dest = temp_dir.path().join("missing.bin");

        let (mut client, handle) = connect_scripted(|mut reader, mut writer| async move {
            reader.read_line().await.unwrap();
            writer.write_line("FILE_NOT_FOUND").await.unwrap();
        })
        .await;

        match client.download("missing.bin", &dest).await {
            Err(ClientError::Transfer(msg)) => assert!(msg.contains("missing.bin")),
            other => panic!("expected transfer error, got {:?}", other),
        }
        assert!(!dest.exists());
        handle.await.unwrap();
    }

    // =========================================================================
    // List
    // =========================================================================

    #[tokio::test]
    async fn test_list_parses_records() {
        let (mut client, handle) = connect_scripted(|mut reader, mut writer| async move {
            assert_eq!(reader.read_line().await.unwrap().unwrap(), "LIST");
            writer
                .write_line("a.txt|10\nreport (1).txt|20")
                .await
                .unwrap();
        })
        .await;

        let entries = client.list().await.unwrap();
        assert_eq!(
            entries,
            vec![
                FileEntry {
                    name: "a.txt".to_string(),
                    size: 10
                },
                FileEntry {
                    name: "report (1).txt".to_string(),
                    size: 20
                },
            ]
        );
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_list_error_reply_is_empty() {
        let (mut client, handle) = connect_scripted(|mut reader, mut writer| async move {
            reader.read_line().await.unwrap();
            writer.write_line("ERROR|No files found").await.unwrap();
        })
        .await;

        assert!(client.list().await.unwrap().is_empty());
        handle.await.unwrap();
    }

    // =========================================================================
    // Shutdown
    // =========================================================================

    #[tokio::test]
    async fn test_server_shutdown_is_distinct_error() {
        let (mut client, handle) = connect_scripted(|mut reader, mut writer| async move {
            reader.read_line().await.unwrap();
            writer.write_line("SERVER_SHUTDOWN").await.unwrap();
        })
        .await;

        match client.login("alice", "pw").await {
            Err(ClientError::ServerShutdown) => {}
            other => panic!("expected shutdown error, got {:?}", other),
        }
        handle.await.unwrap();
    }
}
