//! Buffered reads of control lines and raw payloads

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::{MAX_LINE_LENGTH, READ_BUFFER_SIZE, STREAM_BUFFER_SIZE};

/// Reads newline-terminated control lines and raw payload bytes from an
/// async stream.
///
/// The stream delivers bytes in arbitrarily sized chunks, so one read may
/// carry a fragment of a line or a whole line plus the head of the payload
/// that follows it. Surplus bytes stay in an internal buffer: line reads
/// split it at the first terminator, and payload reads drain it before
/// touching the stream again.
pub struct LineReader<R> {
    reader: R,
    buffer: Vec<u8>,
}

impl<R> LineReader<R> {
    /// Create a new line reader wrapping the given stream.
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::new(),
        }
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &R {
        &self.reader
    }

    /// Get a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.reader
    }

    /// Consume the reader, returning the underlying stream.
    ///
    /// Any buffered bytes are discarded.
    pub fn into_inner(self) -> R {
        self.reader
    }
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Read the next control line.
    ///
    /// Accumulates until a `\n` terminator and returns the line with
    /// surrounding whitespace trimmed. Returns `Ok(None)` on clean EOF
    /// with nothing pending; EOF in the middle of a line yields what
    /// accumulated so far.
    ///
    /// # Errors
    ///
    /// Returns `InvalidData` if the line exceeds [`MAX_LINE_LENGTH`]
    /// (terminator included) or is not valid UTF-8.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
                let raw: Vec<u8> = self.buffer.drain(..=pos).collect();
                return decode(&raw).map(Some);
            }

            if self.buffer.len() >= MAX_LINE_LENGTH {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    "control line exceeds maximum length",
                ));
            }

            if self.fill().await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let raw = std::mem::take(&mut self.buffer);
                return decode(&raw).map(Some);
            }
        }
    }

    /// Read one complete reply, which may span multiple lines.
    ///
    /// Accumulates until the received data ends with `\n`, so a reply the
    /// peer wrote as a single block of newline-joined records comes back
    /// whole. Interior newlines are preserved; surrounding whitespace is
    /// trimmed. Returns `Ok(None)` on clean EOF with nothing pending.
    pub async fn read_block(&mut self) -> io::Result<Option<String>> {
        loop {
            if self.buffer.last() == Some(&b'\n') {
                let raw = std::mem::take(&mut self.buffer);
                return decode(&raw).map(Some);
            }

            if self.fill().await? == 0 {
                if self.buffer.is_empty() {
                    return Ok(None);
                }
                let raw = std::mem::take(&mut self.buffer);
                return decode(&raw).map(Some);
            }
        }
    }

    /// Copy exactly `len` payload bytes into `dest`, draining any bytes
    /// already buffered by line reads before touching the stream.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` if the stream ends early; `dest` has
    /// received every byte that arrived before the cut.
    pub async fn read_payload<W>(&mut self, len: u64, dest: &mut W) -> io::Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        let mut remaining = len;

        if !self.buffer.is_empty() && remaining > 0 {
            let take = remaining.min(self.buffer.len() as u64) as usize;
            let head: Vec<u8> = self.buffer.drain(..take).collect();
            dest.write_all(&head).await?;
            remaining -= take as u64;
        }

        let mut chunk = vec![0u8; STREAM_BUFFER_SIZE];
        while remaining > 0 {
            let want = remaining.min(STREAM_BUFFER_SIZE as u64) as usize;
            let n = self.reader.read(&mut chunk[..want]).await?;
            if n == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended before the declared payload size",
                ));
            }
            dest.write_all(&chunk[..n]).await?;
            remaining -= n as u64;
        }

        dest.flush().await
    }

    /// Pull one chunk from the stream into the buffer, returning the byte
    /// count (zero on EOF).
    async fn fill(&mut self) -> io::Result<usize> {
        let mut chunk = [0u8; READ_BUFFER_SIZE];
        let n = self.reader.read(&mut chunk).await?;
        self.buffer.extend_from_slice(&chunk[..n]);
        Ok(n)
    }
}

/// Decode accumulated bytes, trimming the terminator and surrounding
/// whitespace.
fn decode(raw: &[u8]) -> io::Result<String> {
    match std::str::from_utf8(raw) {
        Ok(s) => Ok(s.trim().to_string()),
        Err(_) => Err(io::Error::new(
            io::ErrorKind::InvalidData,
            "control line is not valid UTF-8",
        )),
    }
}
