//! Buffered writes of control lines and raw payloads

use std::io;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Writes newline-terminated control lines and raw payload bytes to an
/// async stream.
pub struct LineWriter<W> {
    writer: W,
}

impl<W> LineWriter<W> {
    /// Create a new line writer wrapping the given stream.
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    /// Get a reference to the underlying stream.
    pub fn get_ref(&self) -> &W {
        &self.writer
    }

    /// Get a mutable reference to the underlying stream.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.writer
    }

    /// Consume the writer, returning the underlying stream.
    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: AsyncWrite + Unpin> LineWriter<W> {
    /// Write one control line.
    ///
    /// The terminator is appended and the line goes out as a single write
    /// followed by a flush, so it is on the wire when the call returns.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        let mut frame = Vec::with_capacity(line.len() + 1);
        frame.extend_from_slice(line.as_bytes());
        frame.push(b'\n');
        self.writer.write_all(&frame).await?;
        self.writer.flush().await
    }

    /// Stream exactly `len` raw payload bytes from `src`.
    ///
    /// # Errors
    ///
    /// Returns `UnexpectedEof` if `src` runs out before `len` bytes.
    pub async fn write_payload<R>(&mut self, src: &mut R, len: u64) -> io::Result<()>
    where
        R: AsyncRead + Unpin,
    {
        let copied = tokio::io::copy(&mut src.take(len), &mut self.writer).await?;
        if copied != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("payload source ended after {copied} of {len} bytes"),
            ));
        }
        self.writer.flush().await
    }
}
