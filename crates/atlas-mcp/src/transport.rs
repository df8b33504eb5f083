//! Transport layer for MCP JSON-RPC communication.
//!
//! MCP uses newline-delimited JSON over stdin/stdout. The transport only
//! frames lines; classification happens in the server.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// Line-framed reader/writer pair.
pub struct LineTransport {
    reader: Box<dyn AsyncBufRead + Send + Unpin>,
    writer: Box<dyn AsyncWrite + Send + Unpin>,
    buf: Vec<u8>,
}

impl LineTransport {
    /// Create a transport using stdin/stdout.
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }

    /// Create a transport over any reader/writer pair.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: AsyncBufRead + Send + Unpin + 'static,
        W: AsyncWrite + Send + Unpin + 'static,
    {
        Self {
            reader: Box::new(reader),
            writer: Box::new(writer),
            buf: Vec::new(),
        }
    }

    /// Read the next non-empty line. `None` at EOF.
    ///
    /// Bytes that are not valid UTF-8 are replaced, so the line still reaches
    /// the parser and gets a parse error instead of ending the session.
    pub async fn read_line(&mut self) -> io::Result<Option<String>> {
        loop {
            self.buf.clear();
            if self.reader.read_until(b'\n', &mut self.buf).await? == 0 {
                return Ok(None);
            }
            let line = String::from_utf8_lossy(&self.buf);
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            tracing::debug!(bytes = line.len(), "Received line");
            return Ok(Some(line.to_string()));
        }
    }

    /// Write one line followed by a newline, then flush.
    pub async fn write_line(&mut self, line: &str) -> io::Result<()> {
        tracing::debug!(bytes = line.len(), "Sending line");
        self.writer.write_all(line.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}
