//! Line framing over a raw duplex byte stream.
//!
//! Clients mix line-ending conventions and the protocol has no framing
//! markers, so `\n`, `\r` and `\r\n` each end exactly one line. After a `\r`
//! the framer looks at bytes already buffered: a `\n` there is consumed on
//! the spot. If nothing is buffered yet, the next read drops a leading `\n`
//! instead of blocking for it.
//!
//! Every non-terminator byte is echoed back as it arrives, and each
//! terminator is echoed as a single `\n`.

use std::io;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};

/// Default cap on bytes kept per line.
pub const DEFAULT_MAX_LINE_LEN: usize = 1024;

/// Reads terminated lines and writes replies on one connection.
#[derive(Debug)]
pub struct LineFramer<R, W> {
    reader: BufReader<R>,
    writer: W,
    max_line_len: usize,
    /// A `\r` ended the last line and its `\n` may still be in flight
    swallow_lf: bool,
}

impl<R: AsyncRead + Unpin, W: AsyncWrite + Unpin> LineFramer<R, W> {
    /// Wrap a read half and a write half.
    pub fn new(reader: R, writer: W) -> Self {
        Self {
            reader: BufReader::new(reader),
            writer,
            max_line_len: DEFAULT_MAX_LINE_LEN,
            swallow_lf: false,
        }
    }

    /// Keep at most `max` bytes per line. Excess bytes are echoed but
    /// dropped from the line.
    #[must_use]
    pub fn max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max.max(1);
        self
    }

    /// Read the next line without its terminator.
    ///
    /// Returns `None` once the stream is closed or faults. Bytes buffered
    /// without a terminator at close are discarded. Invalid UTF-8 is
    /// replaced, never rejected.
    pub async fn read_line(&mut self) -> Option<String> {
        let mut line = Vec::new();
        let mut truncated = false;

        loop {
            let byte = match self.next_byte().await {
                Ok(Some(byte)) => byte,
                Ok(None) => {
                    tracing::trace!(pending = line.len(), "stream closed");
                    return None;
                },
                Err(err) => {
                    tracing::debug!(error = %err, "read failed");
                    return None;
                },
            };

            if std::mem::take(&mut self.swallow_lf) && byte == b'\n' {
                continue;
            }

            match byte {
                b'\n' | b'\r' => {
                    if byte == b'\r' {
                        let next = self.reader.buffer().first().copied();
                        match next {
                            Some(b'\n') => self.reader.consume(1),
                            Some(_) => {},
                            None => self.swallow_lf = true,
                        }
                    }
                    if let Err(err) = self.echo(b'\n').await {
                        tracing::debug!(error = %err, "echo failed");
                        return None;
                    }
                    return Some(finish(line, truncated));
                },
                _ => {
                    tracing::trace!(byte, "byte received");
                    if let Err(err) = self.echo(byte).await {
                        tracing::debug!(error = %err, "echo failed");
                        return None;
                    }
                    if line.len() < self.max_line_len {
                        line.push(byte);
                    } else {
                        truncated = true;
                    }
                },
            }
        }
    }

    /// Write `text` and flush.
    pub async fn send(&mut self, text: &str) -> io::Result<()> {
        self.writer.write_all(text.as_bytes()).await?;
        self.writer.flush().await
    }

    async fn next_byte(&mut self) -> io::Result<Option<u8>> {
        let buf = self.reader.fill_buf().await?;
        let Some(&byte) = buf.first() else {
            return Ok(None);
        };
        self.reader.consume(1);
        Ok(Some(byte))
    }

    async fn echo(&mut self, byte: u8) -> io::Result<()> {
        self.writer.write_all(&[byte]).await?;
        self.writer.flush().await
    }
}

fn finish(line: Vec<u8>, truncated: bool) -> String {
    if truncated {
        tracing::debug!(kept = line.len(), "line truncated");
    }
    let line = match String::from_utf8(line) {
        Ok(line) => line,
        Err(err) => String::from_utf8_lossy(err.as_bytes()).into_owned(),
    };
    tracing::trace!(%line, "line framed");
    line
}
