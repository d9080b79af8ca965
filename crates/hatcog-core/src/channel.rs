use std::collections::VecDeque;
use std::io;

use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

const READ_CHUNK: usize = 512;
const TERMINATOR: u8 = b'\n';

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
    #[error("channel closed")]
    Closed,
    #[error("connection to daemon lost")]
    ConnectionLost,
    #[error("failed to connect to daemon at {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("channel I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Splits a byte stream into `\n` terminated lines.
///
/// Holds the bytes seen since the last terminator plus any complete lines
/// not handed out yet.
#[derive(Debug, Default)]
pub struct LineFramer {
    partial: Vec<u8>,
    complete: VecDeque<String>,
}

impl LineFramer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) {
        let mut rest = bytes;
        while let Some(end) = rest.iter().position(|&b| b == TERMINATOR) {
            self.partial.extend_from_slice(&rest[..end]);
            let line = String::from_utf8_lossy(&self.partial).into_owned();
            self.complete.push_back(line);
            self.partial.clear();
            rest = &rest[end + 1..];
        }
        self.partial.extend_from_slice(rest);
    }

    pub fn next_line(&mut self) -> Option<String> {
        self.complete.pop_front()
    }

    pub fn has_line(&self) -> bool {
        !self.complete.is_empty()
    }
}

/// Newline framed connection to the chat daemon.
pub struct LineChannel {
    reader: Option<OwnedReadHalf>,
    writer: Option<OwnedWriteHalf>,
    framer: LineFramer,
}

impl LineChannel {
    pub async fn connect(addr: &str) -> Result<Self, ChannelError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| ChannelError::Connect {
                addr: addr.to_string(),
                source,
            })?;
        tracing::info!(addr, "connected to daemon");
        Ok(Self::from_stream(stream))
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Some(reader),
            writer: Some(writer),
            framer: LineFramer::new(),
        }
    }

    /// Send one line. Empty text is not sent.
    pub async fn send(&mut self, text: &str) -> Result<(), ChannelError> {
        if text.is_empty() {
            return Ok(());
        }
        let writer = self.writer.as_mut().ok_or(ChannelError::Closed)?;
        let mut frame = Vec::with_capacity(text.len() + 1);
        frame.extend_from_slice(text.as_bytes());
        frame.push(TERMINATOR);
        writer.write_all(&frame).await.map_err(lost_or_io)?;
        Ok(())
    }

    /// Wait until a line is buffered or the socket has bytes to read.
    /// Cancel safe, so it can sit in a `select!` branch.
    pub async fn readable(&self) -> Result<(), ChannelError> {
        if self.framer.has_line() {
            return Ok(());
        }
        let reader = self.reader.as_ref().ok_or(ChannelError::Closed)?;
        reader.readable().await?;
        Ok(())
    }

    /// Return the next complete line if one is available, without waiting.
    pub fn receive_one(&mut self) -> Result<Option<String>, ChannelError> {
        if let Some(line) = self.framer.next_line() {
            return Ok(Some(line));
        }
        let reader = self.reader.as_ref().ok_or(ChannelError::Closed)?;

        let mut buf = [0u8; READ_CHUNK];
        loop {
            match reader.try_read(&mut buf) {
                Ok(0) => return Err(ChannelError::ConnectionLost),
                Ok(n) => {
                    self.framer.push(&buf[..n]);
                    if self.framer.has_line() {
                        return Ok(self.framer.next_line());
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(None),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(lost_or_io(e)),
            }
        }
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// Shut the connection down. Later sends and receives fail with
    /// [`ChannelError::Closed`].
    pub async fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(error = %e, "shutdown of daemon connection failed");
            }
        }
        self.reader = None;
        self.framer = LineFramer::new();
    }
}

fn lost_or_io(e: io::Error) -> ChannelError {
    match e.kind() {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::UnexpectedEof => ChannelError::ConnectionLost,
        _ => ChannelError::Io(e),
    }
}
