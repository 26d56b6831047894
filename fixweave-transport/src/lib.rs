/******************************************************************************
   Author: Jonas Keller
   Email: jonas@fixweave.dev
   Date: 2/8/26
******************************************************************************/

//! # fixweave-transport
//!
//! Byte transport for the fixweave FIX engine.
//!
//! This crate provides:
//! - **Transport trait**: unframed `read` / `write` / `close` over any byte
//!   stream
//! - **TcpTransport**: the tokio TCP implementation
//! - **FrameCodec**: the FIX frame splitter with post-error resync
//!
//! The transport makes no framing guarantees; the codec owns framing.

pub mod codec;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::info;

pub use codec::{FrameCodec, FrameError};

/// Read chunk size.
const READ_BUF: usize = 8 * 1024;

/// An unframed bidirectional byte stream.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Reads a chunk of bytes. `None` signals end of stream.
    async fn read(&self) -> io::Result<Option<Bytes>>;

    /// Writes all of `bytes`.
    async fn write(&self, bytes: &[u8]) -> io::Result<()>;

    /// Closes the stream for writing.
    async fn close(&self) -> io::Result<()>;
}

/// TCP transport over tokio.
#[derive(Debug)]
pub struct TcpTransport {
    reader: Mutex<OwnedReadHalf>,
    writer: Mutex<OwnedWriteHalf>,
}

impl TcpTransport {
    /// Connects to `host:port`.
    ///
    /// # Errors
    /// Returns `io::Error` if the connection cannot be established.
    pub async fn connect(host: &str, port: u16) -> io::Result<Self> {
        let stream = TcpStream::connect((host, port)).await?;
        stream.set_nodelay(true)?;
        info!(host, port, "transport connected");
        Ok(Self::from_stream(stream))
    }

    /// Wraps an already-connected stream (used by tests and acceptors).
    #[must_use]
    pub fn from_stream(stream: TcpStream) -> Self {
        let (reader, writer) = stream.into_split();
        Self {
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
        }
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn read(&self) -> io::Result<Option<Bytes>> {
        let mut buf = BytesMut::with_capacity(READ_BUF);
        let n = self.reader.lock().await.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }

    async fn write(&self, bytes: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    async fn close(&self) -> io::Result<()> {
        self.writer.lock().await.shutdown().await
    }
}
