//! WebSocket endpoint built directly on a byte stream.
//!
//! A [`Connection`] owns both halves of an upgraded socket. Reads happen from
//! exactly one task (the one calling [`Connection::recv_text`]); writes may
//! come from any task and are serialized by the writer lock.
//!
//! Control frames never escape this module: pings are answered, pongs are
//! dropped, and a close frame is echoed before `recv_text` reports the end of
//! the stream.

pub mod frame;
pub mod handshake;

use std::sync::atomic::{AtomicBool, Ordering};

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use frame::{decode, encode, Opcode};

/// Boxed read half of an upgraded socket.
pub type BoxReader = Box<dyn AsyncRead + Send + Unpin>;
/// Boxed write half of an upgraded socket.
pub type BoxWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One upgraded WebSocket endpoint.
pub struct Connection {
    id: Uuid,
    reader: Mutex<BoxReader>,
    writer: Mutex<BoxWriter>,
    /// Monotonic: set once, never cleared.
    closed: AtomicBool,
    /// Fired by [`Connection::close`] to wake a reader blocked on the socket.
    shutdown: CancellationToken,
    max_frame_size: usize,
}

impl Connection {
    /// Wrap the halves of a socket whose handshake has already completed.
    pub fn new(reader: BoxReader, writer: BoxWriter, max_frame_size: usize) -> Self {
        Self {
            id: Uuid::new_v4(),
            reader: Mutex::new(reader),
            writer: Mutex::new(writer),
            closed: AtomicBool::new(false),
            shutdown: CancellationToken::new(),
            max_frame_size,
        }
    }

    /// Write the `101` response for `accept` and return the opened connection.
    pub async fn accept(
        reader: BoxReader,
        mut writer: BoxWriter,
        accept: &str,
        max_frame_size: usize,
    ) -> std::io::Result<Self> {
        handshake::write_switching_protocols(&mut writer, accept).await?;
        Ok(Self::new(reader, writer, max_frame_size))
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Send a text frame. A no-op once the connection is closed.
    pub async fn send_text(&self, text: &str) -> std::io::Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        self.write_frame(Opcode::Text, text.as_bytes()).await
    }

    /// Wait for the next data payload.
    ///
    /// Returns `None` once the peer closes, the stream fails, or
    /// [`Connection::close`] is called from another task. Continuation frames
    /// are returned as-is; fragmented messages are not reassembled.
    pub async fn recv_text(&self) -> Option<String> {
        if self.is_closed() {
            return None;
        }
        let mut reader = self.reader.lock().await;
        loop {
            let result = tokio::select! {
                () = self.shutdown.cancelled() => return None,
                result = decode(&mut *reader, self.max_frame_size) => result,
            };
            let frame = match result {
                Ok(frame) => frame,
                Err(e) => {
                    debug!(conn = %self.id, "read ended: {e}");
                    self.closed.store(true, Ordering::Release);
                    self.shutdown.cancel();
                    return None;
                }
            };
            match frame.opcode {
                Opcode::Close => {
                    if !self.closed.swap(true, Ordering::AcqRel) {
                        // Echo the peer's status code, if it sent one.
                        let code = frame.payload.get(..2).unwrap_or_default();
                        self.write_frame(Opcode::Close, code).await.ok();
                        self.shutdown_writer().await;
                    }
                    self.shutdown.cancel();
                    return None;
                }
                Opcode::Ping => {
                    if let Err(e) = self.write_frame(Opcode::Pong, &frame.payload).await {
                        debug!(conn = %self.id, "pong failed: {e}");
                    }
                }
                Opcode::Pong => {}
                Opcode::Text | Opcode::Binary | Opcode::Continuation => {
                    return Some(String::from_utf8_lossy(&frame.payload).into_owned());
                }
            }
        }
    }

    /// Close the connection. Idempotent; write failures are ignored because
    /// the peer may already be gone.
    ///
    /// The reader is woken before the close frame is written, so dropping
    /// this future part-way still leaves the connection fully closed.
    pub async fn close(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        self.write_frame(Opcode::Close, &[]).await.ok();
        self.shutdown_writer().await;
    }

    /// Close without sending a close frame.
    ///
    /// For a peer whose stream may end in a partially written frame, such as
    /// after a timed-out send, where a close frame would only add garbage.
    pub async fn terminate(&self) {
        if self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        self.shutdown.cancel();
        self.shutdown_writer().await;
    }

    async fn write_frame(&self, opcode: Opcode, payload: &[u8]) -> std::io::Result<()> {
        let bytes = encode(opcode, payload);
        let mut writer = self.writer.lock().await;
        writer.write_all(&bytes).await?;
        writer.flush().await
    }

    async fn shutdown_writer(&self) {
        self.writer.lock().await.shutdown().await.ok();
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
