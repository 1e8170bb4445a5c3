//! Per-client connection loop.
//!
//! ```text
//!   read into BytesMut ──> parse every complete frame ──> execute in order
//!          ▲                                                   │
//!          │                                                   ▼
//!          └──────────── flush batched replies <── encode reply into out buffer
//! ```
//!
//! Replies for all frames found in one read are encoded into a single
//! buffer and written together, so pipelined clients get one write per
//! read. A frame that can never parse gets an error reply; the rest of the
//! buffer is discarded and the connection keeps serving.

use crate::commands::{is_quit, CommandHandler};
use crate::protocol::{ParseError, RespParser, RespValue};
use bytes::{Buf, BytesMut};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, trace, warn};

/// Largest amount of unparsed input held for one client.
pub const MAX_BUFFER_SIZE: usize = 64 * 1024 * 1024;

const INITIAL_BUFFER_SIZE: usize = 4096;

/// Server-wide connection counters.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    pub connections_accepted: AtomicU64,
    pub active_connections: AtomicU64,
    pub commands_processed: AtomicU64,
    pub protocol_errors: AtomicU64,
    pub bytes_read: AtomicU64,
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    fn opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    fn closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    fn add(counter: &AtomicU64, n: usize) {
        counter.fetch_add(n as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("connection closed in the middle of a request")]
    UnexpectedEof,

    #[error("request buffer exceeded {0} bytes")]
    BufferFull(usize),
}

/// What the loop does after handling the frames currently buffered.
enum Next {
    Read,
    Close,
}

/// Drives one client. Generic over the stream so tests can use in-memory
/// pipes.
pub struct ConnectionHandler<S> {
    stream: S,
    peer: String,
    buffer: BytesMut,
    out: BytesMut,
    parser: RespParser,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        peer: impl fmt::Display,
        commands: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.opened();
        Self {
            stream,
            peer: peer.to_string(),
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            out: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            parser: RespParser::new(),
            commands,
            stats,
        }
    }

    /// Serves the client until it disconnects, sends `QUIT`, or fails.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!(client = %self.peer, "client connected");

        let result = self.serve().await;
        match &result {
            Ok(()) => debug!(client = %self.peer, "client disconnected"),
            Err(ConnectionError::Io(err))
                if err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.peer, "connection reset by client")
            }
            Err(err) => warn!(client = %self.peer, error = %err, "connection closed"),
        }

        self.stats.closed();
        result
    }

    async fn serve(&mut self) -> Result<(), ConnectionError> {
        loop {
            let next = self.process_buffered();
            self.flush_replies().await?;
            if let Next::Close = next {
                return Ok(());
            }

            if self.buffer.len() >= MAX_BUFFER_SIZE {
                return Err(ConnectionError::BufferFull(MAX_BUFFER_SIZE));
            }
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
            let n = self.stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return if self.buffer.is_empty() {
                    Ok(())
                } else {
                    Err(ConnectionError::UnexpectedEof)
                };
            }
            ConnectionStats::add(&self.stats.bytes_read, n);
            trace!(client = %self.peer, bytes = n, "read");
        }
    }

    /// Executes every complete frame in the buffer, queueing replies.
    fn process_buffered(&mut self) -> Next {
        loop {
            match self.parser.parse(&self.buffer) {
                Ok(Some((request, used))) => {
                    self.buffer.advance(used);
                    if matches!(&request, RespValue::Array(items) if items.is_empty()) {
                        continue;
                    }

                    let quit = is_quit(&request);
                    let reply = self.commands.execute(request);
                    self.stats.commands_processed.fetch_add(1, Ordering::Relaxed);
                    reply.write_to(&mut self.out);
                    if quit {
                        return Next::Close;
                    }
                }
                Ok(None) => return Next::Read,
                Err(err) => {
                    self.protocol_error(&err);
                    return Next::Read;
                }
            }
        }
    }

    fn protocol_error(&mut self, err: &ParseError) {
        warn!(client = %self.peer, error = %err, "protocol error");
        self.stats.protocol_errors.fetch_add(1, Ordering::Relaxed);
        RespValue::error(format!("ERR Protocol error: {}", err)).write_to(&mut self.out);
        self.buffer.clear();
    }

    async fn flush_replies(&mut self) -> Result<(), ConnectionError> {
        if self.out.is_empty() {
            return Ok(());
        }
        let bytes = self.out.split();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        ConnectionStats::add(&self.stats.bytes_written, bytes.len());
        trace!(client = %self.peer, bytes = bytes.len(), "wrote replies");
        Ok(())
    }
}

/// Runs a [`ConnectionHandler`] to completion, logging how it ended.
pub async fn handle_connection<S>(
    stream: S,
    peer: impl fmt::Display,
    commands: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let peer = peer.to_string();
    info!(client = %peer, "accepted connection");
    if let Err(err) = ConnectionHandler::new(stream, &peer, commands, stats)
        .run()
        .await
    {
        debug!(client = %peer, error = %err, "connection ended with error");
    }
}
