//! Parley realtime presence and messaging server.
//!
//! Best-effort live delivery for a task-board app's direct chat: a
//! connection-keyed directory of users, fan-out of chat messages to exactly
//! the two participants, online/offline presence broadcast, and ephemeral
//! typing-indicator relay. Durable history and authentication live in
//! external collaborators; this process only forwards.
//!
//! # Architecture
//!
//! The [`ServerDriver`] follows the Sans-IO pattern: pure logic that turns
//! inbound [`ServerEvent`]s into [`ServerAction`]s. [`Server`] is the
//! production glue that executes those actions over Quinn QUIC with Tokio.
//! The driver sits behind one async mutex, so every registry mutation runs to
//! completion before the next - the single-logical-thread model that makes
//! register/unregister/route/relay atomic without internal locking.
//!
//! # Components
//!
//! - [`ConnectionRegistry`]: user ↔ connection directory (bidirectional)
//! - [`PresenceTracker`]: online/offline transition broadcasts
//! - [`MessageRouter`]: chat fan-out to sender and receiver connections
//! - [`TypingRelay`]: typing notices to the target user only
//! - [`ServerDriver`]: dispatches events to the above, no I/O
//! - [`QuinnTransport`]: QUIC transport via the Quinn library

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod driver;
mod driver_error;
mod error;
mod presence;
mod registry;
mod router;
mod transport;
mod typing;

use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use bytes::{Bytes, BytesMut};
pub use driver::{LogLevel, ServerAction, ServerConfig as DriverConfig, ServerDriver, ServerEvent};
pub use driver_error::DriverError;
pub use error::ServerError;
use parley_proto::{ClientFrame, MAX_FRAME_SIZE, ServerFrame};
pub use presence::PresenceTracker;
pub use registry::{ConnectionRegistry, RegisterOutcome, Registration};
pub use router::MessageRouter;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    sync::{Mutex, RwLock},
};
pub use transport::{QuinnConnection, QuinnTransport};
pub use typing::TypingRelay;

/// Shared state for all connections.
///
/// Holds the transport handles the driver's actions resolve against. The
/// stream map is also the broadcast target set: every live connection has
/// exactly one outbound stream, announced or not.
struct SharedState {
    /// Session ID → QUIC connection (for closing)
    connections: RwLock<HashMap<u64, QuinnConnection>>,
    /// Session ID → persistent outbound stream. All frames to a client go
    /// through this single stream, preserving per-connection ordering.
    outbound_streams: RwLock<HashMap<u64, Mutex<quinn::SendStream>>>,
}

/// Server configuration for the production runtime.
#[derive(Debug, Clone)]
pub struct ServerRuntimeConfig {
    /// Address to bind to (e.g., "0.0.0.0:4000")
    pub bind_address: String,
    /// Path to TLS certificate (PEM format)
    pub cert_path: Option<String>,
    /// Path to TLS private key (PEM format)
    pub key_path: Option<String>,
    /// Driver configuration (connection limits)
    pub driver: DriverConfig,
}

impl Default for ServerRuntimeConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:4000".to_string(),
            cert_path: None,
            key_path: None,
            driver: DriverConfig::default(),
        }
    }
}

/// Production parley server.
///
/// Wraps `ServerDriver` with Quinn QUIC transport.
pub struct Server {
    /// The action-based server driver
    driver: ServerDriver,
    /// QUIC endpoint
    transport: QuinnTransport,
}

impl Server {
    /// Create and bind a new server.
    pub fn bind(config: ServerRuntimeConfig) -> Result<Self, ServerError> {
        let driver = ServerDriver::new(config.driver);
        let transport =
            QuinnTransport::bind(&config.bind_address, config.cert_path, config.key_path)?;

        Ok(Self { driver, transport })
    }

    /// Run the server, accepting connections and processing frames.
    ///
    /// Runs until the server is shut down or the endpoint fails.
    pub async fn run(self) -> Result<(), ServerError> {
        tracing::info!("server starting on {}", self.transport.local_addr()?);

        let driver = Arc::new(Mutex::new(self.driver));
        let shared = Arc::new(SharedState {
            connections: RwLock::new(HashMap::new()),
            outbound_streams: RwLock::new(HashMap::new()),
        });

        loop {
            match self.transport.accept().await {
                Ok(conn) => {
                    let driver = Arc::clone(&driver);
                    let shared = Arc::clone(&shared);

                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(conn, driver, shared).await {
                            tracing::error!("connection error: {}", e);
                        }
                    });
                },
                Err(e) => {
                    tracing::error!("accept error: {}", e);
                },
            }
        }
    }

    /// Local address the server is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.transport.local_addr()
    }
}

/// Mint a connection handle identity from the OS RNG.
#[allow(clippy::expect_used)]
fn next_session_id() -> u64 {
    let mut buf = [0u8; 8];
    getrandom::fill(&mut buf)
        .expect("invariant: OS RNG failure is unrecoverable - cannot mint session IDs");
    u64::from_le_bytes(buf)
}

/// Handle a single QUIC connection from accept to cleanup.
async fn handle_connection(
    conn: QuinnConnection,
    driver: Arc<Mutex<ServerDriver>>,
    shared: Arc<SharedState>,
) -> Result<(), ServerError> {
    let session_id = next_session_id();

    tracing::debug!("new connection {} from {}", session_id, conn.remote_addr());

    let outbound = conn.open_uni().await?;

    {
        let mut connections = shared.connections.write().await;
        connections.insert(session_id, conn.clone());
    }

    {
        let mut streams = shared.outbound_streams.write().await;
        streams.insert(session_id, Mutex::new(outbound));
    }

    let actions = {
        let mut driver = driver.lock().await;
        driver.process_event(ServerEvent::ConnectionAccepted { session_id })?
    };
    let rejected = connection_rejected(&actions, session_id);
    execute_actions(actions, &shared).await;

    // A refused connection never entered the driver's session set; frames
    // already in flight on its streams must not reach the driver.
    if rejected {
        shared.connections.write().await.remove(&session_id);
        shared.outbound_streams.write().await.remove(&session_id);
        return Ok(());
    }

    // All client frames arrive on the client's first bidirectional stream;
    // a single stream keeps them FIFO per connection.
    match conn.accept_bi().await {
        Ok((send, recv)) => {
            drop(send); // replies go through the persistent uni stream

            read_frames(session_id, recv, &driver, &shared).await;
        },
        Err(e) => {
            tracing::debug!("connection {} closed before opening a stream: {}", session_id, e);
        },
    }

    // Unconditional cleanup: the disconnect path runs whether or not a login
    // ever arrived, and before any further broadcast can fail.
    {
        let mut connections = shared.connections.write().await;
        connections.remove(&session_id);
    }

    {
        let mut streams = shared.outbound_streams.write().await;
        streams.remove(&session_id);
    }

    let actions = {
        let mut driver = driver.lock().await;
        driver.process_event(ServerEvent::ConnectionClosed {
            session_id,
            reason: "connection closed".to_string(),
        })?
    };
    execute_actions(actions, &shared).await;

    Ok(())
}

/// Whether the driver refused the session during accept.
fn connection_rejected(actions: &[ServerAction], session_id: u64) -> bool {
    actions.iter().any(|action| {
        matches!(
            action,
            ServerAction::CloseConnection { session_id: target, .. } if *target == session_id
        )
    })
}

/// Read newline-delimited frames until the stream ends or fails.
async fn read_frames(
    session_id: u64,
    recv: quinn::RecvStream,
    driver: &Arc<Mutex<ServerDriver>>,
    shared: &Arc<SharedState>,
) {
    if let Err(e) = pump_frames(session_id, recv, driver, shared).await {
        match e {
            ServerError::Driver(_) => {
                tracing::error!("frame processing failed for {}: {}", session_id, e);
            },
            _ => tracing::warn!("connection {} read loop ended: {}", session_id, e),
        }
    }
}

async fn pump_frames(
    session_id: u64,
    recv: quinn::RecvStream,
    driver: &Arc<Mutex<ServerDriver>>,
    shared: &Arc<SharedState>,
) -> Result<(), ServerError> {
    let mut frames = FrameReader::new(recv);

    while let Some(line) = frames.next_line().await? {
        let frame = ClientFrame::decode(&line)?;

        let actions = {
            let mut driver = driver.lock().await;
            driver.process_event(ServerEvent::FrameReceived { session_id, frame })?
        };

        execute_actions(actions, shared).await;
    }

    Ok(())
}

/// Newline framing over an async byte stream.
///
/// At most [`MAX_FRAME_SIZE`] bytes are buffered for a single line; a line
/// that reaches the cap without its newline fails the stream, keeping
/// per-connection memory bounded.
struct FrameReader<R> {
    reader: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    fn new(reader: R) -> Self {
        Self { reader, buf: BytesMut::with_capacity(4096) }
    }

    /// Next line including its newline; `Ok(None)` at clean end of stream.
    /// Trailing bytes without a final newline are returned as a last line.
    async fn next_line(&mut self) -> Result<Option<Bytes>, ServerError> {
        loop {
            if let Some(pos) = self.buf.iter().position(|&b| b == b'\n') {
                return Ok(Some(self.buf.split_to(pos + 1).freeze()));
            }

            if self.buf.len() >= MAX_FRAME_SIZE {
                return Err(ServerError::Protocol(format!(
                    "line exceeds {MAX_FRAME_SIZE} bytes without a newline"
                )));
            }

            if self.reader.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.buf.split().freeze()));
            }
        }
    }
}

/// Execute driver actions against the live transport state.
///
/// Every send is fire-and-forget: a failed write to one handle is logged and
/// the remaining handles still get theirs.
async fn execute_actions(actions: Vec<ServerAction>, shared: &SharedState) {
    for action in actions {
        match action {
            ServerAction::SendToSession { session_id, frame } => {
                let Some(buf) = encode_frame(&frame) else { continue };

                let streams = shared.outbound_streams.read().await;
                match streams.get(&session_id) {
                    Some(stream) => {
                        let mut stream = stream.lock().await;
                        if let Err(e) = stream.write_all(&buf).await {
                            tracing::warn!("send to session {} failed: {}", session_id, e);
                        }
                    },
                    None => {
                        tracing::debug!("send skipped: session {} already gone", session_id);
                    },
                }
            },

            ServerAction::Broadcast { frame } => {
                let Some(buf) = encode_frame(&frame) else { continue };

                let streams = shared.outbound_streams.read().await;
                for (session_id, stream) in streams.iter() {
                    let mut stream = stream.lock().await;
                    if let Err(e) = stream.write_all(&buf).await {
                        tracing::warn!("broadcast to session {} failed: {}", session_id, e);
                    }
                }
            },

            ServerAction::CloseConnection { session_id, reason } => {
                tracing::info!("closing connection {}: {}", session_id, reason);
                let mut connections = shared.connections.write().await;
                if let Some(conn) = connections.remove(&session_id) {
                    conn.close(0u32.into(), reason.as_bytes());
                }
            },

            ServerAction::Log { level, message } => match level {
                LogLevel::Debug => tracing::debug!("{}", message),
                LogLevel::Info => tracing::info!("{}", message),
                LogLevel::Warn => tracing::warn!("{}", message),
                LogLevel::Error => tracing::error!("{}", message),
            },
        }
    }
}

/// Encode an outbound frame, logging instead of failing; delivery is
/// best-effort.
fn encode_frame(frame: &ServerFrame) -> Option<Bytes> {
    let mut buf = BytesMut::new();
    match frame.encode(&mut buf) {
        Ok(()) => Some(buf.freeze()),
        Err(e) => {
            tracing::error!("failed to encode outbound frame: {}", e);
            None
        },
    }
}
