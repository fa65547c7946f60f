//! Server driver.
//!
//! Ties together the connection registry, presence tracker, message router,
//! and typing relay. Pure logic with no I/O: the runtime feeds it one
//! [`ServerEvent`] at a time and executes the returned [`ServerAction`]s.
//! Because each event is processed to completion before the next, register,
//! unregister, route, and relay are atomic with respect to one another by
//! construction - no locking inside the driver.

use std::collections::HashSet;

use parley_proto::{ChatMessage, ClientFrame, TypingNotice};

use crate::{
    driver_error::DriverError,
    presence::PresenceTracker,
    registry::{ConnectionRegistry, RegisterOutcome},
    router::MessageRouter,
    typing::TypingRelay,
};

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Maximum concurrent connections.
    pub max_connections: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { max_connections: 10_000 }
    }
}

/// Events that the server driver processes.
///
/// Produced by the external runtime; FIFO per connection.
#[derive(Debug, Clone)]
pub enum ServerEvent {
    /// A new transport connection was accepted.
    ConnectionAccepted {
        /// Unique connection ID assigned by the runtime.
        session_id: u64,
    },

    /// A frame was received from a connection.
    FrameReceived {
        /// Connection that sent the frame.
        session_id: u64,
        /// The decoded frame.
        frame: ClientFrame,
    },

    /// A connection was closed (by peer or error).
    ///
    /// The only cancellation signal there is; the driver unconditionally
    /// runs the unregister path, which is a no-op for connections that never
    /// announced an identity.
    ConnectionClosed {
        /// Connection that was closed.
        session_id: u64,
        /// Reason for closure.
        reason: String,
    },
}

/// Actions that the server driver produces.
///
/// Executed by runtime-specific code; every send is fire-and-forget.
#[derive(Debug, Clone)]
pub enum ServerAction {
    /// Send a frame to a specific session.
    SendToSession {
        /// Target session ID.
        session_id: u64,
        /// Frame to send.
        frame: parley_proto::ServerFrame,
    },

    /// Send a frame to every live connection, announced or not.
    Broadcast {
        /// Frame to broadcast.
        frame: parley_proto::ServerFrame,
    },

    /// Close a connection.
    CloseConnection {
        /// Session to close.
        session_id: u64,
        /// Reason for closure.
        reason: String,
    },

    /// Log a message.
    Log {
        /// Log level.
        level: LogLevel,
        /// Message to log.
        message: String,
    },
}

/// Log levels for server actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Debug information.
    Debug,
    /// Informational message.
    Info,
    /// Warning.
    Warn,
    /// Error.
    Error,
}

/// Action-based server driver.
///
/// Owns the connection registry exclusively; no component outside the
/// presence/router/relay trio it dispatches to may mutate it. The registry
/// lives in process memory, so this design supports exactly one server
/// process.
#[derive(Debug, Default)]
pub struct ServerDriver {
    /// Live transport connections, including ones that never logged in.
    sessions: HashSet<u64>,
    /// User ↔ connection directory.
    registry: ConnectionRegistry,
    /// Online/offline broadcast derivation.
    presence: PresenceTracker,
    /// Chat fan-out.
    router: MessageRouter,
    /// Typing-indicator fan-out.
    typing: TypingRelay,
    /// Server configuration.
    config: ServerConfig,
}

impl ServerDriver {
    /// Create a new server driver.
    pub fn new(config: ServerConfig) -> Self {
        Self {
            sessions: HashSet::new(),
            registry: ConnectionRegistry::new(),
            presence: PresenceTracker::new(),
            router: MessageRouter::new(),
            typing: TypingRelay::new(),
            config,
        }
    }

    /// Process a server event and return actions to execute.
    ///
    /// This is the main entry point for the driver.
    pub fn process_event(&mut self, event: ServerEvent) -> Result<Vec<ServerAction>, DriverError> {
        match event {
            ServerEvent::ConnectionAccepted { session_id } => {
                Ok(self.handle_connection_accepted(session_id))
            },
            ServerEvent::FrameReceived { session_id, frame } => {
                self.handle_frame_received(session_id, frame)
            },
            ServerEvent::ConnectionClosed { session_id, reason } => {
                Ok(self.handle_connection_closed(session_id, &reason))
            },
        }
    }

    fn handle_connection_accepted(&mut self, session_id: u64) -> Vec<ServerAction> {
        if self.sessions.len() >= self.config.max_connections {
            return vec![ServerAction::CloseConnection {
                session_id,
                reason: "max connections exceeded".to_string(),
            }];
        }

        self.sessions.insert(session_id);

        vec![ServerAction::Log {
            level: LogLevel::Debug,
            message: format!("connection {session_id} accepted"),
        }]
    }

    fn handle_frame_received(
        &mut self,
        session_id: u64,
        frame: ClientFrame,
    ) -> Result<Vec<ServerAction>, DriverError> {
        if !self.sessions.contains(&session_id) {
            return Err(DriverError::SessionNotFound(session_id));
        }

        match frame {
            ClientFrame::Login { user_id } => Ok(self.handle_login(session_id, &user_id)),
            ClientFrame::Chat(msg) => Ok(self.handle_chat(session_id, &msg)),
            ClientFrame::Typing(notice) => Ok(self.handle_typing(session_id, &notice)),
        }
    }

    /// Identity announcement: register + presence check.
    ///
    /// Repeated logins under the same identity are idempotent. A login under
    /// a *different* identity rebinds the connection; the registry reports
    /// the detached identity so its offline transition, if any, is broadcast
    /// before the new identity's online one.
    fn handle_login(&mut self, session_id: u64, user_id: &str) -> Vec<ServerAction> {
        let mut actions = Vec::new();

        let registration = self.registry.register(user_id, session_id);

        if let Some((previous, went_offline)) = registration.detached {
            actions.push(ServerAction::Log {
                level: LogLevel::Warn,
                message: format!("connection {session_id} rebound from {previous} to {user_id}"),
            });
            actions.extend(self.presence.on_unregister(&previous, went_offline));
        }

        if registration.outcome == RegisterOutcome::Unchanged {
            actions.push(ServerAction::Log {
                level: LogLevel::Debug,
                message: format!("duplicate login for {user_id} on connection {session_id}"),
            });
        }

        actions.extend(self.presence.on_register(user_id, registration.outcome));
        actions
    }

    /// Chat event: sender verification, then fan-out.
    ///
    /// The frame's `senderId` must match the connection's registered
    /// identity. The naive original trusted the claimed sender; here spoofed
    /// and unannounced senders are dropped with a log and nothing else.
    fn handle_chat(&mut self, session_id: u64, msg: &ChatMessage) -> Vec<ServerAction> {
        match self.registry.owner(session_id) {
            None => vec![ServerAction::Log {
                level: LogLevel::Debug,
                message: format!(
                    "dropping chat message from unannounced connection {session_id}"
                ),
            }],
            Some(owner) if owner != msg.sender_id => vec![ServerAction::Log {
                level: LogLevel::Warn,
                message: format!(
                    "dropping chat message: connection {session_id} is {owner} but claims \
                     sender {}",
                    msg.sender_id
                ),
            }],
            Some(_) => self.router.route(&self.registry, msg),
        }
    }

    /// Typing event: same sender verification, then targeted relay.
    fn handle_typing(&mut self, session_id: u64, notice: &TypingNotice) -> Vec<ServerAction> {
        match self.registry.owner(session_id) {
            None => vec![ServerAction::Log {
                level: LogLevel::Debug,
                message: format!(
                    "dropping typing notice from unannounced connection {session_id}"
                ),
            }],
            Some(owner) if owner != notice.from => vec![ServerAction::Log {
                level: LogLevel::Warn,
                message: format!(
                    "dropping typing notice: connection {session_id} is {owner} but claims \
                     sender {}",
                    notice.from
                ),
            }],
            Some(_) => self.typing.relay(&self.registry, notice),
        }
    }

    /// Disconnect: unconditional cleanup + presence check.
    ///
    /// The handle is removed from the registry before any broadcast action
    /// executes, so a failed presence send can never leave a dead handle
    /// behind.
    fn handle_connection_closed(&mut self, session_id: u64, reason: &str) -> Vec<ServerAction> {
        self.sessions.remove(&session_id);

        match self.registry.unregister(session_id) {
            Some((user_id, went_offline)) => {
                let mut actions = vec![ServerAction::Log {
                    level: LogLevel::Info,
                    message: format!("connection {session_id} ({user_id}) closed: {reason}"),
                }];
                actions.extend(self.presence.on_unregister(&user_id, went_offline));
                actions
            },
            None => vec![ServerAction::Log {
                level: LogLevel::Debug,
                message: format!("connection {session_id} closed before login: {reason}"),
            }],
        }
    }

    /// Number of live transport connections, announced or not.
    pub fn connection_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether a user has at least one registered connection.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.registry.is_online(user_id)
    }

    /// Read access to the user ↔ connection directory.
    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }
}
