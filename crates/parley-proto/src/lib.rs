//! Parley wire protocol.
//!
//! Defines the events exchanged between clients and the realtime server:
//! identity announcement, chat messages, typing notices, and presence
//! broadcasts. Events travel as newline-delimited JSON objects of the form
//! `{"event": <name>, "data": <payload>}`, so the same frame shape works for
//! both directions and new event types can be added without breaking old
//! clients.
//!
//! The server never inspects chat text; payloads are forwarded verbatim.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod errors;
mod events;

pub use errors::{ProtocolError, Result};
pub use events::{ChatMessage, ClientFrame, MAX_FRAME_SIZE, ServerFrame, TypingNotice};

/// ALPN protocol identifier negotiated during the QUIC handshake.
pub const ALPN_PROTOCOL: &[u8] = b"parley/1";
