//! Wire event types and the newline-delimited JSON codec.
//!
//! Each frame is one JSON object per line: `{"event": <name>, "data": ...}`.
//! The event names (`login`, `chat message`, `typing`, `user online`,
//! `user offline`) and camelCase payload fields are a fixed contract with the
//! frontend and must not change.
//!
//! # Invariants
//!
//! - Each variant maps to exactly one event name (enforced by the serde tag).
//! - Encoding a frame and decoding the resulting line produces an equivalent
//!   value.
//! - No frame, inbound or outbound, may exceed [`MAX_FRAME_SIZE`].

use bytes::BufMut;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::errors::{ProtocolError, Result};

/// Maximum encoded size of a single frame, including the trailing newline.
///
/// Bounds per-connection memory; chat text is short-form, so 64 KiB leaves
/// generous headroom.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

/// A chat message relayed between exactly two users.
///
/// Immutable once created; the server forwards it verbatim and never stores
/// it. Durable history is persisted by the external store through its own
/// API, independently of this relay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// User the message is from.
    pub sender_id: String,
    /// User the message is addressed to.
    pub receiver_id: String,
    /// Message body, forwarded untouched.
    pub text: String,
    /// Client-supplied timestamp in Unix milliseconds.
    pub timestamp: u64,
}

/// An ephemeral "peer is typing" notice.
///
/// Never stored, never acknowledged. Consumers expire the indicator on their
/// own short timeout; there is no explicit "stopped typing" event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypingNotice {
    /// User who is typing.
    pub from: String,
    /// User being typed to.
    pub to: String,
}

/// Frames sent by clients to the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ClientFrame {
    /// Identity announcement. Must precede chat and typing frames; repeating
    /// it on the same connection is idempotent.
    #[serde(rename = "login")]
    Login {
        /// Identity obtained from the external auth collaborator.
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// A chat message to relay.
    #[serde(rename = "chat message")]
    Chat(ChatMessage),

    /// A typing notice to relay.
    #[serde(rename = "typing")]
    Typing(TypingNotice),
}

/// Frames sent by the server to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum ServerFrame {
    /// A user gained their first live connection.
    #[serde(rename = "user online")]
    UserOnline {
        /// User that came online.
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// A user's last live connection closed.
    #[serde(rename = "user offline")]
    UserOffline {
        /// User that went offline.
        #[serde(rename = "userId")]
        user_id: String,
    },

    /// A relayed chat message.
    #[serde(rename = "chat message")]
    Chat(ChatMessage),

    /// A relayed typing notice.
    #[serde(rename = "typing")]
    Typing(TypingNotice),
}

impl ClientFrame {
    /// Encode the frame as one JSON line into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        encode_frame(self, dst)
    }

    /// Decode a frame from a single line (without or with the newline).
    pub fn decode(line: &[u8]) -> Result<Self> {
        decode_frame(line)
    }
}

impl ServerFrame {
    /// Encode the frame as one JSON line into `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) -> Result<()> {
        encode_frame(self, dst)
    }

    /// Decode a frame from a single line (without or with the newline).
    pub fn decode(line: &[u8]) -> Result<Self> {
        decode_frame(line)
    }
}

fn encode_frame(frame: &impl Serialize, dst: &mut impl BufMut) -> Result<()> {
    let encoded = serde_json::to_vec(frame)?;

    // +1 for the newline terminator
    if encoded.len() + 1 > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge {
            size: encoded.len() + 1,
            max: MAX_FRAME_SIZE,
        });
    }

    dst.put_slice(&encoded);
    dst.put_u8(b'\n');

    Ok(())
}

fn decode_frame<T: DeserializeOwned>(line: &[u8]) -> Result<T> {
    if line.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: line.len(), max: MAX_FRAME_SIZE });
    }

    let trimmed = match line.last() {
        Some(b'\n') => &line[..line.len() - 1],
        _ => line,
    };

    Ok(serde_json::from_slice(trimmed)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn login_decodes_from_frontend_shape() {
        let line = br#"{"event":"login","data":{"userId":"u1"}}"#;
        let frame = ClientFrame::decode(line).unwrap();
        assert_eq!(frame, ClientFrame::Login { user_id: "u1".to_string() });
    }

    #[test]
    fn chat_message_uses_camel_case_fields() {
        let msg = ChatMessage {
            sender_id: "u1".to_string(),
            receiver_id: "u2".to_string(),
            text: "hi".to_string(),
            timestamp: 1000,
        };

        let mut buf = Vec::new();
        ServerFrame::Chat(msg).encode(&mut buf).unwrap();

        let line = String::from_utf8(buf).unwrap();
        assert!(line.ends_with('\n'));
        assert!(line.contains(r#""event":"chat message""#));
        assert!(line.contains(r#""senderId":"u1""#));
        assert!(line.contains(r#""receiverId":"u2""#));
        assert!(line.contains(r#""timestamp":1000"#));
    }

    #[test]
    fn presence_event_names_are_stable() {
        let mut buf = Vec::new();
        ServerFrame::UserOnline { user_id: "u1".to_string() }.encode(&mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains(r#""event":"user online""#));

        let mut buf = Vec::new();
        ServerFrame::UserOffline { user_id: "u1".to_string() }.encode(&mut buf).unwrap();
        assert!(String::from_utf8(buf).unwrap().contains(r#""event":"user offline""#));
    }

    #[test]
    fn typing_round_trips_with_newline() {
        let frame =
            ClientFrame::Typing(TypingNotice { from: "u1".to_string(), to: "u2".to_string() });

        let mut buf = Vec::new();
        frame.encode(&mut buf).unwrap();

        let decoded = ClientFrame::decode(&buf).unwrap();
        assert_eq!(decoded, frame);
    }

    #[test]
    fn unknown_event_name_is_rejected() {
        let line = br#"{"event":"shutdown","data":{}}"#;
        assert!(matches!(ClientFrame::decode(line), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn truncated_json_is_rejected() {
        let line = br#"{"event":"login","data":{"userId":"#;
        assert!(matches!(ClientFrame::decode(line), Err(ProtocolError::Malformed(_))));
    }

    #[test]
    fn oversized_frame_is_rejected_on_encode() {
        let msg = ChatMessage {
            sender_id: "u1".to_string(),
            receiver_id: "u2".to_string(),
            text: "x".repeat(MAX_FRAME_SIZE),
            timestamp: 0,
        };

        let mut buf = Vec::new();
        let result = ServerFrame::Chat(msg).encode(&mut buf);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge { .. })));
    }

    #[test]
    fn oversized_line_is_rejected_on_decode() {
        let line = vec![b'x'; MAX_FRAME_SIZE + 1];
        assert!(matches!(
            ClientFrame::decode(&line),
            Err(ProtocolError::FrameTooLarge { .. })
        ));
    }
}
