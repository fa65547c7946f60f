//! Presence tracking: online/offline broadcasts derived from registry
//! transitions.
//!
//! Presence is binary per user, not per connection. A broadcast fires only
//! on the offline→online and online→offline edges; adding or removing a
//! connection that leaves the user with others produces nothing.

use parley_proto::ServerFrame;

use crate::{
    driver::{LogLevel, ServerAction},
    registry::RegisterOutcome,
};

/// Derives presence broadcasts from connection registry mutations.
///
/// The registry itself never broadcasts; the driver feeds each mutation's
/// outcome through here and executes the resulting actions. Broadcasts go to
/// every live connection, announced or not, including the subject's own.
#[derive(Debug, Default)]
pub struct PresenceTracker;

impl PresenceTracker {
    /// Create a new presence tracker.
    pub fn new() -> Self {
        Self
    }

    /// Actions for a completed registry `register` call.
    pub fn on_register(&self, user_id: &str, outcome: RegisterOutcome) -> Vec<ServerAction> {
        match outcome {
            RegisterOutcome::CameOnline => vec![
                ServerAction::Broadcast {
                    frame: ServerFrame::UserOnline { user_id: user_id.to_string() },
                },
                ServerAction::Log {
                    level: LogLevel::Info,
                    message: format!("user {user_id} online"),
                },
            ],
            RegisterOutcome::AlreadyOnline | RegisterOutcome::Unchanged => Vec::new(),
        }
    }

    /// Actions for a completed registry `unregister` call.
    ///
    /// `went_offline` is the registry's "entry emptied" signal.
    pub fn on_unregister(&self, user_id: &str, went_offline: bool) -> Vec<ServerAction> {
        if !went_offline {
            return Vec::new();
        }

        vec![
            ServerAction::Broadcast {
                frame: ServerFrame::UserOffline { user_id: user_id.to_string() },
            },
            ServerAction::Log { level: LogLevel::Info, message: format!("user {user_id} offline") },
        ]
    }
}
