//! Ephemeral typing-indicator relay.

use std::collections::BTreeSet;

use parley_proto::{ServerFrame, TypingNotice};

use crate::{driver::ServerAction, registry::ConnectionRegistry};

/// Forwards typing notices to the target user's connections only.
///
/// Unlike chat routing there is no sender echo: the sender already knows they
/// are typing. Nothing is tracked per pair and no "stopped typing" event
/// exists; consumers expire the indicator on their own short timeout.
#[derive(Debug, Default)]
pub struct TypingRelay;

impl TypingRelay {
    /// Create a new typing relay.
    pub fn new() -> Self {
        Self
    }

    /// Deliver `notice` to every connection of `notice.to`. No recipients is
    /// not an error - the notice just evaporates.
    pub fn relay(&self, registry: &ConnectionRegistry, notice: &TypingNotice) -> Vec<ServerAction> {
        let targets: BTreeSet<u64> = registry.connections_for(&notice.to).collect();

        targets
            .into_iter()
            .map(|session_id| ServerAction::SendToSession {
                session_id,
                frame: ServerFrame::Typing(notice.clone()),
            })
            .collect()
    }
}
