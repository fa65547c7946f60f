//! Chat message routing: fan-out to the sender's and receiver's connections.

use std::collections::BTreeSet;

use parley_proto::{ChatMessage, ServerFrame};

use crate::{driver::ServerAction, registry::ConnectionRegistry};

/// Routes chat messages to exactly the two participants' live connections.
#[derive(Debug, Default)]
pub struct MessageRouter;

impl MessageRouter {
    /// Create a new message router.
    pub fn new() -> Self {
        Self
    }

    /// Deliver `msg` verbatim to every connection of the sender and of the
    /// receiver, and to nobody else.
    ///
    /// Echoing back to the sender's connections is intentional: every open
    /// tab of the sender stays in sync. An offline receiver is not an error;
    /// live delivery is simply skipped and the durable history collaborator
    /// covers catch-up on next connect. Each send is fire-and-forget - a
    /// stale handle is the executor's problem, not the sender's.
    pub fn route(&self, registry: &ConnectionRegistry, msg: &ChatMessage) -> Vec<ServerAction> {
        // BTreeSet both dedups (sender == receiver delivers once per handle)
        // and gives deterministic delivery order.
        let targets: BTreeSet<u64> = registry
            .connections_for(&msg.sender_id)
            .chain(registry.connections_for(&msg.receiver_id))
            .collect();

        targets
            .into_iter()
            .map(|session_id| ServerAction::SendToSession {
                session_id,
                frame: ServerFrame::Chat(msg.clone()),
            })
            .collect()
    }
}
