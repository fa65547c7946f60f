//! Connection registry mapping users to their live transport connections.
//!
//! The registry maintains bidirectional mappings: user → sessions (for
//! fan-out) and session → user (for cleanup on disconnect). This makes both
//! delivery lookups and unregister O(1) instead of scanning all users.
//!
//! An entry exists if and only if the user has at least one live connection.
//! The moment a user's set empties, the entry is removed - not merely
//! emptied - and that removal is the single signal the presence tracker uses
//! to decide "went offline".

use std::collections::{HashMap, HashSet, hash_map::Entry};

/// Outcome of binding a connection to a user identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterOutcome {
    /// First connection for this user (offline → online transition).
    CameOnline,
    /// The user already had other live connections (another tab or device).
    AlreadyOnline,
    /// The connection was already bound to this user (duplicate login).
    Unchanged,
}

/// Result of [`ConnectionRegistry::register`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Registration {
    /// Presence transition for the newly bound user.
    pub outcome: RegisterOutcome,
    /// Identity the session was detached from when a login rebinds it,
    /// with that user's "went offline" signal.
    pub detached: Option<(String, bool)>,
}

/// Registry of live connections keyed by user.
///
/// Mutations are observable only through return values and registry state;
/// presence broadcasting happens at the call sites, never in here.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    /// User ID → live session IDs. Invariant: sets are never empty.
    connections: HashMap<String, HashSet<u64>>,
    /// Session ID → owning user (reverse index).
    owners: HashMap<u64, String>,
}

impl ConnectionRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a session to a user, creating the entry if absent. Never fails.
    ///
    /// Binding a session that is already registered to the same user is an
    /// idempotent no-op. A session registered to a *different* user is
    /// detached from it first; the detached identity and its offline signal
    /// travel back in the [`Registration`] so no caller can lose them.
    pub fn register(&mut self, user_id: &str, session_id: u64) -> Registration {
        let mut detached = None;
        if let Some(owner) = self.owners.get(&session_id) {
            if owner == user_id {
                return Registration { outcome: RegisterOutcome::Unchanged, detached: None };
            }
            detached = self.unregister(session_id);
        }

        self.owners.insert(session_id, user_id.to_string());

        let outcome = match self.connections.entry(user_id.to_string()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().insert(session_id);
                RegisterOutcome::AlreadyOnline
            },
            Entry::Vacant(entry) => {
                entry.insert(HashSet::from([session_id]));
                RegisterOutcome::CameOnline
            },
        };

        Registration { outcome, detached }
    }

    /// Remove a session from whichever user owns it.
    ///
    /// Returns the owning user and whether this removal emptied the user's
    /// set (the "went offline" signal). Unregistering an unknown session is
    /// a no-op returning `None` - connections that disconnect before
    /// announcing an identity never entered the registry.
    pub fn unregister(&mut self, session_id: u64) -> Option<(String, bool)> {
        let user_id = self.owners.remove(&session_id)?;

        let went_offline = match self.connections.get_mut(&user_id) {
            Some(sessions) => {
                sessions.remove(&session_id);
                if sessions.is_empty() {
                    self.connections.remove(&user_id);
                    true
                } else {
                    false
                }
            },
            None => false,
        };

        Some((user_id, went_offline))
    }

    /// All live session IDs for a user. Empty for unknown users.
    pub fn connections_for(&self, user_id: &str) -> impl Iterator<Item = u64> + '_ {
        self.connections.get(user_id).into_iter().flat_map(|s| s.iter().copied())
    }

    /// Whether the user has at least one live connection.
    pub fn is_online(&self, user_id: &str) -> bool {
        self.connections.contains_key(user_id)
    }

    /// The user a session is bound to, if it announced an identity.
    pub fn owner(&self, session_id: u64) -> Option<&str> {
        self.owners.get(&session_id).map(String::as_str)
    }

    /// Number of users with at least one live connection.
    pub fn user_count(&self) -> usize {
        self.connections.len()
    }

    /// Number of registered connections across all users.
    pub fn connection_count(&self) -> usize {
        self.owners.len()
    }
}
