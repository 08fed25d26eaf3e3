/// Route activation table
///
/// Maps each active route to the session that owns it. A route has at most
/// one owner at a time; this table is the single authority for that
/// invariant, and every mutation takes the same write lock.
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

use crate::ws::SessionId;

/// Route identifier as carried on the wire
pub type RouteId = String;

/// What a successful activation did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// The route had no owner and is now bound to the session
    Activated,

    /// The same session already owned the route; nothing changed
    AlreadyOwned,
}

/// Activation conflicts
#[derive(Debug, thiserror::Error)]
pub enum ActivationError {
    #[error("route {route_id} is already active for session {owner}")]
    RouteAlreadyActive { route_id: RouteId, owner: SessionId },
}

/// Ownership entry for one active route
#[derive(Debug, Clone)]
struct ActivationEntry {
    session_id: SessionId,
    activated_at: DateTime<Utc>,
}

/// Diagnostic view of one active route
#[derive(Debug, Clone, Serialize)]
pub struct ActiveRoute {
    pub route_id: RouteId,
    pub session_id: SessionId,
    pub activated_at: DateTime<Utc>,
}

/// Table of active routes and their owning sessions
pub struct ActivationTable {
    entries: RwLock<HashMap<RouteId, ActivationEntry>>,
}

impl ActivationTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Bind a route to a session
    ///
    /// Re-activating a route the session already owns is a no-op. A route
    /// owned by a different session is a conflict and nothing changes.
    pub fn activate(
        &self,
        route_id: &str,
        session_id: SessionId,
    ) -> Result<ActivationOutcome, ActivationError> {
        let mut entries = self.entries.write();

        if let Some(entry) = entries.get(route_id) {
            if entry.session_id == session_id {
                return Ok(ActivationOutcome::AlreadyOwned);
            }
            return Err(ActivationError::RouteAlreadyActive {
                route_id: route_id.to_string(),
                owner: entry.session_id,
            });
        }

        entries.insert(
            route_id.to_string(),
            ActivationEntry {
                session_id,
                activated_at: Utc::now(),
            },
        );

        Ok(ActivationOutcome::Activated)
    }

    /// Session currently bound to the route, if any
    pub fn resolve(&self, route_id: &str) -> Option<SessionId> {
        self.entries.read().get(route_id).map(|e| e.session_id)
    }

    /// Release a route; returns whether an entry was removed
    pub fn deactivate(&self, route_id: &str) -> bool {
        self.entries.write().remove(route_id).is_some()
    }

    /// Release a route only while the given session still owns it
    ///
    /// Rolls back a tentative activation without clobbering an entry the
    /// route may since have been handed to another session. The owner
    /// comparison and the removal happen under the same write lock.
    pub fn deactivate_if_owned(&self, route_id: &str, session_id: SessionId) -> bool {
        let mut entries = self.entries.write();

        let owned = entries
            .get(route_id)
            .map_or(false, |entry| entry.session_id == session_id);

        if owned {
            entries.remove(route_id);
        }
        owned
    }

    /// Release every route owned by the session, returning the released ids
    pub fn purge_session(&self, session_id: SessionId) -> Vec<RouteId> {
        let mut entries = self.entries.write();

        let released: Vec<RouteId> = entries
            .iter()
            .filter(|(_, entry)| entry.session_id == session_id)
            .map(|(route_id, _)| route_id.clone())
            .collect();

        entries.retain(|_, entry| entry.session_id != session_id);

        released
    }

    /// Number of currently active routes
    pub fn active_count(&self) -> usize {
        self.entries.read().len()
    }

    /// Snapshot of active routes for diagnostics
    pub fn snapshot(&self) -> Vec<ActiveRoute> {
        self.entries
            .read()
            .iter()
            .map(|(route_id, entry)| ActiveRoute {
                route_id: route_id.clone(),
                session_id: entry.session_id,
                activated_at: entry.activated_at,
            })
            .collect()
    }
}

impl Default for ActivationTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    #[test]
    fn test_activate_then_resolve() {
        let table = ActivationTable::new();
        let session = Uuid::new_v4();

        let outcome = table.activate("line-42", session).unwrap();
        assert_eq!(outcome, ActivationOutcome::Activated);
        assert_eq!(table.resolve("line-42"), Some(session));
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn test_second_session_gets_conflict() {
        let table = ActivationTable::new();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();

        table.activate("line-42", first).unwrap();
        let result = table.activate("line-42", second);

        match result {
            Err(ActivationError::RouteAlreadyActive { route_id, owner }) => {
                assert_eq!(route_id, "line-42");
                assert_eq!(owner, first);
            }
            _ => panic!("Expected conflict"),
        }

        // The first owner is untouched
        assert_eq!(table.resolve("line-42"), Some(first));
    }

    #[test]
    fn test_same_session_reactivation_is_noop() {
        let table = ActivationTable::new();
        let session = Uuid::new_v4();

        table.activate("line-42", session).unwrap();
        let outcome = table.activate("line-42", session).unwrap();

        assert_eq!(outcome, ActivationOutcome::AlreadyOwned);
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn test_deactivate_is_idempotent() {
        let table = ActivationTable::new();
        let session = Uuid::new_v4();

        table.activate("line-42", session).unwrap();

        assert!(table.deactivate("line-42"));
        assert!(!table.deactivate("line-42"));
        assert_eq!(table.resolve("line-42"), None);
    }

    #[test]
    fn test_deactivate_if_owned_requires_matching_owner() {
        let table = ActivationTable::new();
        let owner = Uuid::new_v4();
        let other = Uuid::new_v4();

        table.activate("line-42", owner).unwrap();

        // A non-owner cannot release the route
        assert!(!table.deactivate_if_owned("line-42", other));
        assert_eq!(table.resolve("line-42"), Some(owner));

        assert!(table.deactivate_if_owned("line-42", owner));
        assert_eq!(table.resolve("line-42"), None);

        // Absent entries are a no-op, as with deactivate
        assert!(!table.deactivate_if_owned("line-42", owner));
    }

    #[test]
    fn test_one_session_may_own_multiple_routes() {
        let table = ActivationTable::new();
        let session = Uuid::new_v4();

        table.activate("line-1", session).unwrap();
        table.activate("line-2", session).unwrap();

        assert_eq!(table.active_count(), 2);
        assert_eq!(table.resolve("line-1"), Some(session));
        assert_eq!(table.resolve("line-2"), Some(session));
    }

    #[test]
    fn test_purge_session_releases_only_owned_routes() {
        let table = ActivationTable::new();
        let leaving = Uuid::new_v4();
        let staying = Uuid::new_v4();

        table.activate("line-1", leaving).unwrap();
        table.activate("line-2", leaving).unwrap();
        table.activate("line-3", staying).unwrap();

        let mut released = table.purge_session(leaving);
        released.sort();

        assert_eq!(released, vec!["line-1".to_string(), "line-2".to_string()]);
        assert_eq!(table.resolve("line-1"), None);
        assert_eq!(table.resolve("line-2"), None);
        assert_eq!(table.resolve("line-3"), Some(staying));
        assert_eq!(table.active_count(), 1);
    }

    #[test]
    fn test_purge_unknown_session_is_empty() {
        let table = ActivationTable::new();

        let released = table.purge_session(Uuid::new_v4());
        assert!(released.is_empty());
    }

    #[test]
    fn test_snapshot_reflects_active_routes() {
        let table = ActivationTable::new();
        let session = Uuid::new_v4();

        table.activate("line-42", session).unwrap();

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot[0].route_id, "line-42");
        assert_eq!(snapshot[0].session_id, session);
    }

    #[test]
    fn test_concurrent_activation_has_single_winner() {
        let table = Arc::new(ActivationTable::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = table.clone();
                std::thread::spawn(move || table.activate("line-42", Uuid::new_v4()).is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap_or(false))
            .filter(|won| *won)
            .count();

        assert_eq!(winners, 1);
        assert_eq!(table.active_count(), 1);
    }
}
