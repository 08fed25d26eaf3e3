/// Session registry for connected WebSocket clients
///
/// Tracks the push recipient for every live session. Delivery goes through
/// [`Recipient<PushMessage>`] rather than a concrete actor address, so the
/// registry stays decoupled from the session actor implementation.
use actix::{Message as ActixMessage, Recipient};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::messages::ServerEvent;

/// Unique identifier for a WebSocket session
pub type SessionId = Uuid;

/// Text frame delivered to a session actor
#[derive(ActixMessage, Clone)]
#[rtype(result = "()")]
pub struct PushMessage(pub String);

/// Push failures
///
/// A missing session is an expected condition, not a fault: clients drop off
/// while their routes still have traffic in flight.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("session {0} is not connected")]
    SessionNotFound(SessionId),

    #[error("failed to encode event: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Per-session bookkeeping
#[derive(Clone)]
struct SessionInfo {
    recipient: Recipient<PushMessage>,
    connected_at: DateTime<Utc>,
}

/// Registry of live sessions
pub struct SessionRegistry {
    sessions: Arc<DashMap<SessionId, SessionInfo>>,

    /// Metrics
    metrics: SessionMetrics,
}

#[derive(Default, Clone)]
struct SessionMetrics {
    registered_total: Arc<parking_lot::RwLock<usize>>,
    pushes_sent: Arc<parking_lot::RwLock<usize>>,
    pushes_failed: Arc<parking_lot::RwLock<usize>>,
}

impl SessionRegistry {
    /// Create new session registry
    pub fn new() -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            metrics: SessionMetrics::default(),
        }
    }

    /// Register a session's push recipient
    ///
    /// Registering an id that is already present replaces the stored
    /// recipient, which covers clients that reconnect with the same id.
    pub fn register(&self, session_id: SessionId, recipient: Recipient<PushMessage>) {
        let info = SessionInfo {
            recipient,
            connected_at: Utc::now(),
        };

        let replaced = self.sessions.insert(session_id, info).is_some();
        *self.metrics.registered_total.write() += 1;

        if replaced {
            tracing::info!("Session {} re-registered, recipient replaced", session_id);
        } else {
            tracing::info!("Session {} registered", session_id);
        }
    }

    /// Remove a session; unknown ids are ignored
    pub fn unregister(&self, session_id: SessionId) {
        if let Some((_, info)) = self.sessions.remove(&session_id) {
            tracing::info!(
                "Session {} unregistered (connected since {})",
                session_id,
                info.connected_at
            );
        }
    }

    /// Whether the session currently has a live connection
    pub fn is_connected(&self, session_id: SessionId) -> bool {
        self.sessions.contains_key(&session_id)
    }

    /// Deliver an event frame to a session
    ///
    /// Delivery is fire-and-forget: the frame is queued on the session
    /// actor's mailbox and sent in arrival order.
    pub fn push(&self, session_id: SessionId, event: &ServerEvent) -> Result<(), PushError> {
        let Some(info) = self.sessions.get(&session_id) else {
            *self.metrics.pushes_failed.write() += 1;
            return Err(PushError::SessionNotFound(session_id));
        };

        let json = event.to_json()?;
        info.recipient.do_send(PushMessage(json));
        *self.metrics.pushes_sent.write() += 1;

        Ok(())
    }

    /// Number of currently connected sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Lifetime count of registrations
    pub fn registered_total(&self) -> usize {
        *self.metrics.registered_total.read()
    }

    /// Total frames handed to session mailboxes
    pub fn pushes_sent(&self) -> usize {
        *self.metrics.pushes_sent.read()
    }

    /// Total pushes that found no session
    pub fn pushes_failed(&self) -> usize {
        *self.metrics.pushes_failed.read()
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix::{Actor, Context, Handler};
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::time::sleep;

    /// Actor that records every frame it receives
    struct Recorder {
        frames: Arc<Mutex<Vec<String>>>,
    }

    impl Actor for Recorder {
        type Context = Context<Self>;
    }

    impl Handler<PushMessage> for Recorder {
        type Result = ();

        fn handle(&mut self, msg: PushMessage, _ctx: &mut Self::Context) -> Self::Result {
            self.frames.lock().push(msg.0);
        }
    }

    fn spawn_recorder() -> (Recipient<PushMessage>, Arc<Mutex<Vec<String>>>) {
        let frames = Arc::new(Mutex::new(Vec::new()));
        let addr = Recorder {
            frames: frames.clone(),
        }
        .start();
        (addr.recipient(), frames)
    }

    #[actix_rt::test]
    async fn test_register_and_unregister() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (recipient, _) = spawn_recorder();

        registry.register(session_id, recipient);
        assert!(registry.is_connected(session_id));
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.registered_total(), 1);

        registry.unregister(session_id);
        assert!(!registry.is_connected(session_id));
        assert_eq!(registry.session_count(), 0);
    }

    #[actix_rt::test]
    async fn test_unregister_unknown_session_is_ignored() {
        let registry = SessionRegistry::new();

        registry.unregister(Uuid::new_v4());
        registry.unregister(Uuid::new_v4());

        assert_eq!(registry.session_count(), 0);
    }

    #[actix_rt::test]
    async fn test_reregistration_replaces_recipient() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (first, first_frames) = spawn_recorder();
        let (second, second_frames) = spawn_recorder();

        registry.register(session_id, first);
        registry.register(session_id, second);
        assert_eq!(registry.session_count(), 1);
        assert_eq!(registry.registered_total(), 2);

        let event = ServerEvent::activation_accepted("line-42");
        registry.push(session_id, &event).unwrap();

        sleep(Duration::from_millis(50)).await;

        assert!(first_frames.lock().is_empty());
        assert_eq!(second_frames.lock().len(), 1);
    }

    #[actix_rt::test]
    async fn test_push_delivers_frame() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (recipient, frames) = spawn_recorder();

        registry.register(session_id, recipient);

        let event = ServerEvent::position_update("line-42", Some([44.8, 20.5]), false);
        registry.push(session_id, &event).unwrap();

        sleep(Duration::from_millis(50)).await;

        let frames = frames.lock();
        assert_eq!(frames.len(), 1);
        assert!(frames[0].contains("\"routeId\":\"line-42\""));
        assert_eq!(registry.pushes_sent(), 1);
    }

    #[actix_rt::test]
    async fn test_push_to_missing_session_fails() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();

        let event = ServerEvent::activation_accepted("line-42");
        let result = registry.push(session_id, &event);

        assert!(matches!(result, Err(PushError::SessionNotFound(id)) if id == session_id));
        assert_eq!(registry.pushes_failed(), 1);
    }

    #[actix_rt::test]
    async fn test_push_preserves_order() {
        let registry = SessionRegistry::new();
        let session_id = Uuid::new_v4();
        let (recipient, frames) = spawn_recorder();

        registry.register(session_id, recipient);

        for seq in 0..3 {
            let event =
                ServerEvent::position_update("line-42", Some([44.0 + seq as f64, 20.5]), false);
            registry.push(session_id, &event).unwrap();
        }

        sleep(Duration::from_millis(50)).await;

        let frames = frames.lock();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("[44.0,"));
        assert!(frames[1].contains("[45.0,"));
        assert!(frames[2].contains("[46.0,"));
    }
}
