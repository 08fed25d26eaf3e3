/// WebSocket session management for the relay
///
/// Provides the session registry and the push message type session actors
/// receive frames through.
pub mod registry;

pub use registry::{PushError, PushMessage, SessionId, SessionRegistry};

// Re-export the session actor module from parent
pub use crate::websocket as handler;
