/// Wire protocol for the relay service
///
/// Frame type tags are kebab-case, field names camelCase, matching what the
/// vehicle clients and the dispatch simulator already speak. Positions travel
/// as `[lat, lng]` pairs on the wire.
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Commands received from clients over WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClientCommand {
    #[serde(rename = "activate-route", rename_all = "camelCase")]
    ActivateRoute { route_id: String },
}

/// Events pushed to clients over WebSocket
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "position-update", rename_all = "camelCase")]
    PositionUpdate {
        route_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        position: Option<[f64; 2]>,
        finished: bool,
    },

    #[serde(rename = "activation-accepted", rename_all = "camelCase")]
    ActivationAccepted { route_id: String },

    #[serde(rename = "activation-rejected", rename_all = "camelCase")]
    ActivationRejected {
        route_id: String,
        reason: RejectReason,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

impl ServerEvent {
    pub fn position_update(
        route_id: impl Into<String>,
        position: Option<[f64; 2]>,
        finished: bool,
    ) -> Self {
        Self::PositionUpdate {
            route_id: route_id.into(),
            position,
            finished,
        }
    }

    pub fn activation_accepted(route_id: impl Into<String>) -> Self {
        Self::ActivationAccepted {
            route_id: route_id.into(),
        }
    }

    pub fn activation_rejected(route_id: impl Into<String>, reason: RejectReason) -> Self {
        Self::ActivationRejected {
            route_id: route_id.into(),
            reason,
        }
    }

    /// Serialize to JSON text for WebSocket transmission
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Why an activation request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    #[serde(rename = "route-already-active")]
    RouteAlreadyActive,

    #[serde(rename = "broker-unavailable")]
    BrokerUnavailable,
}

/// Event published to the activation topic when a route gains an owner
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivationEvent {
    pub route_id: String,
    pub session_id: Uuid,
}

/// Position sample consumed from the position topic
///
/// Legacy producers include a `clientId` field; it is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionReport {
    pub route_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub position: Option<[f64; 2]>,

    pub finished: bool,
}
