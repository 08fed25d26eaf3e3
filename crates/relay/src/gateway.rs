/// Relay gateway coordinating sessions, activations, and the broker
///
/// Every client command and every feed report funnels through here. Handlers
/// log failures and surface them to the caller where one exists; nothing in
/// this module terminates the process.
///
/// The disconnect path unregisters the session before purging its routes.
/// Combined with the ownership re-check in the activation path, that
/// ordering closes the race where a disconnect lands mid-activation: once
/// the session is gone from the registry the re-check fails and the fresh
/// entry is rolled back, so no route stays bound to a dead session.
use actix::Recipient;
use serde::Serialize;
use std::sync::Arc;

use crate::activation::{ActivationError, ActivationOutcome, ActivationTable};
use crate::broker::{ActivationProducer, BrokerError};
use crate::messages::{ActivationEvent, PositionReport, ServerEvent};
use crate::ws::{PushError, PushMessage, SessionId, SessionRegistry};

/// Why an activation request was not accepted
#[derive(Debug, thiserror::Error)]
pub enum ActivateRejection {
    #[error("route {route_id} is already active for session {owner}")]
    RouteAlreadyActive { route_id: String, owner: SessionId },

    #[error("activation event could not be published: {0}")]
    BrokerUnavailable(#[from] BrokerError),

    #[error("session {0} is not connected")]
    SessionNotConnected(SessionId),
}

/// Counters exposed on the stats endpoint
#[derive(Debug, Clone, Serialize)]
pub struct GatewayStats {
    pub activations_accepted: usize,
    pub activations_rejected: usize,
    pub positions_relayed: usize,
    pub positions_dropped: usize,
    pub routes_finished: usize,
}

#[derive(Default, Clone)]
struct GatewayMetrics {
    activations_accepted: Arc<parking_lot::RwLock<usize>>,
    activations_rejected: Arc<parking_lot::RwLock<usize>>,
    positions_relayed: Arc<parking_lot::RwLock<usize>>,
    positions_dropped: Arc<parking_lot::RwLock<usize>>,
    routes_finished: Arc<parking_lot::RwLock<usize>>,
}

/// Gateway between WebSocket sessions and the event broker
pub struct RelayGateway {
    registry: Arc<SessionRegistry>,
    table: Arc<ActivationTable>,
    producer: Arc<dyn ActivationProducer>,
    metrics: GatewayMetrics,
}

impl RelayGateway {
    pub fn new(
        registry: Arc<SessionRegistry>,
        table: Arc<ActivationTable>,
        producer: Arc<dyn ActivationProducer>,
    ) -> Self {
        Self {
            registry,
            table,
            producer,
            metrics: GatewayMetrics::default(),
        }
    }

    /// Register a session's push recipient
    pub fn handle_connect(&self, session_id: SessionId, recipient: Recipient<PushMessage>) {
        self.registry.register(session_id, recipient);
    }

    /// Unregister the session, then release every route it owns
    ///
    /// The order matters: an activation racing this disconnect re-checks the
    /// registry after inserting its entry, and that re-check is only reliable
    /// because unregistration strictly precedes the purge.
    pub fn handle_disconnect(&self, session_id: SessionId) {
        self.registry.unregister(session_id);

        let released = self.table.purge_session(session_id);
        for route_id in &released {
            tracing::info!(
                "Released route {} after session {} disconnect",
                route_id,
                session_id
            );
        }
    }

    /// Process an activate-route command
    ///
    /// Accepts when the route is free (or already owned by this session),
    /// publishes the activation event, and rolls the entry back if the
    /// publish fails or the session disconnects mid-flight.
    pub async fn handle_activate(
        &self,
        route_id: &str,
        session_id: SessionId,
    ) -> Result<(), ActivateRejection> {
        if !self.registry.is_connected(session_id) {
            tracing::debug!(
                "Ignoring activation of route {} from disconnected session {}",
                route_id,
                session_id
            );
            *self.metrics.activations_rejected.write() += 1;
            return Err(ActivateRejection::SessionNotConnected(session_id));
        }

        match self.table.activate(route_id, session_id) {
            Ok(ActivationOutcome::AlreadyOwned) => {
                // Idempotent re-activation; the event was already published
                tracing::debug!(
                    "Session {} re-activated route {} it already owns",
                    session_id,
                    route_id
                );
                return Ok(());
            }
            Ok(ActivationOutcome::Activated) => {}
            Err(ActivationError::RouteAlreadyActive { route_id, owner }) => {
                tracing::warn!(
                    "Rejecting activation of route {}: owned by session {}",
                    route_id,
                    owner
                );
                *self.metrics.activations_rejected.write() += 1;
                return Err(ActivateRejection::RouteAlreadyActive { route_id, owner });
            }
        }

        // The session may have disconnected while the entry went in; a purge
        // that ran before the insert never saw it. Remove only this call's
        // own entry in case the route has already changed hands.
        if !self.registry.is_connected(session_id) {
            self.table.deactivate_if_owned(route_id, session_id);
            tracing::warn!(
                "Session {} disconnected during activation of route {}, rolled back",
                session_id,
                route_id
            );
            *self.metrics.activations_rejected.write() += 1;
            return Err(ActivateRejection::SessionNotConnected(session_id));
        }

        let event = ActivationEvent {
            route_id: route_id.to_string(),
            session_id,
        };

        if let Err(e) = self.producer.publish_activation(&event).await {
            // The owner may have disconnected and the route been re-activated
            // while the publish was in flight; never remove another
            // session's entry.
            self.table.deactivate_if_owned(route_id, session_id);
            tracing::error!(
                "Activation publish failed for route {}, rolled back: {}",
                route_id,
                e
            );
            *self.metrics.activations_rejected.write() += 1;
            return Err(e.into());
        }

        *self.metrics.activations_accepted.write() += 1;
        tracing::info!("Route {} activated by session {}", route_id, session_id);

        Ok(())
    }

    /// Relay a position report to the owning session
    ///
    /// Reports for routes without an owner are dropped with a log line. A
    /// finished report always releases the route, whether or not the push
    /// found its session.
    pub async fn handle_position_update(&self, report: PositionReport) {
        let Some(owner) = self.table.resolve(&report.route_id) else {
            *self.metrics.positions_dropped.write() += 1;
            tracing::warn!("Dropping position for inactive route {}", report.route_id);
            return;
        };

        let event =
            ServerEvent::position_update(report.route_id.clone(), report.position, report.finished);

        match self.registry.push(owner, &event) {
            Ok(()) => {
                *self.metrics.positions_relayed.write() += 1;
            }
            Err(PushError::SessionNotFound(session_id)) => {
                *self.metrics.positions_dropped.write() += 1;
                tracing::warn!(
                    "Dropping position for route {}: session {} is gone",
                    report.route_id,
                    session_id
                );
            }
            Err(PushError::Serialization(e)) => {
                *self.metrics.positions_dropped.write() += 1;
                tracing::error!("Failed to encode position frame: {}", e);
            }
        }

        // Release only the activation the report was resolved against; the
        // route may have moved to a new owner mid-relay.
        if report.finished && self.table.deactivate_if_owned(&report.route_id, owner) {
            *self.metrics.routes_finished.write() += 1;
            tracing::info!("Route {} finished, released", report.route_id);
        }
    }

    /// Snapshot of the gateway counters
    pub fn stats(&self) -> GatewayStats {
        GatewayStats {
            activations_accepted: *self.metrics.activations_accepted.read(),
            activations_rejected: *self.metrics.activations_rejected.read(),
            positions_relayed: *self.metrics.positions_relayed.read(),
            positions_dropped: *self.metrics.positions_dropped.read(),
            routes_finished: *self.metrics.routes_finished.read(),
        }
    }
}
