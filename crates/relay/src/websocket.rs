/// WebSocket session actor for vehicle tracking clients
///
/// Each connection is a fresh session with its own id. The actor registers
/// itself with the gateway on start and hands everything it owns back on
/// disconnect.
use actix::{
    Actor, ActorContext, AsyncContext, Handler, Message as ActixMessage, Running, StreamHandler,
};
use actix_web_actors::ws;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::gateway::{ActivateRejection, RelayGateway};
use crate::messages::{ClientCommand, RejectReason, ServerEvent};
use crate::ws::{PushMessage, SessionId};

/// WebSocket connection heartbeat interval (30 seconds)
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// Client timeout (60 seconds - 2 missed heartbeats)
const CLIENT_TIMEOUT: Duration = Duration::from_secs(60);

/// Outcome of an activation request, routed back to the session actor
#[derive(ActixMessage)]
#[rtype(result = "()")]
struct ActivationReply {
    route_id: String,
    result: Result<(), ActivateRejection>,
}

/// WebSocket session actor
pub struct RelaySession {
    /// Session identifier, minted per connection
    session_id: SessionId,

    /// Gateway shared across sessions
    gateway: Arc<RelayGateway>,

    /// Last heartbeat timestamp
    hb: Instant,
}

impl RelaySession {
    /// Create new WebSocket session
    pub fn new(gateway: Arc<RelayGateway>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            gateway,
            hb: Instant::now(),
        }
    }

    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    /// Start heartbeat process
    fn start_heartbeat(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            // Check if client has sent heartbeat recently
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                tracing::warn!(
                    "Session {} heartbeat timeout, disconnecting",
                    act.session_id
                );
                ctx.stop();
                return;
            }

            // Send ping to client
            ctx.ping(b"");
        });
    }

    /// Serialize and send an event frame
    fn send_event(&self, event: &ServerEvent, ctx: &mut ws::WebsocketContext<Self>) {
        match event.to_json() {
            Ok(json) => ctx.text(json),
            Err(e) => {
                tracing::error!(
                    "Failed to encode frame for session {}: {}",
                    self.session_id,
                    e
                );
            }
        }
    }

    /// Handle a parsed client command
    fn handle_command(&mut self, command: ClientCommand, ctx: &mut ws::WebsocketContext<Self>) {
        match command {
            ClientCommand::ActivateRoute { route_id } => {
                tracing::debug!(
                    "Session {} requested activation of route {}",
                    self.session_id,
                    route_id
                );

                let gateway = self.gateway.clone();
                let session_id = self.session_id;
                let addr = ctx.address();

                // The gateway call publishes to the broker; run it off the
                // actor loop and route the outcome back as a message.
                actix::spawn(async move {
                    let result = gateway.handle_activate(&route_id, session_id).await;
                    addr.do_send(ActivationReply { route_id, result });
                });
            }
        }
    }
}

impl Actor for RelaySession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!("Session {} connected", self.session_id);
        self.gateway
            .handle_connect(self.session_id, ctx.address().recipient());
        self.start_heartbeat(ctx);
    }

    fn stopping(&mut self, _ctx: &mut Self::Context) -> Running {
        self.gateway.handle_disconnect(self.session_id);
        Running::Stop
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!("Session {} disconnected", self.session_id);
    }
}

/// Handler for frames pushed through the session registry
impl Handler<PushMessage> for RelaySession {
    type Result = ();

    fn handle(&mut self, msg: PushMessage, ctx: &mut Self::Context) -> Self::Result {
        // Send JSON frame to WebSocket client
        ctx.text(msg.0);
    }
}

impl Handler<ActivationReply> for RelaySession {
    type Result = ();

    fn handle(&mut self, msg: ActivationReply, ctx: &mut Self::Context) -> Self::Result {
        match msg.result {
            Ok(()) => {
                self.send_event(&ServerEvent::activation_accepted(msg.route_id), ctx);
            }
            Err(ActivateRejection::RouteAlreadyActive { .. }) => {
                self.send_event(
                    &ServerEvent::activation_rejected(
                        msg.route_id,
                        RejectReason::RouteAlreadyActive,
                    ),
                    ctx,
                );
            }
            Err(ActivateRejection::BrokerUnavailable(e)) => {
                tracing::error!(
                    "Activation failed for session {}: {}",
                    self.session_id,
                    e
                );
                self.send_event(
                    &ServerEvent::activation_rejected(
                        msg.route_id,
                        RejectReason::BrokerUnavailable,
                    ),
                    ctx,
                );
            }
            Err(ActivateRejection::SessionNotConnected(_)) => {
                // The socket is already gone; nobody is listening
                tracing::debug!(
                    "Dropping activation reply for closed session {}",
                    self.session_id
                );
            }
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for RelaySession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => {
                // Parse JSON command
                match serde_json::from_str::<ClientCommand>(&text) {
                    Ok(command) => self.handle_command(command, ctx),
                    Err(e) => {
                        tracing::warn!(
                            "Session {} sent an unreadable command: {}",
                            self.session_id,
                            e
                        );
                        self.send_event(
                            &ServerEvent::Error {
                                message: "unrecognized command".to_string(),
                            },
                            ctx,
                        );
                    }
                }
            }
            Ok(ws::Message::Binary(_)) => {
                tracing::warn!("Binary WebSocket messages not supported");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::info!("Session {} close received: {:?}", self.session_id, reason);
                ctx.close(reason);
                ctx.stop();
            }
            Ok(ws::Message::Continuation(_)) => {
                tracing::warn!("WebSocket continuation frames not supported");
            }
            Ok(ws::Message::Nop) => {}
            Err(e) => {
                tracing::error!("Session {} protocol error: {}", self.session_id, e);
                ctx.stop();
            }
        }
    }
}
