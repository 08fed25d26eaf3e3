/// Fleet Gateway Relay Service
///
/// Real-time route tracking relay between vehicle clients and dispatch
///
/// Features:
/// - WebSocket sessions for dispatch clients with heartbeat supervision
/// - Exclusive route activation with typed conflict reporting
/// - Kafka integration for activation events and the position feed
/// - Per-route FIFO position forwarding
/// - Route catalog backed by PostgreSQL or an in-memory store
pub mod activation;
pub mod broker;
pub mod catalog;
pub mod feed;
pub mod gateway;
pub mod messages;
pub mod server;
pub mod websocket;

// WebSocket module for session registration and pushes
pub mod ws;

pub use activation::{
    ActivationError, ActivationOutcome, ActivationTable, ActiveRoute, RouteId,
};
pub use broker::{
    ActivationProducer, BrokerError, KafkaActivationProducer, NoOpActivationProducer,
    ACTIVATION_EVENT_KEY,
};
pub use catalog::{InMemoryRouteCatalog, PostgresRouteCatalog, RouteCatalog};
pub use feed::PositionFeed;
pub use gateway::{ActivateRejection, GatewayStats, RelayGateway};
pub use messages::{
    ActivationEvent, ClientCommand, PositionReport, RejectReason, ServerEvent,
};
pub use server::{start_server, ServerState};
pub use websocket::RelaySession;

/// Initialize tracing for the relay service
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "fleet_gateway_relay=debug,actix_web=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
