/// Actix-web HTTP server for the relay service
///
/// Port: 8084
/// Endpoints:
/// - GET /health - Health check
/// - GET /stats - Session and relay counters
/// - WebSocket /ws - Vehicle tracking connection
/// - GET /routes - Route catalog listing
/// - GET /routes/{route_id} - Single route lookup
use actix_web::{get, web, App, HttpRequest, HttpResponse, HttpServer, Responder, Result};
use actix_web_actors::ws;
use anyhow::Context;
use std::sync::Arc;

use fleet_gateway_core::{BrokerConfig, ConfigLoader, DatabaseConfig, DatabasePool, ServiceConfig};

use crate::activation::ActivationTable;
use crate::broker::{ActivationProducer, KafkaActivationProducer};
use crate::catalog::{InMemoryRouteCatalog, PostgresRouteCatalog, RouteCatalog};
use crate::feed::PositionFeed;
use crate::gateway::RelayGateway;
use crate::websocket::RelaySession;
use crate::ws::SessionRegistry;

/// Server state shared across handlers
pub struct ServerState {
    /// Session registry
    pub registry: Arc<SessionRegistry>,

    /// Route activation table
    pub table: Arc<ActivationTable>,

    /// Relay gateway
    pub gateway: Arc<RelayGateway>,

    /// Route catalog
    pub catalog: Arc<dyn RouteCatalog>,
}

impl ServerState {
    pub fn new(producer: Arc<dyn ActivationProducer>, catalog: Arc<dyn RouteCatalog>) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let table = Arc::new(ActivationTable::new());
        let gateway = Arc::new(RelayGateway::new(
            registry.clone(),
            table.clone(),
            producer,
        ));

        Self {
            registry,
            table,
            gateway,
            catalog,
        }
    }
}

/// Health check endpoint
#[get("/health")]
async fn health_check() -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "status": "healthy",
        "service": "fleet-gateway-relay",
        "version": "0.1.0"
    }))
}

/// Session and relay counters
#[get("/stats")]
async fn stats(state: web::Data<ServerState>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "sessions": {
            "active": state.registry.session_count(),
            "registered_total": state.registry.registered_total(),
            "pushes_sent": state.registry.pushes_sent(),
            "pushes_failed": state.registry.pushes_failed(),
        },
        "routes": {
            "active": state.table.active_count(),
            "entries": state.table.snapshot(),
        },
        "gateway": state.gateway.stats(),
    }))
}

/// WebSocket connection endpoint
#[get("/ws")]
async fn websocket(
    req: HttpRequest,
    stream: web::Payload,
    state: web::Data<ServerState>,
) -> Result<HttpResponse> {
    let session = RelaySession::new(state.gateway.clone());
    ws::start(session, &req, stream)
}

/// Route catalog listing
#[get("/routes")]
async fn list_routes(state: web::Data<ServerState>) -> impl Responder {
    match state.catalog.list_routes().await {
        Ok(routes) => HttpResponse::Ok().json(routes),
        Err(e) => {
            tracing::error!("Failed to list routes: {}", e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "failed to list routes"
            }))
        }
    }
}

/// Single route lookup
#[get("/routes/{route_id}")]
async fn get_route(path: web::Path<String>, state: web::Data<ServerState>) -> impl Responder {
    let route_id = path.into_inner();

    match state.catalog.get_route(&route_id).await {
        Ok(Some(route)) => HttpResponse::Ok().json(route),
        Ok(None) => HttpResponse::NotFound().json(serde_json::json!({
            "error": "route not found"
        })),
        Err(e) => {
            tracing::error!("Failed to load route {}: {}", route_id, e);
            HttpResponse::InternalServerError().json(serde_json::json!({
                "error": "failed to load route"
            }))
        }
    }
}

/// Build the route catalog from the environment
///
/// PostgreSQL when a database URL is configured, otherwise the built-in
/// demo catalog.
async fn build_catalog() -> anyhow::Result<Arc<dyn RouteCatalog>> {
    let configured = std::env::var("FLEET_GATEWAY_DATABASE_URL").is_ok()
        || std::env::var("DATABASE_URL").is_ok();

    if !configured {
        tracing::info!("No database configured, using the built-in route catalog");
        return Ok(Arc::new(InMemoryRouteCatalog::with_demo_routes()));
    }

    let config = DatabaseConfig::from_env().context("Invalid database configuration")?;
    let pool = DatabasePool::new(&config)
        .await
        .context("Database connection failed")?;

    tracing::info!("Route catalog backed by PostgreSQL");
    Ok(Arc::new(PostgresRouteCatalog::new(pool.pool().clone())))
}

/// Start the relay server
pub async fn start_server(service: &ServiceConfig, broker: &BrokerConfig) -> anyhow::Result<()> {
    tracing::info!(
        "Starting Fleet Gateway Relay on {}:{}",
        service.host,
        service.port
    );

    let producer = KafkaActivationProducer::connect(broker)
        .await
        .context("Broker connection failed")?;
    let catalog = build_catalog().await?;

    let state = web::Data::new(ServerState::new(Arc::new(producer), catalog));

    let feed = Arc::new(
        PositionFeed::new(broker, state.gateway.clone()).context("Position feed setup failed")?,
    );
    {
        let feed = feed.clone();
        actix::spawn(async move {
            feed.run().await;
        });
    }

    let app_state = state.clone();
    HttpServer::new(move || {
        App::new()
            .app_data(app_state.clone())
            .service(health_check)
            .service(stats)
            .service(websocket)
            .service(list_routes)
            .service(get_route)
    })
    .workers(service.workers)
    .bind((service.host.as_str(), service.port))
    .with_context(|| format!("Failed to bind {}:{}", service.host, service.port))?
    .run()
    .await?;

    feed.stop();
    Ok(())
}
