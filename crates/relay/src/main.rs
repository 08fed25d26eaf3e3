/// Fleet Gateway Relay Service - Main Entry Point
///
/// Starts the relay server on port 8084
use anyhow::Context;
use fleet_gateway_core::{load_dotenv, BrokerConfig, ConfigLoader, ServiceConfig};
use fleet_gateway_relay::{init_tracing, start_server};

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize tracing
    init_tracing();

    // Server configuration
    let service = ServiceConfig::from_env().context("Invalid service configuration")?;
    service.validate().context("Invalid service configuration")?;

    let broker = BrokerConfig::from_env().context("Invalid broker configuration")?;
    broker.validate().context("Invalid broker configuration")?;

    tracing::info!(
        "🚀 Fleet Gateway Relay Service starting on {}:{}",
        service.host,
        service.port
    );

    // Start server
    start_server(&service, &broker).await
}
