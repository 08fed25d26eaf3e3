/// Kafka position feed
///
/// Consumes position reports from the position topic and hands each one to
/// the gateway. One report is fully processed before the next is read, so
/// delivery to a session preserves the topic's per-route order.
use rdkafka::config::ClientConfig;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::Message;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use fleet_gateway_core::BrokerConfig;

use crate::broker::BrokerError;
use crate::gateway::RelayGateway;
use crate::messages::PositionReport;

/// Pause after a receive error before the next attempt
const RECEIVE_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Streaming consumer of position reports
pub struct PositionFeed {
    consumer: StreamConsumer,
    gateway: Arc<RelayGateway>,
    running: AtomicBool,
}

impl PositionFeed {
    /// Create a consumer subscribed to the position topic
    pub fn new(config: &BrokerConfig, gateway: Arc<RelayGateway>) -> Result<Self, BrokerError> {
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("group.id", &config.consumer_group)
            .set("session.timeout.ms", "6000")
            .set("enable.auto.commit", "true")
            .set("auto.offset.reset", "latest")
            .create()
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        consumer
            .subscribe(&[config.position_topic.as_str()])
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        Ok(Self {
            consumer,
            gateway,
            running: AtomicBool::new(false),
        })
    }

    /// Consume reports until [`stop`](Self::stop) is called
    ///
    /// Receive errors are logged and retried after a pause. Malformed
    /// payloads are discarded. The loop never exits on its own.
    pub async fn run(&self) {
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Position feed started");

        while self.running.load(Ordering::SeqCst) {
            match self.consumer.recv().await {
                Ok(message) => {
                    let Some(payload) = message.payload() else {
                        tracing::warn!("Discarding position record without payload");
                        continue;
                    };

                    match parse_report(payload) {
                        Ok(report) => self.gateway.handle_position_update(report).await,
                        Err(e) => {
                            tracing::warn!("Discarding malformed position record: {}", e);
                        }
                    }
                }
                Err(e) => {
                    tracing::error!("Position feed receive error: {}", e);
                    tokio::time::sleep(RECEIVE_RETRY_DELAY).await;
                }
            }
        }

        tracing::info!("Position feed stopped");
    }

    /// Ask the run loop to exit after the in-flight receive
    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Decode a position report payload
fn parse_report(payload: &[u8]) -> Result<PositionReport, serde_json::Error> {
    serde_json::from_slice(payload)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::activation::ActivationTable;
    use crate::broker::NoOpActivationProducer;
    use crate::ws::SessionRegistry;

    #[test]
    fn test_parse_report() {
        let payload = br#"{"routeId":"line-42","position":[44.8,20.5],"finished":false}"#;

        let report = parse_report(payload).unwrap();
        assert_eq!(report.route_id, "line-42");
        assert_eq!(report.position, Some([44.8, 20.5]));
        assert!(!report.finished);
    }

    #[test]
    fn test_parse_report_tolerates_legacy_client_id() {
        let payload = br#"{"clientId":"veh-7","routeId":"line-42","finished":true}"#;

        let report = parse_report(payload).unwrap();
        assert_eq!(report.route_id, "line-42");
        assert_eq!(report.position, None);
        assert!(report.finished);
    }

    #[test]
    fn test_parse_report_rejects_malformed_payload() {
        assert!(parse_report(b"not json").is_err());
        assert!(parse_report(br#"{"position":[1.0,2.0]}"#).is_err());
    }

    #[tokio::test]
    async fn test_feed_creation_without_broker() {
        // Consumer creation is lazy; no broker needs to be running
        let registry = Arc::new(SessionRegistry::new());
        let table = Arc::new(ActivationTable::new());
        let gateway = Arc::new(RelayGateway::new(
            registry,
            table,
            Arc::new(NoOpActivationProducer),
        ));

        let feed = PositionFeed::new(&BrokerConfig::default(), gateway);
        assert!(feed.is_ok());
    }
}
