/// Activation event publishing
///
/// Publishes route activation events to Kafka for downstream consumers
/// (dispatch tooling, analytics, the position simulator).
///
/// Events carry a fixed record key so they land on a single partition and
/// arrive in activation order.
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;

use fleet_gateway_core::{retry_with_backoff, BrokerConfig, RetryPolicy};

use crate::messages::ActivationEvent;

/// Record key for activation events
pub const ACTIVATION_EVENT_KEY: &str = "route.activation";

/// Broker failures surfaced to the gateway
#[derive(Debug, thiserror::Error)]
pub enum BrokerError {
    #[error("broker unavailable: {0}")]
    Unavailable(String),

    #[error("failed to encode activation event: {0}")]
    Encoding(#[from] serde_json::Error),
}

/// Activation event producer trait
#[async_trait::async_trait]
pub trait ActivationProducer: Send + Sync {
    async fn publish_activation(&self, event: &ActivationEvent) -> Result<(), BrokerError>;
}

/// Kafka-based activation producer
pub struct KafkaActivationProducer {
    producer: FutureProducer,
    topic: String,
    retry_policy: RetryPolicy,
}

impl KafkaActivationProducer {
    /// Create new Kafka producer
    ///
    /// Creation does not touch the network; use [`connect`](Self::connect)
    /// to verify the broker answers before serving traffic.
    pub fn new(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", &config.brokers)
            .set("message.timeout.ms", "5000")
            .set("compression.type", "snappy")
            .set("acks", "1") // Wait for leader acknowledgment only
            .create()
            .map_err(|e| BrokerError::Unavailable(e.to_string()))?;

        Ok(Self {
            producer,
            topic: config.activation_topic.clone(),
            retry_policy: RetryPolicy::gentle(),
        })
    }

    /// Create a producer and probe connectivity with bounded retries
    ///
    /// Fails once the configured retries are exhausted; startup should stop
    /// rather than accept clients it cannot publish for.
    pub async fn connect(config: &BrokerConfig) -> Result<Self, BrokerError> {
        let instance = Self::new(config)?;

        let policy = RetryPolicy::new(
            config.connect_max_retries,
            config.connect_base_delay_ms,
            30_000,
            true,
        );

        retry_with_backoff(|| instance.probe(), policy, |_: &BrokerError| true).await?;

        tracing::info!("Connected to broker at {}", config.brokers);
        Ok(instance)
    }

    /// Fetch topic metadata to confirm the broker answers
    async fn probe(&self) -> Result<(), BrokerError> {
        let producer = self.producer.clone();
        let topic = self.topic.clone();

        tokio::task::spawn_blocking(move || {
            producer
                .client()
                .fetch_metadata(Some(&topic), Duration::from_secs(5))
                .map(|_| ())
                .map_err(|e| BrokerError::Unavailable(e.to_string()))
        })
        .await
        .map_err(|e| BrokerError::Unavailable(e.to_string()))?
    }

    /// Send one payload to the activation topic
    async fn send_payload(&self, payload: &[u8]) -> Result<(), BrokerError> {
        let record = FutureRecord::to(&self.topic)
            .key(ACTIVATION_EVENT_KEY)
            .payload(payload);

        // Send with timeout
        self.producer
            .send(record, Duration::from_secs(5))
            .await
            .map(|_| ())
            .map_err(|(err, _)| BrokerError::Unavailable(err.to_string()))
    }
}

#[async_trait::async_trait]
impl ActivationProducer for KafkaActivationProducer {
    async fn publish_activation(&self, event: &ActivationEvent) -> Result<(), BrokerError> {
        let payload = serde_json::to_vec(event)?;

        retry_with_backoff(
            || self.send_payload(&payload),
            self.retry_policy.clone(),
            |e: &BrokerError| matches!(e, BrokerError::Unavailable(_)),
        )
        .await?;

        tracing::debug!(
            "Published activation event: route_id={}, session_id={}",
            event.route_id,
            event.session_id
        );

        Ok(())
    }
}

/// No-op producer for testing and broker-less development
pub struct NoOpActivationProducer;

#[async_trait::async_trait]
impl ActivationProducer for NoOpActivationProducer {
    async fn publish_activation(&self, event: &ActivationEvent) -> Result<(), BrokerError> {
        tracing::debug!(
            "NoOp producer dropping activation for route {}",
            event.route_id
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_noop_producer_accepts_events() {
        let producer = NoOpActivationProducer;
        let event = ActivationEvent {
            route_id: "line-42".to_string(),
            session_id: Uuid::new_v4(),
        };

        assert!(producer.publish_activation(&event).await.is_ok());
    }

    #[test]
    fn test_kafka_producer_creation_is_lazy() {
        // No broker is running here; creation must still succeed
        let producer = KafkaActivationProducer::new(&BrokerConfig::default());
        assert!(producer.is_ok());
    }

    #[test]
    fn test_activation_events_share_one_key() {
        assert_eq!(ACTIVATION_EVENT_KEY, "route.activation");
    }
}
