use std::time::Duration;

use async_trait::async_trait;
use health::HealthHandle;
use rdkafka::error::KafkaError;
use rdkafka::producer::{DeliveryFuture, FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use rdkafka::ClientConfig;
use tracing::{debug, info};

use crate::config::KafkaConfig;
use crate::error::PublishError;
use crate::event::WriteRequestedEvent;
use crate::sinks::UpdateSink;

pub struct KafkaContext {
    liveness: HealthHandle,
}

impl rdkafka::ClientContext for KafkaContext {
    fn stats(&self, _: rdkafka::Statistics) {
        // The main rdkafka loop is alive and calling us
        self.liveness.report_healthy();
    }
}

/// Producer for the write-request topic.
pub struct KafkaSink {
    producer: FutureProducer<KafkaContext>,
    topic: String,
    partition_key: String,
}

impl KafkaSink {
    pub fn new(
        config: &KafkaConfig,
        topic: String,
        partition_key: String,
        liveness: HealthHandle,
    ) -> anyhow::Result<KafkaSink> {
        info!("connecting to Kafka brokers at {}...", config.kafka_hosts);

        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &config.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("linger.ms", config.kafka_producer_linger_ms.to_string())
            .set(
                "message.timeout.ms",
                config.kafka_message_timeout_ms.to_string(),
            )
            .set(
                "compression.codec",
                config.kafka_compression_codec.to_owned(),
            )
            .set(
                "queue.buffering.max.kbytes",
                (config.kafka_producer_queue_mib * 1024).to_string(),
            );

        if config.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        debug!("rdkafka configuration: {:?}", client_config);
        let producer: FutureProducer<KafkaContext> =
            client_config.create_with_context(KafkaContext { liveness })?;

        // Ping the cluster to make sure we can reach brokers
        let _metadata = producer
            .client()
            .fetch_metadata(None, Timeout::After(Duration::from_secs(15)))?;
        info!("connected to Kafka brokers");

        Ok(KafkaSink {
            producer,
            topic,
            partition_key,
        })
    }

    /// Drain the producer queue, e.g. before shutdown.
    pub fn flush(&self, timeout: Duration) -> Result<(), KafkaError> {
        self.producer.flush(timeout)
    }

    fn enqueue(&self, update: &WriteRequestedEvent) -> Result<DeliveryFuture, PublishError> {
        let payload = serde_json::to_string(update)?;

        match self.producer.send_result(FutureRecord {
            topic: self.topic.as_str(),
            payload: Some(&payload),
            partition: None,
            key: Some(self.partition_key.as_str()),
            timestamp: None,
            headers: None,
        }) {
            Ok(ack) => Ok(ack),
            Err((error, _)) => Err(PublishError::KafkaError(error)),
        }
    }

    async fn await_ack(ack: DeliveryFuture) -> Result<(), PublishError> {
        match ack.await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err((error, _))) => Err(PublishError::KafkaError(error)),
            // Cancelled due to timeout while retrying
            Err(_) => Err(PublishError::Canceled),
        }
    }
}

#[async_trait]
impl UpdateSink for KafkaSink {
    async fn publish_all(
        &self,
        updates: Vec<WriteRequestedEvent>,
    ) -> Vec<Result<(), PublishError>> {
        // Queue every update before awaiting any ack, so a slow or failed
        // delivery does not hold back the remaining sends.
        let mut results = Vec::with_capacity(updates.len());
        let mut pending = Vec::with_capacity(updates.len());

        for (index, update) in updates.iter().enumerate() {
            match self.enqueue(update) {
                Ok(ack) => pending.push((index, ack)),
                Err(error) => results.push((index, Err(error))),
            }
        }

        for (index, ack) in pending {
            results.push((index, Self::await_ack(ack).await));
        }

        // Return in input order
        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }
}
