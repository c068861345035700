use std::sync::Arc;

use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::{ClientConfig, Message};

use crate::config::{ConsumerConfig, KafkaConfig};

/// One consumed bus message: the raw payload plus the metadata the
/// pipeline and the offset store need.
pub struct InboundMessage {
    pub payload: Option<Vec<u8>>,
    pub partition: i32,
    pub offset: i64,
}

/// Consumer for the write-completed topic. Messages are delivered in
/// per-partition order; offsets are stored by hand once a message has
/// settled and committed by the background auto-commit, so commits
/// pipeline behind later messages.
#[derive(Clone)]
pub struct WriteResponseConsumer {
    inner: Arc<Inner>,
}

struct Inner {
    consumer: StreamConsumer,
    topic: String,
}

impl WriteResponseConsumer {
    pub fn new(kafka: &KafkaConfig, config: &ConsumerConfig) -> Result<Self, KafkaError> {
        let mut client_config = ClientConfig::new();
        client_config
            .set("bootstrap.servers", &kafka.kafka_hosts)
            .set("statistics.interval.ms", "10000")
            .set("group.id", &config.kafka_consumer_group)
            .set("auto.offset.reset", &config.kafka_consumer_offset_reset)
            .set("enable.auto.commit", "true")
            .set(
                "auto.commit.interval.ms",
                config.kafka_consumer_auto_commit_interval_ms.to_string(),
            )
            // Only offsets stored via mark_processed are ever committed
            .set("enable.auto.offset.store", "false");

        if kafka.kafka_tls {
            client_config
                .set("security.protocol", "ssl")
                .set("enable.ssl.certificate.verification", "false");
        };

        let consumer: StreamConsumer = client_config.create()?;
        consumer.subscribe(&[config.kafka_consumer_topic.as_str()])?;

        Ok(Self {
            inner: Arc::new(Inner {
                consumer,
                topic: config.kafka_consumer_topic.clone(),
            }),
        })
    }

    pub async fn recv(&self) -> Result<InboundMessage, KafkaError> {
        let message = self.inner.consumer.recv().await?;
        Ok(InboundMessage {
            payload: message.payload().map(|p| p.to_vec()),
            partition: message.partition(),
            offset: message.offset(),
        })
    }

    /// Mark `message` as settled. Called exactly once per consumed message,
    /// whatever the pipeline outcome was.
    pub fn mark_processed(&self, message: &InboundMessage) -> Result<(), KafkaError> {
        self.inner
            .consumer
            .store_offset(&self.inner.topic, message.partition, message.offset)
    }
}
