use envconfig::Envconfig;
use url::Url;

#[derive(Envconfig, Clone)]
pub struct Config {
    #[envconfig(from = "BIND_HOST", default = "::")]
    pub host: String,

    #[envconfig(from = "BIND_PORT", default = "3301")]
    pub port: u16,

    #[envconfig(nested = true)]
    pub kafka: KafkaConfig,

    #[envconfig(nested = true)]
    pub consumer: ConsumerConfig,

    #[envconfig(default = "write_request")]
    pub kafka_write_request_topic: String,

    // All fan-out updates share one record key, so they land on a single
    // partition of the write-request topic.
    #[envconfig(default = "rev-graph-update")]
    pub kafka_partition_key: String,

    #[envconfig(default = "http://localhost:8529")]
    pub graph_store_url: Url,

    #[envconfig(default = "10000")]
    pub graph_store_timeout_ms: u64,

    // Log write requests instead of producing them, for local development
    #[envconfig(default = "false")]
    pub print_sink: bool,
}

#[derive(Envconfig, Clone)]
pub struct KafkaConfig {
    #[envconfig(default = "20")]
    pub kafka_producer_linger_ms: u32, // Maximum time between producer batches during low traffic

    #[envconfig(default = "400")]
    pub kafka_producer_queue_mib: u32, // Size of the in-memory producer queue in mebibytes

    #[envconfig(default = "20000")]
    pub kafka_message_timeout_ms: u32, // Time before we stop retrying producing a message: 20 seconds

    #[envconfig(default = "none")]
    pub kafka_compression_codec: String, // none, gzip, snappy, lz4, zstd

    #[envconfig(default = "false")]
    pub kafka_tls: bool,

    #[envconfig(default = "localhost:9092")]
    pub kafka_hosts: String,
}

#[derive(Envconfig, Clone)]
pub struct ConsumerConfig {
    #[envconfig(default = "rev-graph-update")]
    pub kafka_consumer_group: String,

    #[envconfig(default = "http_response")]
    pub kafka_consumer_topic: String,

    // New consumer groups pick up at the head of the topic instead of
    // replaying the backlog.
    #[envconfig(default = "latest")]
    pub kafka_consumer_offset_reset: String, // earliest, latest

    // Interval between background commits of stored offsets
    #[envconfig(default = "5000")]
    pub kafka_consumer_auto_commit_interval_ms: i32,
}
