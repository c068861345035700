use rdkafka::error::KafkaError;
use reqwest::StatusCode;
use thiserror::Error;

/// One failed message pipeline. Every variant is caught in the consumer
/// loop, logged, and settled with an offset store; none trigger redelivery.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("failed to parse message payload: {0}")]
    ParseError(#[from] serde_json::Error),

    #[error("write-response missing required field: {0}")]
    InvalidEvent(&'static str),

    #[error("parent lookup failed: {0}")]
    ResolutionError(#[from] ResolveError),

    #[error("{failed} of {attempted} write requests failed to publish")]
    PublishError { failed: usize, attempted: usize },
}

impl PipelineError {
    /// Stable label for the error counter.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::ParseError(_) => "parse",
            PipelineError::InvalidEvent(_) => "invalid_event",
            PipelineError::ResolutionError(_) => "resolution",
            PipelineError::PublishError { .. } => "publish",
        }
    }
}

#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("graph store request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("graph store returned status {0}")]
    Status(StatusCode),
}

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("failed to serialize write request: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("failed to produce write request: {0}")]
    KafkaError(#[from] KafkaError),

    #[error("producer dropped the delivery before it was acked")]
    Canceled,
}
