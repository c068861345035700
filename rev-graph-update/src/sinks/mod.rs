use async_trait::async_trait;
use tracing::info;

use crate::error::PublishError;
use crate::event::WriteRequestedEvent;

pub mod kafka;

/// Outbound channel for the write requests produced by fan-out.
#[async_trait]
pub trait UpdateSink {
    /// Attempt to publish every update, returning one result per update in
    /// input order. An individual failure never stops the remaining sends
    /// from being attempted.
    async fn publish_all(
        &self,
        updates: Vec<WriteRequestedEvent>,
    ) -> Vec<Result<(), PublishError>>;
}

/// Logs write requests instead of producing them. For local development.
pub struct PrintSink;

#[async_trait]
impl UpdateSink for PrintSink {
    async fn publish_all(
        &self,
        updates: Vec<WriteRequestedEvent>,
    ) -> Vec<Result<(), PublishError>> {
        for update in &updates {
            info!("write request: {update:?}");
        }
        updates.iter().map(|_| Ok(())).collect()
    }
}
