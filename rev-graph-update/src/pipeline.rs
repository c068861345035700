use tracing::{debug, error, warn};

use crate::error::PipelineError;
use crate::event::{classify, Classified, SkipReason, WriteRequestedEvent};
use crate::metrics_consts::{
    EVENTS_SKIPPED, ORPHANED_RESOURCES, PARENTS_PER_RESOURCE, PUBLISH_ERRORS, UPDATES_PUBLISHED,
};
use crate::resolver::ParentResolver;
use crate::sinks::UpdateSink;

/// How a single inbound message settled.
#[derive(Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Not a successful write-response; nothing to propagate.
    Skipped(SkipReason),
    /// The changed resource has no parents (expected only for roots).
    NoParents,
    /// One write request published per parent edge.
    Published(usize),
}

/// Run one consumed message through classify → resolve → fan out → publish.
///
/// Errors are for logging only: the caller stores the offset whether or not
/// this settles cleanly.
pub async fn process_message<R, S>(
    resolver: &R,
    sink: &S,
    payload: &[u8],
    partition: i32,
    offset: i64,
) -> Result<Outcome, PipelineError>
where
    R: ParentResolver,
    S: UpdateSink,
{
    let event = match classify(payload, partition, offset)? {
        Classified::Skip(reason) => {
            debug!(partition, offset, reason = reason.as_str(), "ignoring message");
            metrics::counter!(EVENTS_SKIPPED, &[("reason", reason.as_str())]).increment(1);
            return Ok(Outcome::Skipped(reason));
        }
        Classified::Applicable(event) => event,
    };

    debug!(
        resource_id = %event.resource_id,
        partition = event.partition,
        offset = event.offset,
        "resolving parents"
    );
    let parents = resolver.parents(&event.resource_id).await?;
    metrics::histogram!(PARENTS_PER_RESOURCE).record(parents.len() as f64);
    if parents.is_empty() {
        warn!(resource_id = %event.resource_id, "resource has no parent");
        metrics::counter!(ORPHANED_RESOURCES).increment(1);
        return Ok(Outcome::NoParents);
    }

    let updates: Vec<WriteRequestedEvent> = parents
        .iter()
        .map(|edge| WriteRequestedEvent::for_parent(edge, &event))
        .collect();

    let attempted = updates.len();
    let results = sink.publish_all(updates).await;
    let failed = results.iter().filter(|result| result.is_err()).count();
    for publish_error in results.into_iter().filter_map(Result::err) {
        error!(
            resource_id = %event.resource_id,
            "failed to publish write request: {publish_error}"
        );
    }

    metrics::counter!(UPDATES_PUBLISHED).increment((attempted - failed) as u64);
    if failed > 0 {
        metrics::counter!(PUBLISH_ERRORS).increment(failed as u64);
        return Err(PipelineError::PublishError { failed, attempted });
    }
    Ok(Outcome::Published(attempted))
}
