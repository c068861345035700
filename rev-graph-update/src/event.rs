use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::PipelineError;
use crate::metrics_consts::MISSING_OPTIONAL_FIELD;

/// Source identifier stamped on every write request this service emits.
pub const SOURCE: &str = "rev-graph-update";

const MSGTYPE_WRITE_RESPONSE: &str = "write-response";
const CODE_SUCCESS: &str = "success";

/// Wire form of a message on the write-completed topic. Everything is
/// optional at this layer; classification decides what is required.
#[derive(Debug, Deserialize)]
pub struct WriteResponse {
    pub msgtype: Option<String>,
    pub code: Option<String>,
    pub resource_id: Option<String>,
    pub new_revision: Option<Value>,
    pub user_id: Option<String>,
    pub auth_id: Option<String>,
    pub connection_id: Option<String>,
}

/// A write-response that passed classification, carrying everything
/// fan-out needs.
#[derive(Debug, Clone)]
pub struct WriteCompletedEvent {
    pub resource_id: String,
    pub new_revision: Value,
    pub user_id: Option<String>,
    pub auth_id: Option<String>,
    pub connection_id: Option<String>,
    pub partition: i32,
    pub offset: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a write-response message at all.
    NotWriteResponse,
    /// A write-response, but the write did not succeed.
    NotSuccess,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::NotWriteResponse => "not_write_response",
            SkipReason::NotSuccess => "not_success",
        }
    }
}

#[derive(Debug)]
pub enum Classified {
    Applicable(WriteCompletedEvent),
    Skip(SkipReason),
}

/// Classify a raw payload once, at the pipeline boundary. Later stages
/// never re-check `msgtype` or `code`.
pub fn classify(payload: &[u8], partition: i32, offset: i64) -> Result<Classified, PipelineError> {
    let raw: WriteResponse = serde_json::from_slice(payload)?;

    if raw.msgtype.as_deref() != Some(MSGTYPE_WRITE_RESPONSE) {
        return Ok(Classified::Skip(SkipReason::NotWriteResponse));
    }
    if raw.code.as_deref() != Some(CODE_SUCCESS) {
        return Ok(Classified::Skip(SkipReason::NotSuccess));
    }

    let Some(resource_id) = raw.resource_id else {
        return Err(PipelineError::InvalidEvent("resource_id"));
    };
    let Some(new_revision) = raw.new_revision else {
        return Err(PipelineError::InvalidEvent("new_revision"));
    };

    // Absent identities are propagated as absent, not rejected
    for (field, value) in [("user_id", &raw.user_id), ("auth_id", &raw.auth_id)] {
        if value.is_none() {
            warn!(resource_id = %resource_id, "write-response has no {field}");
            metrics::counter!(MISSING_OPTIONAL_FIELD, &[("field", field)]).increment(1);
        }
    }

    Ok(Classified::Applicable(WriteCompletedEvent {
        resource_id,
        new_revision,
        user_id: raw.user_id,
        auth_id: raw.auth_id,
        connection_id: raw.connection_id,
        partition,
        offset,
    }))
}

/// A parent resource and the path at which it references the child,
/// as returned by the graph store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParentEdge {
    pub resource_id: String,
    pub path: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
}

/// Instruction for a parent to update its stored revision pointer,
/// published to the write-request topic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WriteRequestedEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub resource_id: String,
    pub path_leftover: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_id: Option<String>,
    #[serde(rename = "contentType")]
    pub content_type: String,
    pub body: Value,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_id: Option<String>,
    pub resp_partition: i32,
    pub source: String,
}

impl WriteRequestedEvent {
    /// Build the revision-pointer update for one parent edge.
    pub fn for_parent(edge: &ParentEdge, origin: &WriteCompletedEvent) -> Self {
        WriteRequestedEvent {
            event_type: "write_request".to_string(),
            resource_id: edge.resource_id.clone(),
            path_leftover: format!("{}/_rev", edge.path),
            connection_id: origin.connection_id.clone(),
            content_type: edge.content_type.clone(),
            body: origin.new_revision.clone(),
            // Reserved for downstream resolution
            url: String::new(),
            user_id: origin.user_id.clone(),
            auth_id: origin.auth_id.clone(),
            resp_partition: origin.partition,
            source: SOURCE.to_string(),
        }
    }
}
