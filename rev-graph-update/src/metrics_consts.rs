pub const EVENTS_RECEIVED: &str = "rev_graph_update_events_received";
pub const EVENTS_SKIPPED: &str = "rev_graph_update_events_skipped";
pub const PIPELINE_ERRORS: &str = "rev_graph_update_pipeline_errors";
pub const MISSING_OPTIONAL_FIELD: &str = "rev_graph_update_missing_optional_field";
pub const ORPHANED_RESOURCES: &str = "rev_graph_update_orphaned_resources";
pub const PARENTS_PER_RESOURCE: &str = "rev_graph_update_parents_per_resource";
pub const UPDATES_PUBLISHED: &str = "rev_graph_update_updates_published";
pub const PUBLISH_ERRORS: &str = "rev_graph_update_publish_errors";
