/// Photo ingestion announcements; keyed so that co-located photos share a
/// partition (see the sweeper's requeue keying).
pub const PHOTO_UPLOADED: &str = "photo-uploaded";

/// Event membership changes, keyed by event id.
pub const EVENT_UPDATED: &str = "event-updated";

/// Unparseable messages from either worker end up here for inspection.
pub const PHOTO_DLQ: &str = "photo-dlq";
