//! Header names exchanged with the backend

pub const ACTIVITY_ID: &str = "x-ms-activity-id";
pub const CONSISTENCY_LEVEL: &str = "x-ms-consistency-level";
pub const CONTINUATION: &str = "x-ms-continuation";
pub const DATE: &str = "x-ms-date";
pub const ETAG: &str = "etag";
pub const IF_MATCH: &str = "if-match";
pub const ITEM_COUNT: &str = "x-ms-item-count";
pub const MAX_ITEM_COUNT: &str = "x-ms-max-item-count";
pub const PARTITION_KEY: &str = "x-ms-documentdb-partitionkey";
pub const PARTITION_KEY_RANGE_ID: &str = "x-ms-documentdb-partitionkeyrangeid";
pub const REQUEST_CHARGE: &str = "x-ms-request-charge";
pub const SESSION_TOKEN: &str = "x-ms-session-token";
pub const IS_UPSERT: &str = "x-ms-documentdb-is-upsert";
pub const ENABLE_CROSS_PARTITION: &str = "x-ms-documentdb-query-enablecrosspartition";
