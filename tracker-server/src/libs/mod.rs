pub mod config;
pub mod envelope;
pub mod ingest;
pub mod latest;
pub mod store;

/// Time format of query parameters, in UTC.
pub const TIME_FORMAT: &'static str = "%Y-%m-%d_%H:%M:%S";

/// Number of track identifiers reported by the store statistics.
pub const STATS_TRACKS: usize = 31;
