// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod ingest;
pub mod metrics;
pub mod store;

// ---- Re-exports for stable public API ----
pub use crate::ingest::providers::ExtractorRegistry;
pub use crate::ingest::types::{
    ExtractContext, Extractor, FetchResponse, Fetcher, MetricObservation, Snapshot, SourceConfig,
    Validators,
};
pub use crate::ingest::{Pipeline, RunReport, SourceOutcome, SourceReport};
pub use crate::store::{LatestEntry, Projection, SnapshotLog, SourceEntry, ValidatorCache};
