//! # Sensor Pipeline
//!
//! Turns raw queue messages into per-location, per-bucket averages.
//!
//! ```text
//! MessageSource (ChannelQueue | TailQueue)
//!     ↓
//! start_pipeline_ingestion (receive → handle → delete)
//!     ↓
//! PipelineEngine
//!     ├─ decode           (aggregator_core::normalizer)
//!     ├─ LocationTrustFilter
//!     ├─ DeduplicationStore
//!     └─ TimeBucketAggregator (aggregator_core::window)
//!     ↓
//! report::render → ReportSink (CsvReportWriter)
//! ```
//!
//! The allowlist is loaded once at startup from a JSON document or a SQLite
//! table (`AllowlistSource`). An allowlist that loads but holds no locations
//! keeps the pipeline running and drops every reading.

pub mod allowlist;
pub mod allowlist_backend;
pub mod allowlist_source;
pub mod dedup;
pub mod engine;
pub mod ingestion;
pub mod json_allowlist;
pub mod sqlite_allowlist;

pub use allowlist::{Location, LocationTrustFilter};
pub use allowlist_backend::{AllowlistLoadError, AllowlistProvider};
pub use allowlist_source::AllowlistSource;
pub use dedup::{DedupKey, DeduplicationStore};
pub use engine::{HandleOutcome, PipelineEngine, RunStats};
pub use ingestion::{start_pipeline_ingestion, IngestionSettings};
pub use json_allowlist::JsonAllowlist;
pub use sqlite_allowlist::SqliteAllowlist;
