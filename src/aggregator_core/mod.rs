//! Aggregator Core - decoding, bucketing and reporting
//!
//! # Architecture
//!
//! ```text
//! raw body → decode() → SensorReading
//!     ↓
//! TimeBucketAggregator (truncate to BucketWidth, running sum + count)
//!     ↓
//! BucketTable (sorted labels, means)
//!     ↓
//! report::render → ReportSink → CSV file
//! ```

pub mod csv_writer;
pub mod normalizer;
pub mod report;
pub mod window;
pub mod writer_backend;

pub use csv_writer::CsvReportWriter;
pub use normalizer::{decode, DecodeError, Envelope, SensorReading};
pub use window::{
    AggregateError, BucketMetrics, BucketTable, BucketWidth, TimeBucketAggregator, TimeBucketKey,
};
pub use writer_backend::{ReportSink, ReportWriteError};
