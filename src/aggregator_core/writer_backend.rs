//! Report sink trait
//!
//! Defines the interface for writing the rendered report to a durable destination.

use async_trait::async_trait;

#[derive(Debug)]
pub enum ReportWriteError {
    Io(std::io::Error),
}

impl From<std::io::Error> for ReportWriteError {
    fn from(err: std::io::Error) -> Self {
        ReportWriteError::Io(err)
    }
}

impl std::fmt::Display for ReportWriteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportWriteError::Io(e) => write!(f, "Report write failed: {}", e),
        }
    }
}

impl std::error::Error for ReportWriteError {}

/// Destination for the end-of-run report
#[async_trait]
pub trait ReportSink: Send {
    /// Write the full report; the destination is flushed and closed before returning
    async fn write_report(&mut self, report: &str) -> Result<(), ReportWriteError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
