//! Allowlist provider trait and its error type

use super::allowlist::Location;
use async_trait::async_trait;

#[derive(Debug)]
pub enum AllowlistLoadError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    Database(String),
    MissingTable(String),
}

impl From<std::io::Error> for AllowlistLoadError {
    fn from(err: std::io::Error) -> Self {
        AllowlistLoadError::Io(err)
    }
}

impl From<serde_json::Error> for AllowlistLoadError {
    fn from(err: serde_json::Error) -> Self {
        AllowlistLoadError::Parse(err)
    }
}

impl From<rusqlite::Error> for AllowlistLoadError {
    fn from(err: rusqlite::Error) -> Self {
        AllowlistLoadError::Database(err.to_string())
    }
}

impl std::fmt::Display for AllowlistLoadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AllowlistLoadError::Io(e) => write!(f, "Allowlist unreachable: {}", e),
            AllowlistLoadError::Parse(e) => write!(f, "Allowlist unparsable: {}", e),
            AllowlistLoadError::Database(e) => write!(f, "Allowlist database error: {}", e),
            AllowlistLoadError::MissingTable(table) => {
                write!(f, "Allowlist table not found in database: {}", table)
            }
        }
    }
}

impl std::error::Error for AllowlistLoadError {}

/// Source of the trusted-location allowlist
///
/// An empty result is not an error: implementations return `Ok(vec![])` when
/// the source holds no locations and log it as a degraded condition. An
/// unreachable or unparsable source is an error, since running with an
/// unknown trust set is unsafe.
#[async_trait]
pub trait AllowlistProvider: Send + Sync {
    async fn load_locations(&self) -> Result<Vec<Location>, AllowlistLoadError>;

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}
