//! Unified allowlist source
//!
//! Routes the load to either the JSON or the SQLite provider based on configuration.

use super::allowlist::Location;
use super::allowlist_backend::{AllowlistLoadError, AllowlistProvider};
use super::json_allowlist::JsonAllowlist;
use super::sqlite_allowlist::SqliteAllowlist;
use crate::config::AllowlistBackend;
use std::path::PathBuf;

pub enum AllowlistSource {
    Json(JsonAllowlist),
    Sqlite(SqliteAllowlist),
}

impl AllowlistSource {
    pub fn new(backend: AllowlistBackend, path: PathBuf) -> Self {
        match backend {
            AllowlistBackend::Json => AllowlistSource::Json(JsonAllowlist::new(path)),
            AllowlistBackend::Sqlite => AllowlistSource::Sqlite(SqliteAllowlist::new(path)),
        }
    }

    pub async fn load_locations(&self) -> Result<Vec<Location>, AllowlistLoadError> {
        match self {
            AllowlistSource::Json(p) => p.load_locations().await,
            AllowlistSource::Sqlite(p) => p.load_locations().await,
        }
    }

    /// Get backend type for logging
    pub fn backend_type(&self) -> &'static str {
        match self {
            AllowlistSource::Json(p) => p.backend_type(),
            AllowlistSource::Sqlite(p) => p.backend_type(),
        }
    }
}
