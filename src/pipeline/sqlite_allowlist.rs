//! SQLite allowlist reader
//!
//! Reads location ids from the `trusted_locations` table:
//!
//! ```sql
//! CREATE TABLE trusted_locations (
//!     id          TEXT PRIMARY KEY,
//!     position    INTEGER,
//!     added_at    INTEGER
//! )
//! ```
//!
//! Rows come back ordered by `position` (NULLs last), then by `rowid`, which
//! fixes the report's column order.

use super::allowlist::Location;
use super::allowlist_backend::{AllowlistLoadError, AllowlistProvider};
use async_trait::async_trait;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::PathBuf;

pub const ALLOWLIST_TABLE: &str = "trusted_locations";

pub struct SqliteAllowlist {
    db_path: PathBuf,
}

impl SqliteAllowlist {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    fn read_locations(&self) -> Result<Vec<Location>, AllowlistLoadError> {
        // Read-only: a missing database file must fail, not be created empty
        let conn = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)?;

        let table_exists: bool = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type='table' AND name=?",
                [ALLOWLIST_TABLE],
                |_| Ok(true),
            )
            .optional()?
            .unwrap_or(false);

        if !table_exists {
            return Err(AllowlistLoadError::MissingTable(ALLOWLIST_TABLE.to_string()));
        }

        let mut stmt = conn.prepare(
            "SELECT id FROM trusted_locations
             ORDER BY position IS NULL, position, rowid",
        )?;
        let locations = stmt
            .query_map([], |row| Ok(Location { id: row.get(0)? }))?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(locations)
    }
}

#[async_trait]
impl AllowlistProvider for SqliteAllowlist {
    async fn load_locations(&self) -> Result<Vec<Location>, AllowlistLoadError> {
        log::trace!("Reading allowlist from {}", self.db_path.display());
        let locations = self.read_locations().map_err(|e| {
            log::error!("Failed to read allowlist {}: {}", self.db_path.display(), e);
            e
        })?;

        if locations.is_empty() {
            log::warn!(
                "Allowlist table {} in {} has no rows",
                ALLOWLIST_TABLE,
                self.db_path.display()
            );
        }
        Ok(locations)
    }

    fn backend_type(&self) -> &'static str {
        "SQLite"
    }
}
