//! JSON document allowlist: `[{"id": "..."}, ...]`

use super::allowlist::Location;
use super::allowlist_backend::{AllowlistLoadError, AllowlistProvider};
use async_trait::async_trait;
use std::path::PathBuf;

pub struct JsonAllowlist {
    path: PathBuf,
}

impl JsonAllowlist {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Parse an allowlist document; `null` yields an empty list
    pub fn parse(json: &str) -> Result<Vec<Location>, AllowlistLoadError> {
        let locations: Option<Vec<Location>> = serde_json::from_str(json)?;
        match locations {
            Some(locations) => {
                log::trace!("{} trusted locations parsed", locations.len());
                for location in &locations {
                    log::trace!("Trusted location id: {}", location.id);
                }
                Ok(locations)
            }
            None => {
                log::error!("No trusted locations could be parsed.");
                Ok(Vec::new())
            }
        }
    }
}

#[async_trait]
impl AllowlistProvider for JsonAllowlist {
    async fn load_locations(&self) -> Result<Vec<Location>, AllowlistLoadError> {
        log::trace!("Reading allowlist from {}", self.path.display());
        let json = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            log::error!("Failed to read allowlist {}: {}", self.path.display(), e);
            AllowlistLoadError::Io(e)
        })?;

        let locations = Self::parse(&json)?;
        if locations.is_empty() {
            log::warn!("Allowlist {} contains no locations", self.path.display());
        }
        Ok(locations)
    }

    fn backend_type(&self) -> &'static str {
        "JSON"
    }
}
