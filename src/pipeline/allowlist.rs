//! Trusted-location allowlist and the membership filter built from it
//!
//! The allowlist is loaded once at startup and never mutated afterwards.
//! An empty allowlist trusts nothing (fail-closed).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A sensor location; extra fields in the source document are ignored
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
}

impl Location {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// Membership test against the loaded allowlist
///
/// Keeps the load order of locations, which becomes the report's column order.
#[derive(Debug, Clone, Default)]
pub struct LocationTrustFilter {
    locations: Vec<Location>,
    trusted: HashSet<String>,
}

impl LocationTrustFilter {
    pub fn new(locations: Vec<Location>) -> Self {
        let mut trusted = HashSet::with_capacity(locations.len());
        let mut ordered = Vec::with_capacity(locations.len());

        for location in locations {
            if trusted.insert(location.id.clone()) {
                ordered.push(location);
            } else {
                log::warn!("Duplicate trusted location id ignored: {}", location.id);
            }
        }

        if ordered.is_empty() {
            log::error!("Trusted location set is empty: every reading will be dropped");
        } else {
            log::info!("{} trusted locations loaded", ordered.len());
        }

        Self {
            locations: ordered,
            trusted,
        }
    }

    pub fn is_trusted(&self, location_id: &str) -> bool {
        self.trusted.contains(location_id)
    }

    /// True when nothing can pass the filter (allowlist missing or empty)
    pub fn is_fail_closed(&self) -> bool {
        self.trusted.is_empty()
    }

    pub fn locations(&self) -> &[Location] {
        &self.locations
    }
}
