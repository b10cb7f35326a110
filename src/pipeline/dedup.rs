//! Duplicate suppression for at-least-once delivery
//!
//! A sensor event is identified by its business key `(location_id, event_id)`.
//! Redeliveries carry a fresh delivery id but the same business key, so the
//! delivery id plays no part here.
//!
//! Scaling constraint: keys are never evicted. Memory grows with the number of
//! distinct events seen during the run, which is fine for a bounded run but a
//! long-running service would need TTL or windowed eviction.

use crate::aggregator_core::normalizer::SensorReading;
use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DedupKey {
    pub location_id: String,
    pub event_id: String,
}

impl From<&SensorReading> for DedupKey {
    fn from(reading: &SensorReading) -> Self {
        Self {
            location_id: reading.location_id.clone(),
            event_id: reading.event_id.clone(),
        }
    }
}

#[derive(Debug, Default)]
pub struct DeduplicationStore {
    seen: Mutex<HashSet<DedupKey>>,
}

impl DeduplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the event is new, false for a duplicate
    ///
    /// Check and insert happen under one lock, so two concurrent admissions of
    /// the same key can never both succeed.
    pub fn admit(&self, reading: &SensorReading) -> bool {
        let key = DedupKey::from(reading);
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }

    /// Number of distinct keys held; grows for the whole run
    pub fn tracked_keys(&self) -> usize {
        self.seen.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
