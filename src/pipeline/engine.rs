//! Pipeline Engine - per-message orchestration
//!
//! ```text
//! raw payload
//!     ↓
//! decode()                 → Malformed   (decode_errors += 1)
//!     ↓
//! LocationTrustFilter      → Untrusted   (untrusted += 1, not an error)
//!     ↓
//! DeduplicationStore       → Duplicate   (duplicates += 1)
//!     ↓
//! TimeBucketAggregator     → Accepted    (accepted += 1)
//!                          → AggregationFailed (aggregation_errors += 1)
//! ```
//!
//! All state is owned by the engine and constructed once at startup.
//! `handle` takes `&self`: the dedup store and the aggregator synchronize
//! internally and the counters are atomics, so an `Arc<PipelineEngine>` can
//! be shared by several consumers.

use super::allowlist::LocationTrustFilter;
use super::dedup::DeduplicationStore;
use crate::aggregator_core::normalizer::decode;
use crate::aggregator_core::report;
use crate::aggregator_core::window::{BucketWidth, TimeBucketAggregator};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// What happened to a single payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Accepted,
    Duplicate,
    Untrusted,
    Malformed,
    /// Admitted but could not be folded into its bucket
    AggregationFailed,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    pub accepted: u64,
    pub duplicates: u64,
    pub untrusted: u64,
    /// Subset of `untrusted` dropped because the allowlist was empty
    pub untrusted_fail_closed: u64,
    pub decode_errors: u64,
    pub aggregation_errors: u64,
}

impl RunStats {
    pub fn total_handled(&self) -> u64 {
        self.accepted + self.duplicates + self.untrusted + self.decode_errors + self.aggregation_errors
    }
}

impl std::fmt::Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Events list contained {} messages.", self.accepted)?;
        writeln!(f, "Eliminated {} duplicates.", self.duplicates)?;
        write!(f, "Discarded {} readings from untrusted locations", self.untrusted)?;
        if self.untrusted_fail_closed > 0 {
            write!(f, " ({} with an empty allowlist)", self.untrusted_fail_closed)?;
        }
        writeln!(f, ".")?;
        write!(f, "Encountered {} errors.", self.decode_errors)?;
        if self.aggregation_errors > 0 {
            write!(f, "\nFailed to aggregate {} readings.", self.aggregation_errors)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Counters {
    accepted: AtomicU64,
    duplicates: AtomicU64,
    untrusted: AtomicU64,
    untrusted_fail_closed: AtomicU64,
    decode_errors: AtomicU64,
    aggregation_errors: AtomicU64,
}

pub struct PipelineEngine {
    trust: LocationTrustFilter,
    dedup: DeduplicationStore,
    aggregator: TimeBucketAggregator,
    counters: Counters,
    fail_closed_reported: AtomicBool,
}

impl PipelineEngine {
    pub fn new(trust: LocationTrustFilter, bucket_width: BucketWidth) -> Self {
        if trust.is_fail_closed() {
            log::warn!("⚠️  Pipeline starting with an empty allowlist: no reading will be accepted");
        }

        Self {
            trust,
            dedup: DeduplicationStore::new(),
            aggregator: TimeBucketAggregator::new(bucket_width),
            counters: Counters::default(),
            fail_closed_reported: AtomicBool::new(false),
        }
    }

    /// Run one raw payload through decode → trust → dedup → aggregate
    pub fn handle(&self, raw: &str) -> HandleOutcome {
        log::trace!("Decoding message body: {}", raw);

        let envelope = match decode(raw) {
            Ok(envelope) => envelope,
            Err(e) => {
                self.counters.decode_errors.fetch_add(1, Ordering::Relaxed);
                log::warn!("Unable to decode message body ({}): {}", e, raw);
                return HandleOutcome::Malformed;
            }
        };

        let reading = &envelope.reading;

        if !self.trust.is_trusted(&reading.location_id) {
            self.counters.untrusted.fetch_add(1, Ordering::Relaxed);
            if self.trust.is_fail_closed() {
                self.counters.untrusted_fail_closed.fetch_add(1, Ordering::Relaxed);
                if !self.fail_closed_reported.swap(true, Ordering::Relaxed) {
                    log::warn!(
                        "⚠️  Dropping readings because the allowlist is empty (first: {})",
                        reading.location_id
                    );
                }
            }
            log::trace!("Untrusted location {}, discarded", reading.location_id);
            return HandleOutcome::Untrusted;
        }

        if !self.dedup.admit(reading) {
            self.counters.duplicates.fetch_add(1, Ordering::Relaxed);
            log::debug!("Duplicate message detected: {}", envelope);
            return HandleOutcome::Duplicate;
        }

        if let Err(e) = self.aggregator.add(reading) {
            self.counters.aggregation_errors.fetch_add(1, Ordering::Relaxed);
            log::error!("❌ Reading not aggregated ({}): {}", e, envelope);
            return HandleOutcome::AggregationFailed;
        }
        self.counters.accepted.fetch_add(1, Ordering::Relaxed);
        log::debug!("Reading recorded: {}", envelope);
        HandleOutcome::Accepted
    }

    pub fn stats(&self) -> RunStats {
        RunStats {
            accepted: self.counters.accepted.load(Ordering::Relaxed),
            duplicates: self.counters.duplicates.load(Ordering::Relaxed),
            untrusted: self.counters.untrusted.load(Ordering::Relaxed),
            untrusted_fail_closed: self.counters.untrusted_fail_closed.load(Ordering::Relaxed),
            decode_errors: self.counters.decode_errors.load(Ordering::Relaxed),
            aggregation_errors: self.counters.aggregation_errors.load(Ordering::Relaxed),
        }
    }

    pub fn aggregator(&self) -> &TimeBucketAggregator {
        &self.aggregator
    }

    pub fn dedup(&self) -> &DeduplicationStore {
        &self.dedup
    }

    /// Render the CSV report from the current aggregator state
    pub fn report(&self) -> String {
        let table = self.aggregator.table();
        report::render(self.trust.locations(), table.labels(), |location, label| {
            table.mean(location, label)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::allowlist::Location;
    use chrono::DateTime;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const NINE_AM: i64 = 1_760_778_000_000; // 2025-10-18 09:00:00 UTC

    fn message(delivery: &str, location: &str, event: &str, value: &str, timestamp: i64) -> String {
        let inner = format!(
            r#"{{"locationId":"{}","eventId":"{}","value":{},"timestamp":{}}}"#,
            location, event, value, timestamp
        );
        serde_json::json!({
            "Type": "Notification",
            "MessageId": delivery,
            "TopicArn": "arn:aws:sns:eu-west-1:552908040772:sensor-data",
            "Message": inner,
            "Timestamp": "2025-10-18T09:00:05.000Z"
        })
        .to_string()
    }

    fn engine(ids: &[&str]) -> PipelineEngine {
        let locations = ids.iter().map(|id| Location::new(*id)).collect();
        PipelineEngine::new(LocationTrustFilter::new(locations), BucketWidth::Minute)
    }

    fn nine_am() -> DateTime<chrono::Utc> {
        DateTime::from_timestamp_millis(NINE_AM).unwrap()
    }

    #[test]
    fn test_accepts_trusted_reading() {
        let engine = engine(&["L1"]);
        let outcome = engine.handle(&message("d1", "L1", "e1", "12.5", NINE_AM));

        assert_eq!(outcome, HandleOutcome::Accepted);
        assert_eq!(engine.stats().accepted, 1);
        let metrics = engine.aggregator().get_metrics("L1", nine_am()).unwrap();
        assert_eq!(metrics.count, 1);
        assert_eq!(metrics.sum, Decimal::from_str("12.5").unwrap());
    }

    #[test]
    fn test_redelivery_leaves_aggregate_unchanged() {
        let engine = engine(&["L1"]);
        engine.handle(&message("d1", "L1", "e1", "4.0", NINE_AM));
        let before = engine.aggregator().get_metrics("L1", nine_am()).unwrap();

        // Different delivery id, same business key
        let outcome = engine.handle(&message("d2", "L1", "e1", "4.0", NINE_AM));

        assert_eq!(outcome, HandleOutcome::Duplicate);
        assert_eq!(engine.aggregator().get_metrics("L1", nine_am()).unwrap(), before);
        assert_eq!(engine.stats().duplicates, 1);
        assert_eq!(engine.stats().accepted, 1);
        assert_eq!(engine.dedup().tracked_keys(), 1);
    }

    #[test]
    fn test_untrusted_is_not_an_error() {
        let engine = engine(&["L1"]);
        let outcome = engine.handle(&message("d1", "L9", "e1", "1.0", NINE_AM));

        assert_eq!(outcome, HandleOutcome::Untrusted);
        assert_eq!(engine.aggregator().bucket_count(), 0);
        let stats = engine.stats();
        assert_eq!(stats.untrusted, 1);
        assert_eq!(stats.untrusted_fail_closed, 0);
        assert_eq!(stats.decode_errors, 0);
    }

    #[test]
    fn test_malformed_counts_exactly_once() {
        let engine = engine(&["L1"]);
        engine.handle(&message("d1", "L1", "e1", "1.0", NINE_AM));

        let outcome = engine.handle(r#"{"MessageId": 42}"#);

        assert_eq!(outcome, HandleOutcome::Malformed);
        assert_eq!(engine.stats().decode_errors, 1);
        assert_eq!(engine.aggregator().get_metrics("L1", nine_am()).unwrap().count, 1);
    }

    #[test]
    fn test_empty_allowlist_is_distinguishable() {
        let engine = engine(&[]);
        engine.handle(&message("d1", "L1", "e1", "1.0", NINE_AM));
        engine.handle(&message("d2", "L2", "e2", "1.0", NINE_AM));

        let stats = engine.stats();
        assert_eq!(stats.untrusted, 2);
        assert_eq!(stats.untrusted_fail_closed, 2);
        assert!(stats.to_string().contains("with an empty allowlist"));
    }

    #[test]
    fn test_report_from_engine() {
        let engine = engine(&["L1", "L2"]);
        engine.handle(&message("d1", "L1", "a", "10.0", NINE_AM + 5_000));
        engine.handle(&message("d2", "L1", "b", "20.0", NINE_AM + 15_000));
        engine.handle(&message("d3", "L1", "c", "30.0", NINE_AM + 25_000));
        engine.handle(&message("d4", "L1", "d", "7.5", NINE_AM + 60_000));
        engine.handle(&message("d5", "L2", "e", "2", NINE_AM));

        assert_eq!(
            engine.report(),
            "Date,L1,L2\n2025-10-18 09:00,20.0,2\n2025-10-18 09:01,7.5,\n"
        );
    }

    #[test]
    fn test_stats_display() {
        let stats = RunStats {
            accepted: 3,
            duplicates: 1,
            untrusted: 2,
            untrusted_fail_closed: 0,
            decode_errors: 4,
            aggregation_errors: 0,
        };

        assert_eq!(stats.total_handled(), 10);
        assert_eq!(
            stats.to_string(),
            "Events list contained 3 messages.\n\
             Eliminated 1 duplicates.\n\
             Discarded 2 readings from untrusted locations.\n\
             Encountered 4 errors."
        );
    }

    #[test]
    fn test_overflowing_reading_is_not_counted_as_accepted() {
        let engine = engine(&["L1"]);
        let huge = "50000000000000000000000000000";

        assert_eq!(engine.handle(&message("d1", "L1", "e1", huge, NINE_AM)), HandleOutcome::Accepted);
        assert_eq!(
            engine.handle(&message("d2", "L1", "e2", huge, NINE_AM)),
            HandleOutcome::AggregationFailed
        );

        let stats = engine.stats();
        assert_eq!(stats.accepted, 1);
        assert_eq!(stats.aggregation_errors, 1);
        assert_eq!(stats.total_handled(), 2);
        assert!(stats.to_string().ends_with("Failed to aggregate 1 readings."));
        assert_eq!(engine.aggregator().get_metrics("L1", nine_am()).unwrap().count, 1);
    }
}
