//! Fixed-width time bucket aggregation of sensor readings

use super::normalizer::SensorReading;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, PoisonError};

/// Rendered form of a bucket start; lexicographic order is chronological order
pub const BUCKET_LABEL_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BucketWidth {
    #[default]
    Minute,
    Min5,
    Min15,
    Hour,
}

impl BucketWidth {
    pub fn as_str(&self) -> &'static str {
        match self {
            BucketWidth::Minute => "1m",
            BucketWidth::Min5 => "5m",
            BucketWidth::Min15 => "15m",
            BucketWidth::Hour => "1h",
        }
    }

    pub fn duration_millis(&self) -> i64 {
        match self {
            BucketWidth::Minute => 60 * 1000,
            BucketWidth::Min5 => 5 * 60 * 1000,
            BucketWidth::Min15 => 15 * 60 * 1000,
            BucketWidth::Hour => 60 * 60 * 1000,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "1m" => Some(BucketWidth::Minute),
            "5m" => Some(BucketWidth::Min5),
            "15m" => Some(BucketWidth::Min15),
            "1h" => Some(BucketWidth::Hour),
            _ => None,
        }
    }

    /// Start of the bucket containing `timestamp_millis`
    pub fn truncate(&self, timestamp_millis: i64) -> Option<DateTime<Utc>> {
        let width = self.duration_millis();
        DateTime::from_timestamp_millis(timestamp_millis - timestamp_millis.rem_euclid(width))
    }
}

/// Identifies one (location, bucket) cell
///
/// Field order matters: derived `Ord` sorts by bucket start, then location.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeBucketKey {
    pub bucket_start: DateTime<Utc>,
    pub location_id: String,
}

impl TimeBucketKey {
    pub fn for_reading(reading: &SensorReading, width: BucketWidth) -> Option<Self> {
        Some(Self {
            bucket_start: width.truncate(reading.timestamp_millis)?,
            location_id: reading.location_id.clone(),
        })
    }

    pub fn label(&self) -> String {
        self.bucket_start.format(BUCKET_LABEL_FORMAT).to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AggregateError {
    /// The bucket sum would exceed the decimal range
    Overflow(String),
    TimestampOutOfRange(i64),
}

impl std::fmt::Display for AggregateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AggregateError::Overflow(location) => {
                write!(f, "Decimal overflow in bucket sum for {}", location)
            }
            AggregateError::TimestampOutOfRange(ts) => {
                write!(f, "Timestamp {}ms has no bucket", ts)
            }
        }
    }
}

impl std::error::Error for AggregateError {}

/// Running count and exact decimal sum for one bucket
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketMetrics {
    pub count: u64,
    pub sum: Decimal,
}

impl BucketMetrics {
    fn add_value(&mut self, value: Decimal) -> bool {
        match self.sum.checked_add(value) {
            Some(sum) => {
                self.sum = sum;
                self.count += 1;
                true
            }
            None => false,
        }
    }

    /// Mean over all readings, computed on read
    pub fn mean(&self) -> Option<Decimal> {
        if self.count == 0 {
            return None;
        }
        self.sum.checked_div(Decimal::from(self.count))
    }
}

/// Per-location, per-bucket running means
///
/// Internally synchronized: `add` can be called from several consumers at once
/// without losing updates.
pub struct TimeBucketAggregator {
    width: BucketWidth,
    buckets: Mutex<HashMap<TimeBucketKey, BucketMetrics>>,
}

impl TimeBucketAggregator {
    pub fn new(width: BucketWidth) -> Self {
        Self {
            width,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Fold one reading into its bucket
    ///
    /// On error the bucket is left exactly as it was.
    pub fn add(&self, reading: &SensorReading) -> Result<(), AggregateError> {
        let key = TimeBucketKey::for_reading(reading, self.width)
            .ok_or(AggregateError::TimestampOutOfRange(reading.timestamp_millis))?;

        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        match buckets.get_mut(&key) {
            Some(metrics) => {
                if !metrics.add_value(reading.value) {
                    return Err(AggregateError::Overflow(key.location_id));
                }
            }
            None => {
                buckets.insert(
                    key,
                    BucketMetrics {
                        count: 1,
                        sum: reading.value,
                    },
                );
            }
        }
        Ok(())
    }

    pub fn get_metrics(&self, location_id: &str, bucket_start: DateTime<Utc>) -> Option<BucketMetrics> {
        let key = TimeBucketKey {
            bucket_start,
            location_id: location_id.to_string(),
        };
        self.buckets
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
            .cloned()
    }

    pub fn bucket_count(&self) -> usize {
        self.buckets.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// All buckets with their means, ordered by label then location id
    pub fn snapshot(&self) -> Vec<(TimeBucketKey, Decimal)> {
        let buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(TimeBucketKey, Decimal)> = buckets
            .iter()
            .filter_map(|(key, metrics)| metrics.mean().map(|mean| (key.clone(), mean)))
            .collect();
        drop(buckets);

        entries.sort_by(|(a, _), (b, _)| a.cmp(b));
        entries
    }

    /// Snapshot reshaped for report rendering
    pub fn table(&self) -> BucketTable {
        BucketTable::from_snapshot(self.snapshot())
    }
}

/// Union of bucket labels plus a (location, label) lookup of means
#[derive(Debug, Clone, Default)]
pub struct BucketTable {
    labels: Vec<String>,
    means: HashMap<(String, String), Decimal>,
}

impl BucketTable {
    pub fn from_snapshot(snapshot: Vec<(TimeBucketKey, Decimal)>) -> Self {
        let mut labels = BTreeSet::new();
        let mut means = HashMap::with_capacity(snapshot.len());

        for (key, mean) in snapshot {
            let label = key.label();
            labels.insert(label.clone());
            means.insert((key.location_id, label), mean);
        }

        Self {
            labels: labels.into_iter().collect(),
            means,
        }
    }

    /// Every label observed for any location, ascending
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    /// `None` means no reading for this pair, which is not the same as zero
    pub fn mean(&self, location_id: &str, label: &str) -> Option<Decimal> {
        self.means
            .get(&(location_id.to_string(), label.to_string()))
            .copied()
    }
}
