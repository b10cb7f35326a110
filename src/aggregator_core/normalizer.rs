//! Notification decoding: outer delivery envelope, then the embedded sensor reading
//!
//! Queue messages arrive as pub/sub notifications. The sensor event itself is
//! serialized as a JSON string inside the notification's `Message` field, so a
//! payload goes through two decode passes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// A single sensor reading as reported by the device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorReading {
    pub location_id: String,
    pub event_id: String,
    pub value: Decimal,
    /// Epoch milliseconds, as embedded in the event payload
    pub timestamp_millis: i64,
}

impl SensorReading {
    /// Wall-clock time the reading was taken (UTC)
    pub fn recorded_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.timestamp_millis)
    }
}

impl std::fmt::Display for SensorReading {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.recorded_at() {
            Some(at) => write!(
                f,
                "Loc:{}, event:{} recorded {} at {}",
                self.location_id, self.event_id, self.value, at
            ),
            None => write!(
                f,
                "Loc:{}, event:{} recorded {} at {}ms",
                self.location_id, self.event_id, self.value, self.timestamp_millis
            ),
        }
    }
}

/// Delivery metadata wrapped around a sensor reading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Identifier of this delivery attempt (differs across redeliveries)
    pub delivery_id: String,
    pub topic_id: String,
    pub delivered_at: DateTime<Utc>,
    pub kind: Option<String>,
    pub reading: SensorReading,
}

impl std::fmt::Display for Envelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ID:{} received {}: {}",
            self.kind.as_deref().unwrap_or("Notification"),
            self.delivery_id,
            self.delivered_at,
            self.reading
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    Malformed(String),
}

impl std::fmt::Display for DecodeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DecodeError::Malformed(reason) => write!(f, "Malformed payload: {}", reason),
        }
    }
}

impl std::error::Error for DecodeError {}

/// Outer notification as delivered by the topic fan-out
#[derive(Debug, Deserialize)]
struct Notification {
    #[serde(rename = "Type", default)]
    kind: Option<String>,
    #[serde(rename = "MessageId")]
    message_id: String,
    #[serde(rename = "TopicArn")]
    topic_arn: String,
    #[serde(rename = "Timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "Message")]
    message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadingPayload {
    location_id: String,
    event_id: String,
    #[serde(with = "rust_decimal::serde::arbitrary_precision")]
    value: Decimal,
    timestamp: i64,
}

/// Decode a raw queue message body into an [`Envelope`]
///
/// Fails with [`DecodeError::Malformed`] if either pass fails, yields `null`,
/// or produces a reading without a usable location, event id or timestamp.
pub fn decode(raw: &str) -> Result<Envelope, DecodeError> {
    let notification: Notification = serde_json::from_str::<Option<Notification>>(raw)
        .map_err(|e| DecodeError::Malformed(format!("notification: {}", e)))?
        .ok_or_else(|| DecodeError::Malformed("notification is null".to_string()))?;

    if notification.message.trim().is_empty() {
        return Err(DecodeError::Malformed("empty Message field".to_string()));
    }

    let payload: ReadingPayload = serde_json::from_str::<Option<ReadingPayload>>(&notification.message)
        .map_err(|e| DecodeError::Malformed(format!("reading: {}", e)))?
        .ok_or_else(|| DecodeError::Malformed("reading is null".to_string()))?;

    if payload.location_id.is_empty() {
        return Err(DecodeError::Malformed("empty locationId".to_string()));
    }
    if payload.event_id.is_empty() {
        return Err(DecodeError::Malformed("empty eventId".to_string()));
    }

    let reading = SensorReading {
        location_id: payload.location_id,
        event_id: payload.event_id,
        value: payload.value,
        timestamp_millis: payload.timestamp,
    };

    if reading.recorded_at().is_none() {
        return Err(DecodeError::Malformed(format!(
            "timestamp {} out of range",
            reading.timestamp_millis
        )));
    }

    Ok(Envelope {
        delivery_id: notification.message_id,
        topic_id: notification.topic_arn,
        delivered_at: notification.timestamp,
        kind: notification.kind,
        reading,
    })
}
