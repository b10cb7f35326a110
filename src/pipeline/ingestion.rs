//! Pipeline ingestion - receive loop between the message queue and the engine
//!
//! Each iteration receives one batch, runs every message through the engine,
//! and only then acknowledges the batch. Decode failures are acknowledged too:
//! a malformed body will not decode on redelivery either.

use super::engine::PipelineEngine;
use crate::config::MonitorConfig;
use crate::streamer_core::queue::{MessageSource, SourceError};
use std::time::Duration;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct IngestionSettings {
    pub max_messages: usize,
    pub wait: Duration,
    /// Log the approximate queue size every N iterations
    pub queue_size_log_every: u64,
    pub receive_error_pause: Duration,
}

impl From<&MonitorConfig> for IngestionSettings {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            max_messages: config.max_messages,
            wait: config.wait_time,
            queue_size_log_every: config.queue_size_log_every.max(1),
            receive_error_pause: config.receive_error_pause,
        }
    }
}

/// Run the receive loop until `shutdown` flips to `true` or the source closes
///
/// Returns the number of messages handled.
pub async fn start_pipeline_ingestion<S>(
    source: &mut S,
    engine: &PipelineEngine,
    settings: &IngestionSettings,
    mut shutdown: watch::Receiver<bool>,
) -> u64
where
    S: MessageSource + ?Sized,
{
    log::info!("🚀 Starting pipeline ingestion");
    log::info!("   ├─ Queue backend: {}", source.backend_type());
    log::info!("   ├─ Batch size: {}", settings.max_messages);
    log::info!("   └─ Wait time: {:?}", settings.wait);

    let mut handled = 0u64;
    let mut iterations = 0u64;

    loop {
        if *shutdown.borrow() {
            break;
        }

        let received = tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    log::warn!("⚠️  Shutdown channel dropped, stopping ingestion");
                }
                break;
            }
            result = source.receive(settings.max_messages, settings.wait) => result,
        };

        iterations += 1;
        if iterations % settings.queue_size_log_every == 0 {
            if let Some(pending) = source.approximate_pending() {
                log::info!("📊 Approximately {} messages in the queue", pending);
            }
        }

        let batch = match received {
            Ok(batch) => batch,
            Err(SourceError::Closed) => {
                log::warn!("⚠️  Message queue closed, stopping ingestion");
                break;
            }
            Err(e) => {
                log::error!("❌ Failed to receive messages: {}", e);
                tokio::select! {
                    biased;
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(settings.receive_error_pause) => continue,
                }
            }
        };

        if batch.is_empty() {
            log::trace!("No messages received");
            continue;
        }

        for message in &batch {
            engine.handle(&message.body);
            handled += 1;
        }

        for message in &batch {
            if let Err(e) = source.delete(message).await {
                log::warn!("⚠️  Failed to delete message {}: {}", message.message_id, e);
            }
        }
    }

    log::info!("✅ Pipeline ingestion stopped ({} messages handled)", handled);
    handled
}
