//! Message queue seam: receive batches, acknowledge after processing
//!
//! Delivery is at-least-once. A message is only deleted after it has been
//! handled, so a crash between receive and delete leads to a redelivery,
//! which the deduplication store absorbs.

use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::timeout;

/// One raw message as received from the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueMessage {
    pub message_id: String,
    /// Token used to acknowledge this particular receipt
    pub receipt_handle: String,
    pub body: String,
}

impl QueueMessage {
    pub fn new(message_id: impl Into<String>, body: impl Into<String>) -> Self {
        let message_id = message_id.into();
        Self {
            receipt_handle: message_id.clone(),
            message_id,
            body: body.into(),
        }
    }
}

#[derive(Debug)]
pub enum SourceError {
    Io(std::io::Error),
    /// No further messages will ever arrive
    Closed,
}

impl From<std::io::Error> for SourceError {
    fn from(err: std::io::Error) -> Self {
        SourceError::Io(err)
    }
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::Io(e) => write!(f, "Queue IO error: {}", e),
            SourceError::Closed => write!(f, "Queue closed"),
        }
    }
}

impl std::error::Error for SourceError {}

#[async_trait]
pub trait MessageSource: Send {
    /// Wait up to `wait` for at least one message, returning at most `max_messages`
    ///
    /// An empty batch means the wait elapsed without traffic.
    async fn receive(
        &mut self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, SourceError>;

    /// Acknowledge a message so it is not delivered again
    async fn delete(&mut self, message: &QueueMessage) -> Result<(), SourceError>;

    /// Messages waiting to be received, if the source can tell
    fn approximate_pending(&self) -> Option<usize> {
        None
    }

    /// Get backend type for logging
    fn backend_type(&self) -> &'static str;
}

/// In-process queue backed by a tokio channel
///
/// Producers hold the `Sender`; dropping every sender closes the queue once
/// it is drained.
pub struct ChannelQueue {
    rx: mpsc::Receiver<QueueMessage>,
    acknowledged: Vec<String>,
}

impl ChannelQueue {
    pub fn new(capacity: usize) -> (mpsc::Sender<QueueMessage>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (
            tx,
            Self {
                rx,
                acknowledged: Vec::new(),
            },
        )
    }

    /// Receipt handles deleted so far, in acknowledgement order
    pub fn acknowledged(&self) -> &[String] {
        &self.acknowledged
    }
}

#[async_trait]
impl MessageSource for ChannelQueue {
    async fn receive(
        &mut self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, SourceError> {
        let first = match timeout(wait, self.rx.recv()).await {
            Err(_) => return Ok(Vec::new()),
            Ok(None) => return Err(SourceError::Closed),
            Ok(Some(message)) => message,
        };

        let mut batch = vec![first];
        while batch.len() < max_messages {
            match self.rx.try_recv() {
                Ok(message) => batch.push(message),
                Err(_) => break,
            }
        }
        Ok(batch)
    }

    async fn delete(&mut self, message: &QueueMessage) -> Result<(), SourceError> {
        log::trace!("Deleting message {} from queue...", message.message_id);
        self.acknowledged.push(message.receipt_handle.clone());
        Ok(())
    }

    fn approximate_pending(&self) -> Option<usize> {
        Some(self.rx.len())
    }

    fn backend_type(&self) -> &'static str {
        "channel"
    }
}
