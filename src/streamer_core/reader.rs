//! File-backed queue: tails a JSONL file where each line is one raw message body
//!
//! Lines are read from the start of the file, so messages written before the
//! monitor started are still delivered. Rotation (the path now pointing at a
//! different inode) reopens the file from the beginning.

use super::queue::{MessageSource, QueueMessage, SourceError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::{sleep, timeout};

#[cfg(unix)]
use std::os::unix::fs::MetadataExt;

pub struct TailQueue {
    path: PathBuf,
    file: Option<BufReader<File>>,
    inode: Option<u64>,
    poll_interval: Duration,
    /// Bytes of a line whose newline has not been written yet
    partial: Vec<u8>,
    /// Lines read from the file but not yet handed out by `receive`
    pending: VecDeque<QueueMessage>,
    /// Lines read since the current file was opened
    delivered: u64,
    acknowledged: u64,
}

impl TailQueue {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
            inode: None,
            poll_interval: Duration::from_millis(100),
            partial: Vec::new(),
            pending: VecDeque::new(),
            delivered: 0,
            acknowledged: 0,
        }
    }

    pub fn acknowledged(&self) -> u64 {
        self.acknowledged
    }

    async fn open(&mut self) -> std::io::Result<()> {
        let file = File::open(&self.path).await?;

        #[cfg(unix)]
        {
            self.inode = Some(file.metadata().await?.ino());
        }

        self.file = Some(BufReader::new(file));
        self.partial.clear();
        self.delivered = 0;
        log::info!("📖 Reading queue file: {}", self.path.display());
        Ok(())
    }

    /// Detect if the file has been rotated (inode changed)
    async fn detect_rotation(&self) -> std::io::Result<bool> {
        #[cfg(unix)]
        {
            match tokio::fs::metadata(&self.path).await {
                Ok(metadata) => Ok(self.inode.is_some_and(|old| old != metadata.ino())),
                // Mid-rotation: the old handle stays valid until a new file appears
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(e),
            }
        }

        #[cfg(not(unix))]
        {
            Ok(false)
        }
    }

    /// Move the next non-empty line into `pending`
    ///
    /// Returns false at the current end of file. Every await point leaves
    /// already-read bytes in `self.partial` or `self.pending`, so dropping the
    /// future loses nothing.
    async fn read_next_line(&mut self) -> std::io::Result<bool> {
        if self.file.is_none() || self.detect_rotation().await? {
            if self.file.is_some() {
                log::info!("🔄 Queue file rotated, reopening: {}", self.path.display());
            }
            self.open().await?;
        }

        let Some(reader) = self.file.as_mut() else {
            return Ok(false);
        };

        loop {
            if reader.read_until(b'\n', &mut self.partial).await? == 0 {
                return Ok(false);
            }
            if self.partial.last() != Some(&b'\n') {
                return Ok(false);
            }
            let bytes = std::mem::take(&mut self.partial);
            // Invalid UTF-8 is passed on (lossily) so the decoder counts it as malformed
            let line = String::from_utf8_lossy(&bytes);
            let line = line.trim();
            if !line.is_empty() {
                self.delivered += 1;
                let message = QueueMessage::new(format!("line-{}", self.delivered), line);
                self.pending.push_back(message);
                return Ok(true);
            }
        }
    }

    /// Poll until at least one line is pending
    async fn wait_for_line(&mut self) -> std::io::Result<()> {
        while self.pending.is_empty() {
            if !self.read_next_line().await? {
                sleep(self.poll_interval).await;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MessageSource for TailQueue {
    async fn receive(
        &mut self,
        max_messages: usize,
        wait: Duration,
    ) -> Result<Vec<QueueMessage>, SourceError> {
        match timeout(wait, self.wait_for_line()).await {
            Err(_) => return Ok(Vec::new()),
            Ok(result) => result?,
        }

        while self.pending.len() < max_messages {
            match self.read_next_line().await {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    // Deliver what was already read; the error resurfaces on the next receive
                    log::warn!("⚠️  Queue read failed mid-batch: {}", e);
                    break;
                }
            }
        }

        let take = max_messages.min(self.pending.len());
        Ok(self.pending.drain(..take).collect())
    }

    async fn delete(&mut self, message: &QueueMessage) -> Result<(), SourceError> {
        // Lines cannot be removed from the file; acknowledging only advances the count
        log::trace!("Acknowledged {} from {}", message.message_id, self.path.display());
        self.acknowledged += 1;
        Ok(())
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}
