pub mod queue;
pub mod reader;

pub use queue::{ChannelQueue, MessageSource, QueueMessage, SourceError};
pub use reader::TailQueue;
