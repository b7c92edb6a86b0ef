pub mod redis;

pub use self::redis::RedisQueue;

use async_trait::async_trait;
use thiserror::Error;

// -----------------------------------------------------------------------------
// ----- WorkQueue -------------------------------------------------------------

/// The durable list the dispatcher consumes. Implementations provide atomic
/// pop/push; durability is theirs.
#[async_trait]
pub trait WorkQueue: Send + Sync {
    /// Blocks until an item is available at the head of the queue. Items are
    /// raw bytes; decoding them is the consumer's job.
    async fn pop(&self) -> Result<Vec<u8>, QueueError>;

    /// Appends an item at the tail of the queue.
    async fn push(&self, item: String) -> Result<(), QueueError>;
}

// -----------------------------------------------------------------------------
// ----- Errors ----------------------------------------------------------------

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("redis error: {0}")]
    Redis(#[from] ::redis::RedisError),

    #[error("queue closed")]
    Closed,
}
