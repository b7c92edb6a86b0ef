use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::RedisConfig;

use super::{QueueError, WorkQueue};

// -----------------------------------------------------------------------------
// ----- RedisQueue ------------------------------------------------------------

/// A redis list used as a FIFO: `BLPOP` from the head, `RPUSH` onto the tail.
///
/// `BLPOP` holds its connection until an item arrives, so pushes go over a
/// second connection.
pub struct RedisQueue {
    key: String,
    inbound: Mutex<MultiplexedConnection>,
    outbound: MultiplexedConnection,
}

impl std::fmt::Debug for RedisQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisQueue").field("key", &self.key).finish()
    }
}

// -----------------------------------------------------------------------------
// ----- RedisQueue: Static ----------------------------------------------------

impl RedisQueue {
    pub async fn connect(config: &RedisConfig) -> Result<Self, QueueError> {
        let url = format!("redis://{}:{}/{}", config.host, config.port, config.db);
        let client = redis::Client::open(url)?;

        let inbound = client.get_multiplexed_async_connection().await?;
        let outbound = client.get_multiplexed_async_connection().await?;

        info!(
            "connected to redis {}:{} db {} (queue '{}')",
            config.host, config.port, config.db, config.queue_key
        );

        Ok(Self {
            key: config.queue_key.clone(),
            inbound: Mutex::new(inbound),
            outbound,
        })
    }
}

// -----------------------------------------------------------------------------
// ----- RedisQueue: WorkQueue -------------------------------------------------

#[async_trait]
impl WorkQueue for RedisQueue {
    async fn pop(&self) -> Result<Vec<u8>, QueueError> {
        let mut conn = self.inbound.lock().await;
        loop {
            // a zero timeout blocks server-side until an item arrives
            let item: Option<(String, Vec<u8>)> = conn.blpop(&self.key, 0.0).await?;
            if let Some((_key, value)) = item {
                return Ok(value);
            }
        }
    }

    async fn push(&self, item: String) -> Result<(), QueueError> {
        let mut conn = self.outbound.clone();
        let _len: i64 = conn.rpush(&self.key, item).await?;
        Ok(())
    }
}

// -----------------------------------------------------------------------------
// -----------------------------------------------------------------------------
