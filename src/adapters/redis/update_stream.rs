use crate::adapters::redis::RedisClient;
use crate::services::update_publisher::UpdateBroker;
use async_trait::async_trait;
use std::sync::Arc;

/// Appends updates to a Redis Stream.
///
/// A stream is totally ordered, so entries sharing a key keep their relative order.
#[derive(Debug, Clone)]
pub struct RedisUpdateStream {
    redis: Arc<RedisClient>,
    max_len: u64,
}

impl RedisUpdateStream {
    #[must_use]
    pub const fn new(redis: Arc<RedisClient>, max_len: u64) -> Self {
        Self { redis, max_len }
    }
}

#[async_trait]
impl UpdateBroker for RedisUpdateStream {
    #[tracing::instrument(level = "debug", skip(self, payload), fields(bytes = payload.len()))]
    async fn publish(&self, topic: &str, key: &str, payload: Vec<u8>) -> anyhow::Result<()> {
        let mut conn = self.redis.publisher();
        // XADD topic MAXLEN ~ n * key <key> value <payload>
        let entry_id: String = redis::cmd("XADD")
            .arg(topic)
            .arg("MAXLEN")
            .arg("~")
            .arg(self.max_len)
            .arg("*")
            .arg("key")
            .arg(key)
            .arg("value")
            .arg(payload)
            .query_async(&mut conn)
            .await?;
        tracing::trace!(%entry_id, "Update appended to stream");
        Ok(())
    }

    async fn ping(&self) -> anyhow::Result<()> {
        self.redis.ping().await
    }
}
