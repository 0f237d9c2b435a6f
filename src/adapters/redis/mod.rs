use crate::config::BrokerConfig;
use std::sync::Arc;

pub mod update_stream;

pub use update_stream::RedisUpdateStream;

#[derive(Debug)]
pub struct RedisClient {
    publisher: redis::aio::ConnectionManager,
}

impl RedisClient {
    /// Connects to the broker. The connection manager reconnects on its own after failures.
    ///
    /// # Errors
    /// Returns an error if the connection fails.
    pub async fn new(config: &BrokerConfig) -> anyhow::Result<Arc<Self>> {
        let client = redis::Client::open(config.url.as_str())?;
        let publisher = client.get_connection_manager().await?;

        Ok(Arc::new(Self { publisher }))
    }

    /// Returns a publisher connection that can be used for standard Redis commands.
    #[must_use]
    pub fn publisher(&self) -> redis::aio::ConnectionManager {
        self.publisher.clone()
    }

    /// Pings the Redis server to check connectivity.
    ///
    /// # Errors
    /// Returns an error if the ping fails.
    pub async fn ping(&self) -> anyhow::Result<()> {
        let mut conn = self.publisher();
        redis::cmd("PING").query_async::<String>(&mut conn).await?;
        Ok(())
    }
}
