use std::fmt::Debug;
use std::fmt::Formatter;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use tracing::instrument;

use super::KeyValueStore;
use crate::types::Result;

// Redis expiration commands take whole milliseconds and reject zero.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

/// [`KeyValueStore`] backed by a Redis server.
#[derive(Clone)]
pub struct RedisStore {
    url:        String,
    connection: ConnectionManager,
}

impl RedisStore {
    #[instrument(level = "debug")]
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let connection = client
            .get_connection_manager()
            .await
            .inspect_err(|e| tracing::error!("Error connecting to Redis at {url}: {e}"))?;

        Ok(Self {
            url: url.to_string(),
            connection,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    // ConnectionManager is a cheap handle over a shared multiplexed connection.
    fn conn(&self) -> ConnectionManager {
        self.connection.clone()
    }
}

impl Debug for RedisStore {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisStore").field("url", &self.url).finish_non_exhaustive()
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    #[instrument(level = "trace")]
    async fn flush_db(&self) -> Result<()> {
        redis::cmd("FLUSHDB").query_async::<()>(&mut self.conn()).await?;
        Ok(())
    }

    #[instrument(level = "trace", skip(value))]
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn();
        match ttl {
            Some(ttl) => conn.pset_ex::<_, _, ()>(key, value, ttl_millis(ttl)).await?,
            None => conn.set::<_, _, ()>(key, value).await?,
        }
        Ok(())
    }

    #[instrument(level = "trace")]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.conn().get::<_, Option<Vec<u8>>>(key).await?)
    }

    #[instrument(level = "trace")]
    async fn incr(&self, key: &str) -> Result<i64> {
        Ok(self.conn().incr::<_, _, i64>(key, 1).await?)
    }

    #[instrument(level = "trace", skip(value))]
    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        Ok(self.conn().rpush::<_, _, u64>(key, value).await?)
    }

    #[instrument(level = "trace")]
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>> {
        Ok(self.conn().lrange::<_, Vec<Vec<u8>>>(key, start, stop).await?)
    }

    #[instrument(level = "trace")]
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let millis = i64::try_from(ttl_millis(ttl)).unwrap_or(i64::MAX);
        Ok(self.conn().pexpire::<_, bool>(key, millis).await?)
    }

    #[instrument(level = "trace")]
    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        // -2 for a missing key, -1 for a key without expiration
        let millis = self.conn().pttl::<_, i64>(key).await?;
        Ok((millis >= 0).then(|| Duration::from_millis(millis as u64)))
    }
}
