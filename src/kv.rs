pub mod memory;
pub mod redis;

use std::fmt::Debug;
use std::time::Duration;

use async_trait::async_trait;

use crate::types::Result;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

/// The subset of key-value primitives the drills rely on.
///
/// Semantics follow Redis: missing keys read as absent, `INCR` treats a missing key as `0`, list indices may be
/// negative to count from the end and the stop index is inclusive.
///
/// Time-to-live values are honoured to the millisecond.
#[async_trait]
pub trait KeyValueStore: Debug + Send + Sync + 'static {
    async fn flush_db(&self) -> Result<()>;

    /// Without a `ttl` the key becomes persistent, dropping whatever expiration it had.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Keeps the existing time-to-live of the key.
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Returns the length of the list after the push.
    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<u64>;

    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>>;

    /// Returns `false` if there is no such key.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool>;

    async fn ttl(&self, key: &str) -> Result<Option<Duration>>;
}
