use std::sync::Arc;
use std::time::Duration;
use std::time::Instant;

use async_trait::async_trait;
use moka::future::Cache;
use moka::Expiry;
use tokio::sync::Mutex;
use tracing::instrument;

use super::KeyValueStore;
use crate::types::Error;
use crate::types::Result;

#[derive(Debug, Clone)]
enum Slot {
    Bytes(Vec<u8>),
    List(Vec<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct Entry {
    slot:     Slot,
    deadline: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.deadline.is_none_or(|d| d > now)
    }

    fn time_left(&self, since: Instant) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(since))
    }
}

// Every write re-evaluates expiration from the absolute deadline stored in the entry itself.
struct DeadlineExpiry;

impl Expiry<String, Entry> for DeadlineExpiry {
    fn expire_after_create(&self, _key: &String, value: &Entry, created_at: Instant) -> Option<Duration> {
        value.time_left(created_at)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        value: &Entry,
        updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        value.time_left(updated_at)
    }
}

/// In-process [`KeyValueStore`] with the Redis semantics the drills depend upon.
///
/// Entries live in a [moka](https://crates.io/crates/moka) cache whose expiration policy is driven by per-entry
/// deadlines. Read-modify-write commands are serialized with a mutex.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    entries: Cache<String, Entry>,
    write:   Arc<Mutex<()>>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .name("nosql-drills memory store")
                .expire_after(DeadlineExpiry)
                .build(),
            write:   Arc::new(Mutex::new(())),
        }
    }

    async fn live_entry(&self, key: &str) -> Option<Entry> {
        let entry = self.entries.get(key).await?;
        if entry.is_live(Instant::now()) {
            Some(entry)
        }
        else {
            self.entries.invalidate(key).await;
            None
        }
    }

    fn wrong_type(key: &str) -> Error {
        Error::WrongType { key: key.to_string() }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    #[instrument(level = "trace", skip(self))]
    async fn flush_db(&self) -> Result<()> {
        let _guard = self.write.lock().await;
        self.entries.invalidate_all();
        Ok(())
    }

    #[instrument(level = "trace", skip(self, value))]
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let _guard = self.write.lock().await;
        let entry = Entry {
            slot:     Slot::Bytes(value),
            deadline: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    #[instrument(level = "trace", skip(self))]
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match self.live_entry(key).await {
            None => Ok(None),
            Some(Entry {
                slot: Slot::Bytes(bytes),
                ..
            }) => Ok(Some(bytes)),
            Some(_) => Err(Self::wrong_type(key)),
        }
    }

    #[instrument(level = "trace", skip(self))]
    async fn incr(&self, key: &str) -> Result<i64> {
        let _guard = self.write.lock().await;

        let (current, deadline) = match self.live_entry(key).await {
            None => (0, None),
            Some(Entry {
                slot: Slot::Bytes(bytes),
                deadline,
            }) => {
                let current = std::str::from_utf8(&bytes)
                    .ok()
                    .and_then(|s| s.parse::<i64>().ok())
                    .ok_or_else(|| Error::NotAnInteger { key: key.to_string() })?;
                (current, deadline)
            }
            Some(_) => return Err(Self::wrong_type(key)),
        };

        let next = current
            .checked_add(1)
            .ok_or_else(|| Error::NotAnInteger { key: key.to_string() })?;

        self.entries
            .insert(
                key.to_string(),
                Entry {
                    slot: Slot::Bytes(next.to_string().into_bytes()),
                    deadline,
                },
            )
            .await;

        Ok(next)
    }

    #[instrument(level = "trace", skip(self, value))]
    async fn rpush(&self, key: &str, value: Vec<u8>) -> Result<u64> {
        let _guard = self.write.lock().await;

        let (mut items, deadline) = match self.live_entry(key).await {
            None => (Vec::new(), None),
            Some(Entry {
                slot: Slot::List(items),
                deadline,
            }) => (items, deadline),
            Some(_) => return Err(Self::wrong_type(key)),
        };

        items.push(value);
        let len = items.len() as u64;

        self.entries
            .insert(
                key.to_string(),
                Entry {
                    slot: Slot::List(items),
                    deadline,
                },
            )
            .await;

        Ok(len)
    }

    #[instrument(level = "trace", skip(self))]
    async fn lrange(&self, key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>> {
        let items = match self.live_entry(key).await {
            None => return Ok(Vec::new()),
            Some(Entry {
                slot: Slot::List(items),
                ..
            }) => items,
            Some(_) => return Err(Self::wrong_type(key)),
        };

        let len = items.len() as isize;
        let start = if start < 0 { (len + start).max(0) } else { start };
        let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };

        if stop < 0 || start > stop {
            return Ok(Vec::new());
        }

        Ok(items[start as usize..=stop as usize].to_vec())
    }

    #[instrument(level = "trace", skip(self))]
    async fn expire(&self, key: &str, ttl: Duration) -> Result<bool> {
        let _guard = self.write.lock().await;

        let Some(mut entry) = self.live_entry(key).await
        else {
            return Ok(false);
        };

        entry.deadline = Some(Instant::now() + ttl);
        self.entries.insert(key.to_string(), entry).await;

        Ok(true)
    }

    #[instrument(level = "trace", skip(self))]
    async fn ttl(&self, key: &str) -> Result<Option<Duration>> {
        Ok(self
            .live_entry(key)
            .await
            .and_then(|entry| entry.time_left(Instant::now())))
    }
}
