use std::sync::Arc;

use fieldx::fxstruct;
use uuid::Uuid;

use crate::instrument;
use crate::instrument::CallTracker;
use crate::instrument::Replay;
use crate::instrument::Tracking;
use crate::kv::KeyValueStore;
use crate::types::Result;
use crate::value::CacheValue;
use crate::value::FromStoredBytes;

/// Stores scalar values under random keys.
///
/// ```ignore
/// let cache = Cache::open(Arc::new(RedisStore::connect("redis://127.0.0.1/").await?)).await?;
/// let key = cache.store(b"hello").await?;
/// assert_eq!(cache.get_str(&key).await?, Some("hello".to_string()));
/// println!("{}", cache.replay("store").await?);
/// ```
///
/// Unless disabled with [`Tracking`], every call to [`Cache::store()`] is counted and recorded in the backend under
/// the method's qualified name (`Cache.store` by default).
#[derive(Debug)]
#[fxstruct(no_new, default(off), builder)]
pub struct Cache<S>
where
    S: KeyValueStore,
{
    #[fieldx(get(clone))]
    backend: Arc<S>,

    #[fieldx(get(copy), default(Tracking::default()))]
    tracking: Tracking,

    /// Prefix of qualified method names.
    #[fieldx(get, builder(into), default(String::from("Cache")))]
    name: String,
}

impl<S> Cache<S>
where
    S: KeyValueStore,
{
    /// Create a cache with the default tracking and wipe the backend database clean.
    pub async fn open(backend: Arc<S>) -> Result<Self> {
        let cache = Self::builder().backend(backend).build()?;
        cache.flush().await?;
        Ok(cache)
    }

    pub async fn flush(&self) -> Result<()> {
        self.backend.flush_db().await
    }

    pub fn qualname(&self, method: &str) -> String {
        format!("{}.{method}", self.name)
    }

    #[tracing::instrument(level = "debug", skip(self, data))]
    pub async fn store<V: Into<CacheValue>>(&self, data: V) -> Result<String> {
        let data = data.into();
        let bytes = data.to_bytes();
        let backend = self.backend();
        let tracker = CallTracker::new(self.backend(), self.qualname("store"), self.tracking());

        tracker
            .track(std::slice::from_ref(&data), || async move {
                let key = Uuid::new_v4().to_string();
                backend.set(&key, bytes, None).await?;
                Ok(key)
            })
            .await
    }

    /// Fetch the raw value and pass it through `convert`. Missing keys are reported as `None` without calling it.
    pub async fn get_with<T, F>(&self, key: &str, convert: F) -> Result<Option<T>>
    where
        F: FnOnce(Vec<u8>) -> Result<T>,
    {
        self.backend.get(key).await?.map(convert).transpose()
    }

    pub async fn get<T: FromStoredBytes>(&self, key: &str) -> Result<Option<T>> {
        self.get_with(key, |bytes| T::from_stored_bytes(key, bytes)).await
    }

    pub async fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.get(key).await
    }

    pub async fn get_str(&self, key: &str) -> Result<Option<String>> {
        self.get(key).await
    }

    pub async fn get_int(&self, key: &str) -> Result<Option<i64>> {
        self.get(key).await
    }

    pub async fn get_float(&self, key: &str) -> Result<Option<f64>> {
        self.get(key).await
    }

    pub async fn call_count(&self, method: &str) -> Result<i64> {
        instrument::call_count(self.backend.as_ref(), &self.qualname(method)).await
    }

    pub async fn replay(&self, method: &str) -> Result<Replay> {
        instrument::replay(self.backend.as_ref(), &self.qualname(method)).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::instrument::inputs_key;
    use crate::kv::MemoryStore;
    use crate::types::Error;

    async fn new_cache() -> Cache<MemoryStore> {
        Cache::open(Arc::new(MemoryStore::new())).await.unwrap()
    }

    #[tokio::test]
    async fn test_store_and_get_back() {
        let cache = new_cache().await;

        let k_bytes = cache.store(b"hello").await.unwrap();
        let k_str = cache.store("foo").await.unwrap();
        let k_int = cache.store(123).await.unwrap();
        let k_float = cache.store(3.25).await.unwrap();

        assert_ne!(k_bytes, k_str);
        assert!(Uuid::parse_str(&k_bytes).is_ok());

        assert_eq!(cache.get_raw(&k_bytes).await.unwrap(), Some(b"hello".to_vec()));
        assert_eq!(cache.get_str(&k_str).await.unwrap(), Some("foo".to_string()));
        assert_eq!(cache.get_int(&k_int).await.unwrap(), Some(123));
        assert_eq!(cache.get_float(&k_float).await.unwrap(), Some(3.25));
        assert_eq!(
            cache
                .get_with(&k_int, |b| Ok(String::from_utf8_lossy(&b).len()))
                .await
                .unwrap(),
            Some(3)
        );

        assert_eq!(cache.get_str("no-such-key").await.unwrap(), None);
        assert!(matches!(cache.get_int(&k_str).await, Err(Error::Decode { .. })));
    }

    #[tokio::test]
    async fn test_open_flushes_backend() {
        let backend = Arc::new(MemoryStore::new());
        backend.set("stale", b"1".to_vec(), None).await.unwrap();

        let cache = Cache::open(backend.clone()).await.unwrap();
        assert_eq!(cache.get_raw("stale").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_store_is_counted_and_replayed() {
        let cache = new_cache().await;
        let k1 = cache.store("foo").await.unwrap();
        let k2 = cache.store("bar").await.unwrap();
        let k3 = cache.store(42).await.unwrap();

        assert_eq!(cache.call_count("store").await.unwrap(), 3);
        // the counter is an ordinary key of the backend
        assert_eq!(cache.get_int("Cache.store").await.unwrap(), Some(3));

        let replay = cache.replay("store").await.unwrap();
        let expected = [
            "Cache.store was called 3 times:".to_string(),
            format!("Cache.store(\"foo\") -> {k1}"),
            format!("Cache.store(\"bar\") -> {k2}"),
            format!("Cache.store(42) -> {k3}"),
        ];
        assert_eq!(replay.to_string(), expected.join("\n"));
    }

    #[tokio::test]
    async fn test_untracked_cache() {
        let backend = Arc::new(MemoryStore::new());
        let cache = Cache::builder()
            .backend(backend.clone())
            .tracking(Tracking::none())
            .name("Quiet")
            .build()
            .unwrap();

        let key = cache.store("x").await.unwrap();
        assert_eq!(cache.get_str(&key).await.unwrap(), Some("x".to_string()));
        assert_eq!(cache.call_count("store").await.unwrap(), 0);
        assert!(backend.lrange(&inputs_key("Quiet.store"), 0, -1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_corrupted_call_counter_is_an_error() {
        let backend = Arc::new(MemoryStore::new());
        let cache = Cache::open(backend.clone()).await.unwrap();

        backend.set("Cache.store", b"abc".to_vec(), None).await.unwrap();
        assert!(matches!(
            cache.call_count("store").await,
            Err(Error::Decode { ref key, .. }) if key == "Cache.store"
        ));
    }
}
