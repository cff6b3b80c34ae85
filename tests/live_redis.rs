#![cfg(feature = "live-redis")]

use std::env;
use std::sync::Arc;
use std::time::Duration;

use nosql_drills::kv::KeyValueStore;
use nosql_drills::kv::RedisStore;
use nosql_drills::Cache;

// The tests flush the selected database; point NOSQL_REDIS_URL to a scratch one.
async fn store() -> Result<Arc<RedisStore>, Box<dyn std::error::Error>> {
    let url = env::var("NOSQL_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/15".to_string());
    Ok(Arc::new(RedisStore::connect(&url).await?))
}

#[tokio::test]
async fn cache_against_redis() -> Result<(), Box<dyn std::error::Error>> {
    let cache = Cache::open(store().await?).await?;

    let k1 = cache.store(b"hello").await?;
    let k2 = cache.store(7).await?;

    assert_eq!(cache.get_raw(&k1).await?, Some(b"hello".to_vec()));
    assert_eq!(cache.get_int(&k2).await?, Some(7));
    assert_eq!(cache.call_count("store").await?, 2);

    let replay = cache.replay("store").await?;
    assert_eq!(replay.calls.len(), 2);
    assert_eq!(replay.calls[0], ("(b\"hello\")".to_string(), k1));

    Ok(())
}

#[tokio::test]
async fn primitives_against_redis() -> Result<(), Box<dyn std::error::Error>> {
    let store = store().await?;
    store.flush_db().await?;

    assert_eq!(store.incr("n").await?, 1);
    assert!(store.expire("n", Duration::from_secs(30)).await?);
    assert_eq!(store.incr("n").await?, 2);
    assert!(store.ttl("n").await?.is_some());

    store.rpush("l", b"a".to_vec()).await?;
    store.rpush("l", b"b".to_vec()).await?;
    assert_eq!(store.lrange("l", 0, -1).await?, vec![b"a".to_vec(), b"b".to_vec()]);

    store.set("s", b"v".to_vec(), Some(Duration::from_secs(10))).await?;
    assert_eq!(store.get("s").await?, Some(b"v".to_vec()));
    assert!(store.get("l").await.is_err());

    // sub-second expirations keep the key for the requested time
    store.set("half", b"v".to_vec(), None).await?;
    assert!(store.expire("half", Duration::from_millis(500)).await?);
    assert_eq!(store.get("half").await?, Some(b"v".to_vec()));
    let left = store.ttl("half").await?.ok_or("no ttl on 'half'")?;
    assert!(left > Duration::ZERO && left <= Duration::from_millis(500));

    store.set("fast", b"v".to_vec(), Some(Duration::from_millis(1500))).await?;
    assert!(store.ttl("fast").await?.ok_or("no ttl on 'fast'")? > Duration::from_secs(1));

    tokio::time::sleep(Duration::from_millis(700)).await;
    assert_eq!(store.get("half").await?, None);

    Ok(())
}
