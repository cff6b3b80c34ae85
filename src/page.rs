use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use fieldx::fxstruct;
use reqwest::StatusCode;
use tracing::debug;
use tracing::instrument;

use crate::instrument::read_counter;
use crate::kv::KeyValueStore;
use crate::types::Result;

pub fn count_key(url: &str) -> String {
    format!("count:{url}")
}

#[async_trait]
pub trait PageFetcher: Send + Sync + 'static {
    /// `Some(body)` for `200 OK`, `None` for any other status.
    async fn fetch(&self, url: &str) -> Result<Option<String>>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PageFetcher for HttpFetcher {
    #[instrument(level = "debug", skip(self))]
    async fn fetch(&self, url: &str) -> Result<Option<String>> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if status != StatusCode::OK {
            debug!("GET {url} returned {status}");
            return Ok(None);
        }
        Ok(Some(response.text().await?))
    }
}

/// Caches page bodies for a short while and counts how many times each URL was requested.
#[fxstruct(no_new, default(off), builder)]
pub struct PageCache<S, F>
where
    S: KeyValueStore,
    F: PageFetcher,
{
    #[fieldx(get(clone))]
    backend: Arc<S>,

    #[fieldx(get(clone))]
    fetcher: Arc<F>,

    /// How long a fetched page stays cached.
    #[fieldx(get(copy), default(Duration::from_secs(10)))]
    ttl: Duration,
}

impl<S, F> PageCache<S, F>
where
    S: KeyValueStore,
    F: PageFetcher,
{
    /// Every call counts as an access, whether the page is served from the cache or not. Pages that could not be
    /// fetched with `200 OK` are returned as an empty string and are not cached.
    #[instrument(level = "debug", skip(self))]
    pub async fn get_page(&self, url: &str) -> Result<String> {
        let accesses = self.backend.incr(&count_key(url)).await?;

        if let Some(cached) = self.backend.get(url).await? {
            debug!("{url}: cache hit, access #{accesses}");
            return Ok(String::from_utf8_lossy(&cached).into_owned());
        }

        debug!("{url}: cache miss, access #{accesses}");
        match self.fetcher.fetch(url).await? {
            Some(body) => {
                self.backend
                    .set(url, body.clone().into_bytes(), Some(self.ttl))
                    .await?;
                Ok(body)
            }
            None => Ok(String::new()),
        }
    }

    pub async fn access_count(&self, url: &str) -> Result<i64> {
        read_counter(self.backend.as_ref(), &count_key(url)).await
    }
}
