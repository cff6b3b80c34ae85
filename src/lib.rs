//! # nosql-drills
//!
//! Small drills around a key-value store (Redis) and a document database (MongoDB).
//!
//! # Key-Value Side
//!
//! - [`Cache`] stores scalar values under random UUID keys. Calls to [`Cache::store()`] are counted and their arguments
//!   and results are recorded, so that the history can be replayed later with [`Cache::replay()`].
//! - [`PageCache`](page::PageCache) keeps fetched web pages for a short time and counts accesses per URL.
//!
//! Both work over any [`KeyValueStore`]: [`RedisStore`](kv::RedisStore) for a real server, or
//! [`MemoryStore`](kv::MemoryStore), an in-process stand-in with the same semantics for the commands used here.
//!
//! # Document Side
//!
//! The [`school`] and [`log_stats`] modules implement a few queries over a [`DocumentCollection`]. A MongoDB
//! collection implements the trait directly; [`MemoryCollection`](doc::MemoryCollection) can be used in its place.
//!
//! # Command Line
//!
//! The `nosql-drills` binary exposes all of the above; see [`app::App`].

pub mod app;
pub mod cache;
pub mod doc;
pub mod instrument;
pub mod kv;
pub mod log_stats;
pub mod page;
pub mod school;
pub mod types;
pub mod value;

#[doc(inline)]
pub use cache::Cache;
#[doc(inline)]
pub use doc::DocumentCollection;
#[doc(inline)]
pub use kv::KeyValueStore;

pub mod prelude {
    pub use crate::cache::Cache;
    pub use crate::doc::DocumentCollection;
    pub use crate::doc::DocumentServer;
    pub use crate::instrument::Tracking;
    pub use crate::kv::KeyValueStore;
    pub use crate::page::PageCache;
    pub use crate::page::PageFetcher;
    pub use crate::types::*;
    pub use crate::value::CacheValue;
}
