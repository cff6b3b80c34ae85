pub mod memory;
pub mod mongo;

use std::fmt::Debug;

use async_trait::async_trait;
use mongodb::bson::Bson;
use mongodb::bson::Document;

use crate::types::Result;

pub use self::memory::MemoryCollection;
pub use self::memory::MemoryServer;
pub use self::mongo::MongoServer;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub matched:  u64,
    pub modified: u64,
}

/// Document collection operations the drills are built upon.
///
/// Updates are expressed as MongoDB update documents; only `$set` is used by this crate.
#[async_trait]
pub trait DocumentCollection: Send + Sync + 'static {
    /// Returns the `_id` of the new document. A missing `_id` is generated by the collection. Unique index violations
    /// are reported as [`Error::DuplicateKey`](crate::types::Error::DuplicateKey).
    async fn insert_one(&self, doc: Document) -> Result<Bson>;
    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateOutcome>;
    async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateOutcome>;
    async fn find(&self, filter: Document) -> Result<Vec<Document>>;
    async fn count_documents(&self, filter: Document) -> Result<u64>;
}

#[async_trait]
pub trait DocumentServer: Debug + Send + Sync + 'static {
    type Collection: DocumentCollection;

    async fn list_database_names(&self) -> Result<Vec<String>>;
    fn collection(&self, db: &str, name: &str) -> Self::Collection;
}
