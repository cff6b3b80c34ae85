use async_trait::async_trait;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use mongodb::error::ErrorKind;
use mongodb::error::WriteFailure;
use mongodb::results::UpdateResult;
use mongodb::Client;
use mongodb::Collection;
use tokio_stream::StreamExt;
use tracing::instrument;

use super::DocumentCollection;
use super::DocumentServer;
use super::UpdateOutcome;
use crate::types::Error;
use crate::types::Result;

const DUPLICATE_KEY_CODE: i32 = 11000;

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(*err.kind, ErrorKind::Write(WriteFailure::WriteError(ref we)) if we.code == DUPLICATE_KEY_CODE)
}

impl From<UpdateResult> for UpdateOutcome {
    fn from(res: UpdateResult) -> Self {
        Self {
            matched:  res.matched_count,
            modified: res.modified_count,
        }
    }
}

#[async_trait]
impl DocumentCollection for Collection<Document> {
    #[instrument(level = "trace", skip(self), fields(collection = %self.name()))]
    async fn insert_one(&self, doc: Document) -> Result<Bson> {
        match Collection::insert_one(self, doc).await {
            Ok(res) => Ok(res.inserted_id),
            Err(err) if is_duplicate_key(&err) => Err(Error::DuplicateKey(err.to_string())),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(level = "trace", skip(self), fields(collection = %self.name()))]
    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateOutcome> {
        Ok(Collection::update_one(self, filter, update).await?.into())
    }

    #[instrument(level = "trace", skip(self), fields(collection = %self.name()))]
    async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateOutcome> {
        Ok(Collection::update_many(self, filter, update).await?.into())
    }

    #[instrument(level = "trace", skip(self), fields(collection = %self.name()))]
    async fn find(&self, filter: Document) -> Result<Vec<Document>> {
        let mut cursor = Collection::find(self, filter).await?;
        let mut docs = Vec::new();
        while let Some(doc) = cursor.next().await {
            docs.push(doc?);
        }
        Ok(docs)
    }

    #[instrument(level = "trace", skip(self), fields(collection = %self.name()))]
    async fn count_documents(&self, filter: Document) -> Result<u64> {
        Ok(Collection::count_documents(self, filter).await?)
    }
}

/// [`DocumentServer`] backed by a MongoDB deployment.
#[derive(Debug, Clone)]
pub struct MongoServer {
    client: Client,
}

impl MongoServer {
    #[instrument(level = "debug")]
    pub async fn connect(uri: &str) -> Result<Self> {
        let client = Client::with_uri_str(uri)
            .await
            .inspect_err(|e| tracing::error!("Error connecting to MongoDB at {uri}: {e}"))?;
        Ok(Self { client })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

#[async_trait]
impl DocumentServer for MongoServer {
    type Collection = Collection<Document>;

    async fn list_database_names(&self) -> Result<Vec<String>> {
        Ok(self.client.list_database_names().await?)
    }

    fn collection(&self, db: &str, name: &str) -> Self::Collection {
        self.client.database(db).collection::<Document>(name)
    }
}
