use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::instrument;

use super::DocumentCollection;
use super::DocumentServer;
use super::UpdateOutcome;
use crate::types::nderr;
use crate::types::Error;
use crate::types::Result;

#[derive(Debug, Default)]
struct CollectionData {
    docs:   Vec<Document>,
    unique: Option<String>,
}

/// In-process [`DocumentCollection`].
///
/// Filters are top-level equality matches. As in MongoDB, a filter value also matches an array field containing it.
#[derive(Debug, Clone, Default)]
pub struct MemoryCollection {
    data: Arc<RwLock<CollectionData>>,
}

fn field_matches(value: Option<&Bson>, wanted: &Bson) -> bool {
    match value {
        None => *wanted == Bson::Null,
        Some(Bson::Array(items)) => items.contains(wanted) || matches!(wanted, Bson::Array(w) if w == items),
        Some(v) => v == wanted,
    }
}

fn doc_matches(doc: &Document, filter: &Document) -> bool {
    filter.iter().all(|(k, wanted)| field_matches(doc.get(k), wanted))
}

fn set_fields(update: &Document) -> Result<&Document> {
    let mut set = None;
    for (op, fields) in update {
        match (op.as_str(), fields) {
            ("$set", Bson::Document(fields)) => set = Some(fields),
            (op, _) => return Err(nderr!("Unsupported update operator '{op}'")),
        }
    }
    set.ok_or_else(|| nderr!("Update document has no '$set' operator"))
}

impl MemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// A collection with a unique index over `field`.
    pub fn with_unique_field(field: &str) -> Self {
        Self {
            data: Arc::new(RwLock::new(CollectionData {
                docs:   Vec::new(),
                unique: Some(field.to_string()),
            })),
        }
    }

    pub fn len(&self) -> usize {
        self.data.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn apply_update(&self, filter: &Document, update: &Document, many: bool) -> Result<UpdateOutcome> {
        let set = set_fields(update)?;
        let mut data = self.data.write();
        let mut outcome = UpdateOutcome::default();

        for doc in data.docs.iter_mut().filter(|d| doc_matches(d, filter)) {
            outcome.matched += 1;
            let mut changed = false;
            for (k, v) in set {
                if doc.get(k) != Some(v) {
                    doc.insert(k.clone(), v.clone());
                    changed = true;
                }
            }
            if changed {
                outcome.modified += 1;
            }
            if !many {
                break;
            }
        }

        Ok(outcome)
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    #[instrument(level = "trace", skip(self))]
    async fn insert_one(&self, doc: Document) -> Result<Bson> {
        let mut data = self.data.write();

        let id = doc.get("_id").cloned().unwrap_or_else(|| Bson::ObjectId(ObjectId::new()));
        let mut stored = Document::new();
        stored.insert("_id", id.clone());
        for (k, v) in doc {
            if k != "_id" {
                stored.insert(k, v);
            }
        }

        // a unique index keys documents lacking the field as null
        let unique_fields = std::iter::once("_id").chain(data.unique.as_deref());
        for field in unique_fields {
            let value = stored.get(field).unwrap_or(&Bson::Null);
            if data.docs.iter().any(|d| d.get(field).unwrap_or(&Bson::Null) == value) {
                return Err(Error::DuplicateKey(format!("duplicate key on '{field}': {value}")));
            }
        }

        data.docs.push(stored);
        Ok(id)
    }

    #[instrument(level = "trace", skip(self))]
    async fn update_one(&self, filter: Document, update: Document) -> Result<UpdateOutcome> {
        self.apply_update(&filter, &update, false)
    }

    #[instrument(level = "trace", skip(self))]
    async fn update_many(&self, filter: Document, update: Document) -> Result<UpdateOutcome> {
        self.apply_update(&filter, &update, true)
    }

    #[instrument(level = "trace", skip(self))]
    async fn find(&self, filter: Document) -> Result<Vec<Document>> {
        Ok(self
            .data
            .read()
            .docs
            .iter()
            .filter(|d| doc_matches(d, &filter))
            .cloned()
            .collect())
    }

    #[instrument(level = "trace", skip(self))]
    async fn count_documents(&self, filter: Document) -> Result<u64> {
        Ok(self.data.read().docs.iter().filter(|d| doc_matches(d, &filter)).count() as u64)
    }
}

/// In-process [`DocumentServer`]. A database is listed once any of its collections holds a document.
#[derive(Debug, Clone, Default)]
pub struct MemoryServer {
    databases: Arc<Mutex<BTreeMap<String, BTreeMap<String, MemoryCollection>>>>,
}

impl MemoryServer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pre-built collection, e.g. one with a unique index.
    pub fn attach(&self, db: &str, name: &str, collection: MemoryCollection) {
        self.databases
            .lock()
            .entry(db.to_string())
            .or_default()
            .insert(name.to_string(), collection);
    }
}

#[async_trait]
impl DocumentServer for MemoryServer {
    type Collection = MemoryCollection;

    async fn list_database_names(&self) -> Result<Vec<String>> {
        Ok(self
            .databases
            .lock()
            .iter()
            .filter(|(_, colls)| colls.values().any(|c| !c.is_empty()))
            .map(|(name, _)| name.clone())
            .collect())
    }

    fn collection(&self, db: &str, name: &str) -> Self::Collection {
        self.databases
            .lock()
            .entry(db.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default()
            .clone()
    }
}
