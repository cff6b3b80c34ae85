use std::fmt::Display;
use std::fmt::Formatter;

use mongodb::bson::doc;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use tracing::debug;
use tracing::instrument;

use crate::doc::DocumentCollection;
use crate::doc::UpdateOutcome;
use crate::types::Error;
use crate::types::Result;

fn topic_list<T: AsRef<str>>(topics: &[T]) -> Vec<String> {
    topics.iter().map(|t| t.as_ref().to_string()).collect()
}

pub async fn list_all<C: DocumentCollection + ?Sized>(coll: &C) -> Result<Vec<Document>> {
    coll.find(doc! {}).await
}

/// Returns `None` if a school with the same unique key already exists.
#[instrument(level = "debug", skip(coll, topics))]
pub async fn insert_school<C, T>(coll: &C, name: &str, topics: &[T]) -> Result<Option<Bson>>
where
    C: DocumentCollection + ?Sized,
    T: AsRef<str>,
{
    match coll
        .insert_one(doc! { "name": name, "topics": topic_list(topics) })
        .await
    {
        Ok(id) => Ok(Some(id)),
        Err(Error::DuplicateKey(msg)) => {
            debug!("School '{name}' not inserted: {msg}");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Replace the topics of every school with the given name.
#[instrument(level = "debug", skip(coll, topics))]
pub async fn update_topics<C, T>(coll: &C, name: &str, topics: &[T]) -> Result<UpdateOutcome>
where
    C: DocumentCollection + ?Sized,
    T: AsRef<str>,
{
    coll.update_many(
        doc! { "name": name },
        doc! { "$set": { "topics": topic_list(topics) } },
    )
    .await
}

pub async fn schools_by_topic<C: DocumentCollection + ?Sized>(coll: &C, topic: &str) -> Result<Vec<Document>> {
    coll.find(doc! { "topics": topic }).await
}

/// One-line rendering of a school document: `[<id>] <name> ["topic", ...]`.
pub struct SchoolLine<'a>(pub &'a Document);

impl Display for SchoolLine<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let doc = self.0;
        let id = match doc.get("_id") {
            Some(Bson::ObjectId(oid)) => oid.to_hex(),
            Some(Bson::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        let name = doc.get_str("name").unwrap_or_default();
        let topics = match doc.get_array("topics") {
            Ok(items) => items
                .iter()
                .map(|t| match t {
                    Bson::String(s) => format!("{s:?}"),
                    other => other.to_string(),
                })
                .collect::<Vec<_>>()
                .join(", "),
            Err(_) => String::new(),
        };
        write!(f, "[{id}] {name} [{topics}]")
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::doc::MemoryCollection;

    async fn seeded() -> MemoryCollection {
        let coll = MemoryCollection::with_unique_field("name");
        insert_school(&coll, "UCSF", &[] as &[&str]).await.unwrap();
        insert_school(&coll, "UCSD", &[] as &[&str]).await.unwrap();
        insert_school(&coll, "Holberton school", &["Sys admin", "AI", "Algorithm"])
            .await
            .unwrap();
        coll
    }

    #[tokio::test]
    async fn test_insert_and_list() {
        let empty = MemoryCollection::new();
        assert!(list_all(&empty).await.unwrap().is_empty());

        let coll = seeded().await;
        assert_eq!(list_all(&coll).await.unwrap().len(), 3);

        // duplicate names are rejected by the unique index
        assert_eq!(insert_school(&coll, "UCSF", &["x"]).await.unwrap(), None);
        assert_eq!(list_all(&coll).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_topics() {
        let coll = seeded().await;

        let outcome = update_topics(&coll, "Holberton school", &["iOS"]).await.unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1 });

        let outcome = update_topics(&coll, "Nowhere", &["iOS"]).await.unwrap();
        assert_eq!(outcome.matched, 0);

        let docs = schools_by_topic(&coll, "iOS").await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].get_str("name").unwrap(), "Holberton school");
        assert!(schools_by_topic(&coll, "AI").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schools_by_topic() {
        let coll = seeded().await;
        insert_school(&coll, "Other", &["AI"]).await.unwrap();

        let mut names = schools_by_topic(&coll, "AI")
            .await
            .unwrap()
            .iter()
            .map(|d| d.get_str("name").unwrap().to_string())
            .collect::<Vec<_>>();
        names.sort();
        assert_eq!(names, vec!["Holberton school", "Other"]);
        assert!(schools_by_topic(&coll, "Python").await.unwrap().is_empty());
    }

    #[test]
    fn test_school_line() {
        let d = doc! { "_id": "abc", "name": "UCSD", "topics": ["Sys admin", "AI"] };
        assert_eq!(SchoolLine(&d).to_string(), r#"[abc] UCSD ["Sys admin", "AI"]"#);

        let bare = doc! { "_id": 1, "name": "X" };
        assert_eq!(SchoolLine(&bare).to_string(), "[1] X []");
    }
}
