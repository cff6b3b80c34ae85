#![cfg(feature = "live-mongo")]

use std::env;

use nosql_drills::doc::DocumentServer;
use nosql_drills::doc::MongoServer;
use nosql_drills::log_stats::log_stats;
use nosql_drills::school;

async fn server() -> Result<MongoServer, Box<dyn std::error::Error>> {
    let uri = env::var("NOSQL_MONGO_URI").unwrap_or_else(|_| "mongodb://127.0.0.1:27017".to_string());
    Ok(MongoServer::connect(&uri).await?)
}

#[tokio::test]
async fn schools_against_mongo() -> Result<(), Box<dyn std::error::Error>> {
    let server = server().await?;
    let coll = server.collection("nosql_drills_test", "school");
    server
        .client()
        .database("nosql_drills_test")
        .collection::<mongodb::bson::Document>("school")
        .drop()
        .await?;

    school::insert_school(&coll, "UCSF", &["Python"]).await?;
    school::insert_school(&coll, "UCSD", &["C"]).await?;
    let outcome = school::update_topics(&coll, "UCSD", &["Python", "Rust"]).await?;
    assert_eq!(outcome.matched, 1);

    assert_eq!(school::schools_by_topic(&coll, "Python").await?.len(), 2);
    assert_eq!(school::list_all(&coll).await?.len(), 2);
    assert!(server
        .list_database_names()
        .await?
        .contains(&"nosql_drills_test".to_string()));

    Ok(())
}

#[tokio::test]
async fn log_stats_against_mongo() -> Result<(), Box<dyn std::error::Error>> {
    let server = server().await?;
    let coll = server.collection("nosql_drills_test", "nginx");
    server
        .client()
        .database("nosql_drills_test")
        .collection::<mongodb::bson::Document>("nginx")
        .drop()
        .await?;

    for (method, path) in [("GET", "/status"), ("GET", "/"), ("PUT", "/x")] {
        coll.insert_one(mongodb::bson::doc! { "method": method, "path": path })
            .await?;
    }

    let stats = log_stats(&coll).await?;
    assert_eq!(stats.total, 3);
    assert_eq!(stats.status_checks, 1);
    assert_eq!(stats.methods[0].count, 2);
    assert_eq!(stats.methods[2].count, 1);

    Ok(())
}
