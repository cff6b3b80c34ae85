use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clap::error::ErrorKind;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use fieldx::fxstruct;
use garde::Validate;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use tracing::debug;
use tracing::instrument;

use crate::cache::Cache;
use crate::doc::DocumentServer;
use crate::doc::MemoryServer;
use crate::doc::MongoServer;
use crate::kv::KeyValueStore;
use crate::kv::MemoryStore;
use crate::kv::RedisStore;
use crate::log_stats::log_stats;
use crate::page::HttpFetcher;
use crate::page::PageCache;
use crate::school;
use crate::school::SchoolLine;
use crate::types::Error;
use crate::types::Result;
use crate::value::CacheValue;

#[derive(Debug, Clone, clap::Parser, Validate)]
#[fxstruct(no_new, get(copy))]
#[clap(about, version, name = "nosql-drills")]
pub(crate) struct Cli {
    /// Redis connection URL.
    #[fieldx(get(clone))]
    #[garde(skip)]
    #[clap(long, global = true, env = "NOSQL_REDIS_URL", default_value = "redis://127.0.0.1/")]
    redis_url: String,

    /// MongoDB connection string.
    #[fieldx(get(clone))]
    #[garde(skip)]
    #[clap(long, global = true, env = "NOSQL_MONGO_URI", default_value = "mongodb://127.0.0.1:27017")]
    mongo_uri: String,

    #[fieldx(get(clone))]
    #[garde(dive)]
    #[clap(subcommand)]
    subcommand: Command,
}

#[derive(Debug, Clone, Subcommand, Validate)]
pub(crate) enum Command {
    /// List databases of the MongoDB server.
    ListDbs,

    /// Work with school documents.
    Schools {
        #[clap(long, default_value = "my_db")]
        #[garde(skip)]
        db: String,

        #[clap(long, default_value = "school")]
        #[garde(skip)]
        collection: String,

        #[clap(subcommand)]
        #[garde(skip)]
        action: SchoolAction,
    },

    /// Print statistics of nginx access logs.
    LogStats {
        #[clap(long, default_value = "logs")]
        #[garde(skip)]
        db: String,

        #[clap(long, default_value = "nginx")]
        #[garde(skip)]
        collection: String,

        /// Print as JSON.
        #[clap(long)]
        #[garde(skip)]
        json: bool,
    },

    /// Store values under random keys and replay the call history.
    Cache {
        #[clap(subcommand)]
        #[garde(skip)]
        action: CacheAction,
    },

    /// Fetch web pages through the page cache.
    Page {
        #[clap(subcommand)]
        #[garde(dive)]
        action: PageAction,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum SchoolAction {
    /// List all schools.
    List,
    /// Insert a new school.
    Insert { name: String, topics: Vec<String> },
    /// Replace topics of the schools with the given name.
    Update { name: String, topics: Vec<String> },
    /// List schools having the topic.
    ByTopic { topic: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum ValueKind {
    Str,
    Bytes,
    Int,
    Float,
}

#[derive(Debug, Clone, Subcommand)]
pub(crate) enum CacheAction {
    /// Store a value and print its key.
    Store {
        value: String,

        /// How to interpret the value.
        #[clap(long, value_enum, default_value_t = ValueKind::Str)]
        kind: ValueKind,

        /// Flush the database first.
        #[clap(long)]
        flush: bool,
    },
    /// Print the history of store calls.
    Replay,
}

#[derive(Debug, Clone, Subcommand, Validate)]
pub(crate) enum PageAction {
    /// Fetch a page, serving it from the cache when possible.
    Get {
        #[garde(skip)]
        url: String,

        /// Seconds to keep the fetched page cached.
        #[clap(long, default_value_t = 10)]
        #[garde(range(min = 1))]
        ttl: u64,
    },
}

fn invalid_value(raw: &str, kind: ValueKind, err: impl std::fmt::Display) -> Error {
    Error::InvalidArgs(format!("'{raw}' is not a valid {kind:?}: {err}"))
}

fn parse_value(raw: String, kind: ValueKind) -> Result<CacheValue> {
    Ok(match kind {
        ValueKind::Str => CacheValue::Str(raw),
        ValueKind::Bytes => CacheValue::Bytes(raw.into_bytes()),
        ValueKind::Int => CacheValue::Int(raw.parse().map_err(|e| invalid_value(&raw, kind, e))?),
        ValueKind::Float => CacheValue::Float(raw.parse().map_err(|e| invalid_value(&raw, kind, e))?),
    })
}

fn render_id(id: &Bson) -> String {
    match id {
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

/// Where the drills get their stores from.
#[async_trait]
pub trait Backends: Send + Sync + 'static {
    type KeyValue: KeyValueStore;
    type Documents: DocumentServer;

    async fn key_value(&self, url: &str) -> Result<Arc<Self::KeyValue>>;
    async fn documents(&self, uri: &str) -> Result<Self::Documents>;
}

/// Connects to real Redis and MongoDB servers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LiveBackends;

#[async_trait]
impl Backends for LiveBackends {
    type Documents = MongoServer;
    type KeyValue = RedisStore;

    async fn key_value(&self, url: &str) -> Result<Arc<RedisStore>> {
        Ok(Arc::new(RedisStore::connect(url).await?))
    }

    async fn documents(&self, uri: &str) -> Result<MongoServer> {
        MongoServer::connect(uri).await
    }
}

/// In-process stores, shared across invocations of the same [`App`].
#[derive(Debug, Clone, Default)]
pub struct MemoryBackends {
    pub key_value: Arc<MemoryStore>,
    pub documents: MemoryServer,
}

#[async_trait]
impl Backends for MemoryBackends {
    type Documents = MemoryServer;
    type KeyValue = MemoryStore;

    async fn key_value(&self, _url: &str) -> Result<Arc<MemoryStore>> {
        Ok(self.key_value.clone())
    }

    async fn documents(&self, _uri: &str) -> Result<MemoryServer> {
        Ok(self.documents.clone())
    }
}

pub struct App<B: Backends> {
    backends: B,
    cli_args: Option<Vec<String>>,
}

impl App<LiveBackends> {
    /// Entry point of the command line tool.
    pub async fn run() -> Result<()> {
        Self::setup_tracing()?;
        let app = App::new(LiveBackends);
        if let Some(output) = app.execute().await? {
            println!("{output}");
        }
        Ok(())
    }

    fn setup_tracing() -> Result<()> {
        use tracing_subscriber::layer::SubscriberExt;
        use tracing_subscriber::util::SubscriberInitExt;

        let filter = tracing_subscriber::EnvFilter::from_default_env();

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()?;

        debug!("Tracing initialized");

        Ok(())
    }
}

impl<B: Backends> App<B> {
    pub fn new(backends: B) -> Self {
        Self {
            backends,
            cli_args: None,
        }
    }

    /// Use these arguments instead of the process command line. The first one is the program name.
    pub fn with_args<S: ToString>(mut self, args: &[S]) -> Self {
        self.cli_args = Some(args.iter().map(|a| a.to_string()).collect());
        self
    }

    fn cli(&self) -> Result<Cli, clap::Error> {
        match self.cli_args {
            Some(ref args) => Cli::try_parse_from(args),
            None => Cli::try_parse(),
        }
    }

    /// Parse the arguments and run the subcommand. Returns the text to be printed, if any.
    pub async fn execute(&self) -> Result<Option<String>> {
        let cli = match self.cli() {
            Ok(cli) => cli,
            Err(err) => match err.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                    return Ok(Some(err.render().to_string()));
                }
                _ => {
                    return Err(err.into());
                }
            },
        };

        cli.validate().map_err(|report| Error::InvalidArgs(report.to_string()))?;

        self.dispatch(&cli).await
    }

    #[instrument(level = "debug", skip(self))]
    async fn dispatch(&self, cli: &Cli) -> Result<Option<String>> {
        let output = match cli.subcommand() {
            Command::ListDbs => {
                let server = self.backends.documents(&cli.mongo_uri()).await?;
                server.list_database_names().await?.join("\n")
            }
            Command::Schools { db, collection, action } => {
                let server = self.backends.documents(&cli.mongo_uri()).await?;
                let coll = server.collection(&db, &collection);
                match action {
                    SchoolAction::List => Self::school_lines(school::list_all(&coll).await?),
                    SchoolAction::Insert { name, topics } => {
                        match school::insert_school(&coll, &name, topics.as_slice()).await? {
                            Some(id) => render_id(&id),
                            None => format!("School '{name}' already exists"),
                        }
                    }
                    SchoolAction::Update { name, topics } => {
                        let outcome = school::update_topics(&coll, &name, topics.as_slice()).await?;
                        format!("Matched {}, modified {}", outcome.matched, outcome.modified)
                    }
                    SchoolAction::ByTopic { topic } => Self::school_lines(school::schools_by_topic(&coll, &topic).await?),
                }
            }
            Command::LogStats { db, collection, json } => {
                let server = self.backends.documents(&cli.mongo_uri()).await?;
                let stats = log_stats(&server.collection(&db, &collection)).await?;
                if json {
                    serde_json::to_string_pretty(&stats)?
                }
                else {
                    stats.to_string()
                }
            }
            Command::Cache { action } => {
                let cache = Cache::builder()
                    .backend(self.backends.key_value(&cli.redis_url()).await?)
                    .build()?;
                match action {
                    CacheAction::Store { value, kind, flush } => {
                        if flush {
                            cache.flush().await?;
                        }
                        let key = cache.store(parse_value(value, kind)?).await?;
                        let stored = cache.get_raw(&key).await?.unwrap_or_default();
                        format!("{key}\n{}", CacheValue::Bytes(stored))
                    }
                    CacheAction::Replay => cache.replay("store").await?.to_string(),
                }
            }
            Command::Page {
                action: PageAction::Get { url, ttl },
            } => {
                let pages = PageCache::builder()
                    .backend(self.backends.key_value(&cli.redis_url()).await?)
                    .fetcher(Arc::new(HttpFetcher::default()))
                    .ttl(Duration::from_secs(ttl))
                    .build()?;
                let body = pages.get_page(&url).await?;
                debug!("{url} accessed {} times", pages.access_count(&url).await?);
                body
            }
        };

        Ok((!output.is_empty()).then_some(output))
    }

    fn school_lines(docs: Vec<Document>) -> String {
        docs.iter()
            .map(|d| SchoolLine(d).to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
