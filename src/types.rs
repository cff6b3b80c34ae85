use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Redis: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("MongoDB: {0}")]
    Mongo(#[from] mongodb::error::Error),

    #[error("HTTP: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Builder(#[from] fieldx::error::FieldXError),

    #[error("Failed to initialize tracing: {0}")]
    Tracing(#[from] tracing_subscriber::util::TryInitError),

    #[error(transparent)]
    Cli(#[from] clap::Error),

    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Operation against a key holding the wrong kind of value: '{key}'")]
    WrongType { key: String },

    #[error("Value under '{key}' is not an integer or out of range")]
    NotAnInteger { key: String },

    #[error("Cannot decode value under '{key}': {reason}")]
    Decode { key: String, reason: String },

    #[error("Duplicate key: {0}")]
    DuplicateKey(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

macro_rules! nderr {
    ($($arg:tt)*) => {
        $crate::types::Error::Other(format!($($arg)*))
    };
}

pub(crate) use nderr;
