use std::fmt::Display;
use std::fmt::Formatter;

use redis::ToRedisArgs;

use crate::types::Error;
use crate::types::Result;

/// A scalar value accepted by [`Cache::store()`](crate::Cache::store).
///
/// Numbers go to the store as their decimal text, the same way the Redis client encodes them.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Str(String),
    Bytes(Vec<u8>),
    Int(i64),
    Float(f64),
}

impl CacheValue {
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Str(s) => s.as_bytes().to_vec(),
            Self::Bytes(b) => b.clone(),
            Self::Int(i) => i.to_redis_args().concat(),
            Self::Float(f) => f.to_redis_args().concat(),
        }
    }
}

// Literal-like rendering, used when recording call history.
impl Display for CacheValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Str(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "b\"{}\"", b.escape_ascii()),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<&str> for CacheValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for CacheValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&[u8]> for CacheValue {
    fn from(value: &[u8]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl<const N: usize> From<&[u8; N]> for CacheValue {
    fn from(value: &[u8; N]) -> Self {
        Self::Bytes(value.to_vec())
    }
}

impl From<Vec<u8>> for CacheValue {
    fn from(value: Vec<u8>) -> Self {
        Self::Bytes(value)
    }
}

impl From<i32> for CacheValue {
    fn from(value: i32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<u32> for CacheValue {
    fn from(value: u32) -> Self {
        Self::Int(value as i64)
    }
}

impl From<i64> for CacheValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for CacheValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

/// Conversion of raw stored bytes back into a typed value.
pub trait FromStoredBytes: Sized {
    fn from_stored_bytes(key: &str, bytes: Vec<u8>) -> Result<Self>;
}

fn decode_err(key: &str, reason: impl ToString) -> Error {
    Error::Decode {
        key:    key.to_string(),
        reason: reason.to_string(),
    }
}

impl FromStoredBytes for Vec<u8> {
    fn from_stored_bytes(_key: &str, bytes: Vec<u8>) -> Result<Self> {
        Ok(bytes)
    }
}

impl FromStoredBytes for String {
    fn from_stored_bytes(key: &str, bytes: Vec<u8>) -> Result<Self> {
        String::from_utf8(bytes).map_err(|e| decode_err(key, e))
    }
}

impl FromStoredBytes for i64 {
    fn from_stored_bytes(key: &str, bytes: Vec<u8>) -> Result<Self> {
        String::from_stored_bytes(key, bytes)?
            .trim()
            .parse()
            .map_err(|e| decode_err(key, e))
    }
}

impl FromStoredBytes for f64 {
    fn from_stored_bytes(key: &str, bytes: Vec<u8>) -> Result<Self> {
        String::from_stored_bytes(key, bytes)?
            .trim()
            .parse()
            .map_err(|e| decode_err(key, e))
    }
}
