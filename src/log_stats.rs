use std::fmt::Display;
use std::fmt::Formatter;

use mongodb::bson::doc;
use serde::Serialize;
use tracing::instrument;

use crate::doc::DocumentCollection;
use crate::types::Result;

/// HTTP methods reported by [`log_stats()`], in reporting order.
pub const METHODS: [&str; 5] = ["GET", "POST", "PUT", "PATCH", "DELETE"];

pub const STATUS_PATH: &str = "/status";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodCount {
    pub method: String,
    pub count:  u64,
}

/// Statistics over a collection of nginx access log records with `method` and `path` fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogStats {
    pub total:         u64,
    pub methods:       Vec<MethodCount>,
    pub status_checks: u64,
}

#[instrument(level = "debug", skip(coll))]
pub async fn log_stats<C: DocumentCollection + ?Sized>(coll: &C) -> Result<LogStats> {
    let total = coll.count_documents(doc! {}).await?;

    let mut methods = Vec::with_capacity(METHODS.len());
    for method in METHODS {
        methods.push(MethodCount {
            method: method.to_string(),
            count:  coll.count_documents(doc! { "method": method }).await?,
        });
    }

    let status_checks = coll
        .count_documents(doc! { "method": "GET", "path": STATUS_PATH })
        .await?;

    Ok(LogStats {
        total,
        methods,
        status_checks,
    })
}

impl Display for LogStats {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{} logs", self.total)?;
        writeln!(f, "Methods:")?;
        for mc in &self.methods {
            writeln!(f, "    method {}: {}", mc.method, mc.count)?;
        }
        write!(f, "{} status check", self.status_checks)
    }
}
