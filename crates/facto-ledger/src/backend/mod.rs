//! Ledger backend implementations.

#[cfg(feature = "json2")]
pub mod json2;

pub mod memory;

use async_trait::async_trait;
use serde_json::Value;

use crate::{Domain, Record, RecordId, Result};

/// Trait for accounting-system backends.
///
/// This trait abstracts over the transport so the resolver, poster and
/// delivery state machine run unchanged against a live server (via JSON-2)
/// and against the in-memory ledger used by tests and dry runs.
#[async_trait]
pub trait LedgerBackend: Send + Sync {
    /// Return the ids of records in `model` matching `domain`.
    async fn search(&self, model: &str, domain: &Domain, limit: Option<usize>) -> Result<Vec<RecordId>>;

    /// Read `fields` of the given records. Every returned record carries `id`.
    async fn read(&self, model: &str, ids: &[RecordId], fields: &[&str]) -> Result<Vec<Record>>;

    /// Create one record and return its id.
    async fn create(&self, model: &str, values: Record) -> Result<RecordId>;

    /// Invoke a named record action (button) on `ids`.
    async fn action(&self, model: &str, method: &str, ids: &[RecordId], kwargs: Record) -> Result<Value>;

    /// Short backend name for log lines.
    fn name(&self) -> &'static str;
}
