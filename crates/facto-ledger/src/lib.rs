//! Accounting-system abstraction layer for facto.
//!
//! This crate provides a unified interface for the remote calls the posting
//! pipeline needs from the accounting system:
//! - `json2` talks to a live Odoo instance over its JSON-2 HTTP API
//! - `memory` keeps records in-process for tests and dry runs

mod backend;
mod domain;
mod error;

pub use backend::LedgerBackend;
pub use backend::memory::{CallRecord, MemoryBackend};
pub use domain::{many2one_id, Condition, Domain, Record, RecordId};
pub use error::LedgerError;

#[cfg(feature = "json2")]
pub use backend::json2::{Json2Backend, UserContext};

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
