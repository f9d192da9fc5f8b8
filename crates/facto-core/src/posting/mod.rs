//! Posting parsed invoices to the accounting system and delivering them.
//!
//! - [`EntityResolver`] maps labels (VAT number, journal code, tax rate) to remote ids
//! - [`InvoicePoster`] creates, attaches and posts an invoice exactly once per number
//! - [`DeliveryMachine`] walks the partner-verification and Peppol send states

mod delivery;
mod poster;
mod resolver;

pub use delivery::{DeliveryMachine, DeliveryOutcome, MoveDeliveryState, VerificationState};
pub use poster::{InvoicePoster, PostStatus, PostedInvoice};
pub use resolver::EntityResolver;

use facto_ledger::Record;
use serde_json::Value;

/// Turn a `json!` object literal into a record; anything else is empty.
pub(crate) fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
