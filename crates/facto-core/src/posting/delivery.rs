//! Peppol delivery state machine.
//!
//! Holds no state of its own: every call re-reads the invoice and partner
//! and decides from what the ledger reports.

use std::fmt;
use std::sync::Arc;

use facto_ledger::{many2one_id, LedgerBackend, Record, RecordId};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::record;
use crate::error::DeliveryError;

type Result<T> = std::result::Result<T, DeliveryError>;

/// Partner e-invoicing verification state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationState {
    NotVerified,
    Valid,
    NotValid,
    /// Anything else the server reports, including an unset field.
    Other(String),
}

impl VerificationState {
    /// Parse the `peppol_verification_state` field value.
    pub fn from_value(value: &Value) -> Self {
        match value.as_str() {
            Some("not_verified") => Self::NotVerified,
            Some("valid") => Self::Valid,
            Some("not_valid") => Self::NotValid,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(String::new()),
        }
    }

    /// Whether the endpoint check has concluded.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Valid | Self::NotValid)
    }
}

/// Invoice delivery state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveDeliveryState {
    Ready,
    ToSend,
    Processing,
    Done,
    Error,
    /// Unset or unrecognized.
    Other(String),
}

impl MoveDeliveryState {
    /// Parse the `peppol_move_state` field value.
    pub fn from_value(value: &Value) -> Self {
        match value.as_str() {
            Some("ready") => Self::Ready,
            Some("to_send") => Self::ToSend,
            Some("processing") => Self::Processing,
            Some("done") => Self::Done,
            Some("error") => Self::Error,
            Some(other) => Self::Other(other.to_string()),
            None => Self::Other(String::new()),
        }
    }
}

/// Non-failing delivery outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryOutcome {
    /// Handed to the send wizard now.
    Sent,
    /// A previous run already delivered it.
    AlreadySent,
    /// Partner verification was triggered; send manually or retry later.
    Pending,
}

impl DeliveryOutcome {
    /// Whether the invoice reached the network.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Sent | Self::AlreadySent)
    }
}

impl fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Sent => "Invoice sent via Peppol",
            Self::AlreadySent => "Already sent",
            Self::Pending => "Partner verification triggered: manual sending required",
        };
        f.write_str(text)
    }
}

/// Drives one invoice through partner verification and sending.
#[derive(Clone)]
pub struct DeliveryMachine {
    backend: Arc<dyn LedgerBackend>,
    sending_method: String,
}

impl DeliveryMachine {
    /// Create a machine sending through `sending_method` (normally `peppol`).
    pub fn new(backend: Arc<dyn LedgerBackend>, sending_method: impl Into<String>) -> Self {
        Self {
            backend,
            sending_method: sending_method.into(),
        }
    }

    /// Advance delivery of a posted invoice by one step.
    pub async fn deliver(&self, move_id: RecordId) -> Result<DeliveryOutcome> {
        let invoice = self
            .backend
            .read("account.move", &[move_id], &["partner_id", "peppol_move_state"])
            .await?
            .into_iter()
            .next()
            .ok_or(DeliveryError::InvoiceNotFound(move_id))?;

        let partner_id = invoice
            .get("partner_id")
            .and_then(many2one_id)
            .ok_or(DeliveryError::MissingPartner(move_id))?;
        let move_state = MoveDeliveryState::from_value(invoice.get("peppol_move_state").unwrap_or(&Value::Null));

        let partner = self
            .backend
            .read("res.partner", &[partner_id], &["peppol_verification_state"])
            .await?
            .into_iter()
            .next()
            .ok_or(DeliveryError::MissingPartner(move_id))?;
        let verification =
            VerificationState::from_value(partner.get("peppol_verification_state").unwrap_or(&Value::Null));

        if !verification.is_settled() {
            self.backend
                .action(
                    "res.partner",
                    "button_account_peppol_check_partner_endpoint",
                    &[partner_id],
                    Record::new(),
                )
                .await?;
            info!(move_id, partner_id, "Partner verification triggered");
            return Ok(DeliveryOutcome::Pending);
        }

        if verification == VerificationState::NotValid {
            warn!(move_id, partner_id, "Partner is not on Peppol");
            return Err(DeliveryError::PartnerNotReachable);
        }

        match move_state {
            MoveDeliveryState::Done => return Ok(DeliveryOutcome::AlreadySent),
            MoveDeliveryState::Error => return Err(DeliveryError::InvoiceInError),
            _ => {}
        }

        let wizard_id = self
            .backend
            .create(
                "account.move.send.wizard",
                record(json!({
                    "move_id": move_id,
                    "sending_methods": [self.sending_method],
                })),
            )
            .await?;
        self.backend
            .action("account.move.send.wizard", "action_send_and_print", &[wizard_id], Record::new())
            .await?;

        info!(move_id, "Invoice sent via {}", self.sending_method);
        Ok(DeliveryOutcome::Sent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use facto_ledger::MemoryBackend;

    /// A posted invoice for a partner in the given verification state.
    fn setup(verification: &str) -> (Arc<MemoryBackend>, DeliveryMachine, RecordId, RecordId) {
        let backend = Arc::new(MemoryBackend::with_reference_data());
        let partner_id = backend.insert(
            "res.partner",
            record(json!({ "name": "Acme", "peppol_verification_state": verification })),
        );
        let move_id = backend.insert(
            "account.move",
            record(json!({
                "partner_id": [partner_id, "Acme"],
                "state": "posted",
                "peppol_move_state": "ready",
            })),
        );
        let machine = DeliveryMachine::new(backend.clone(), "peppol");
        (backend, machine, partner_id, move_id)
    }

    #[tokio::test]
    async fn test_unverified_partner_triggers_check() {
        let (backend, machine, partner_id, move_id) = setup("not_verified");

        let outcome = machine.deliver(move_id).await.unwrap();
        assert_eq!(outcome, DeliveryOutcome::Pending);
        assert!(!outcome.is_delivered());
        assert_eq!(backend.count_calls("button_account_peppol_check_partner_endpoint"), 1);
        assert!(backend.records("account.move.send.wizard").is_empty());
        assert!(backend.calls().iter().all(|c| c.model != "account.move.send.wizard"));

        // The check settled the partner; the next pass sends
        let partner = &backend.records("res.partner")[0];
        assert_eq!(partner["id"], partner_id);
        assert_eq!(partner["peppol_verification_state"], "valid");
        assert_eq!(machine.deliver(move_id).await.unwrap(), DeliveryOutcome::Sent);
    }

    #[tokio::test]
    async fn test_valid_partner_sends() {
        let (backend, machine, _, move_id) = setup("valid");

        assert_eq!(machine.deliver(move_id).await.unwrap(), DeliveryOutcome::Sent);
        let wizards = backend.records("account.move.send.wizard");
        assert_eq!(wizards.len(), 1);
        assert_eq!(wizards[0]["sending_methods"], json!(["peppol"]));
        assert_eq!(backend.records("account.move")[0]["peppol_move_state"], "done");

        assert_eq!(machine.deliver(move_id).await.unwrap(), DeliveryOutcome::AlreadySent);
        assert_eq!(backend.count_calls("action_send_and_print"), 1);
    }

    #[tokio::test]
    async fn test_not_valid_partner_fails() {
        let (backend, machine, _, move_id) = setup("not_valid");
        let err = machine.deliver(move_id).await.unwrap_err();
        assert!(matches!(err, DeliveryError::PartnerNotReachable));
        assert_eq!(backend.count_calls("create"), 0);
    }

    #[tokio::test]
    async fn test_invoice_in_error_fails() {
        let (backend, machine, _, move_id) = setup("valid");
        backend.set_field("account.move", move_id, "peppol_move_state", json!("error"));
        assert!(matches!(machine.deliver(move_id).await, Err(DeliveryError::InvoiceInError)));
    }

    #[tokio::test]
    async fn test_unknown_invoice() {
        let (_, machine, _, _) = setup("valid");
        assert!(matches!(machine.deliver(999).await, Err(DeliveryError::Remote(_))));
    }

    #[test]
    fn test_state_parsing() {
        assert_eq!(VerificationState::from_value(&json!(false)), VerificationState::Other(String::new()));
        assert!(!VerificationState::from_value(&json!("not_verified")).is_settled());
        assert!(VerificationState::from_value(&json!("not_valid")).is_settled());
        assert_eq!(MoveDeliveryState::from_value(&json!("done")), MoveDeliveryState::Done);
    }
}
