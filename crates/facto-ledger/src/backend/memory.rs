//! In-memory ledger for tests and dry runs.
//!
//! Implements the slice of accounting-system behaviour the pipeline relies on:
//! exact-match search, create with server-side defaults, posting, partner
//! verification and the send wizard.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use crate::domain::many2one_id;
use crate::error::LedgerError;
use crate::{Domain, LedgerBackend, Record, RecordId, Result};

/// One call made against the backend, in order of arrival.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub model: String,
    pub method: String,
}

/// Backend keeping every record in process memory.
pub struct MemoryBackend {
    state: Mutex<MemoryState>,
}

struct MemoryState {
    next_id: RecordId,
    models: HashMap<String, BTreeMap<RecordId, Record>>,
    calls: Vec<CallRecord>,
    failures: HashMap<(String, String), String>,
    verification_outcome: String,
}

impl MemoryBackend {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState {
                next_id: 1,
                models: HashMap::new(),
                calls: Vec::new(),
                failures: HashMap::new(),
                verification_outcome: "valid".to_string(),
            }),
        }
    }

    /// Create a ledger seeded with the reference data a Belgian sales
    /// company has configured: sales account, the three sale taxes, the sales
    /// journal and the home country.
    pub fn with_reference_data() -> Self {
        let backend = Self::new();

        backend.insert("account.account", record(json!({ "code": "700000", "name": "Sales" })));
        for rate in [0.0, 6.0, 21.0] {
            backend.insert(
                "account.tax",
                record(json!({
                    "name": format!("{}%", rate),
                    "amount": rate,
                    "type_tax_use": "sale",
                    "active": true,
                })),
            );
        }
        backend.insert("account.journal", record(json!({ "code": "VF", "name": "Verkoopfacturen" })));
        backend.insert("res.country", record(json!({ "code": "BE", "name": "Belgium" })));

        backend
    }

    /// Store a record directly, bypassing the call log and server defaults.
    pub fn insert(&self, model: &str, values: Record) -> RecordId {
        let mut state = self.state();
        let id = state.allocate_id();
        state.models.entry(model.to_string()).or_default().insert(id, values);
        id
    }

    /// Overwrite a single field of a stored record.
    pub fn set_field(&self, model: &str, id: RecordId, field: &str, value: Value) {
        let mut state = self.state();
        if let Some(record) = state.models.get_mut(model).and_then(|m| m.get_mut(&id)) {
            record.insert(field.to_string(), value);
        }
    }

    /// Verification state a partner lands in when its endpoint check runs.
    pub fn set_verification_outcome(&self, outcome: &str) {
        self.state().verification_outcome = outcome.to_string();
    }

    /// Make the next `model.method` call fail with `message`.
    pub fn fail_next(&self, model: &str, method: &str, message: &str) {
        self.state()
            .failures
            .insert((model.to_string(), method.to_string()), message.to_string());
    }

    /// All calls received so far.
    pub fn calls(&self) -> Vec<CallRecord> {
        self.state().calls.clone()
    }

    /// Number of calls to `method` on any model.
    pub fn count_calls(&self, method: &str) -> usize {
        self.state().calls.iter().filter(|c| c.method == method).count()
    }

    /// Snapshot of the stored records of `model`, each including its `id`.
    pub fn records(&self, model: &str) -> Vec<Record> {
        let state = self.state();
        state
            .models
            .get(model)
            .map(|records| {
                records
                    .iter()
                    .map(|(id, values)| {
                        let mut values = values.clone();
                        values.insert("id".to_string(), json!(id));
                        values
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn allocate_id(&mut self) -> RecordId {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    /// Log the call and fire any armed failure for it.
    fn enter(&mut self, model: &str, method: &str) -> Result<()> {
        self.calls.push(CallRecord {
            model: model.to_string(),
            method: method.to_string(),
        });

        match self.failures.remove(&(model.to_string(), method.to_string())) {
            Some(message) => Err(LedgerError::remote(model, method, message)),
            None => Ok(()),
        }
    }

    fn record_mut(&mut self, model: &str, method: &str, id: RecordId) -> Result<&mut Record> {
        self.models
            .get_mut(model)
            .and_then(|records| records.get_mut(&id))
            .ok_or_else(|| LedgerError::remote(model, method, format!("record {} does not exist", id)))
    }

    fn post_moves(&mut self, ids: &[RecordId]) -> Result<Value> {
        for &id in ids {
            let record = self.record_mut("account.move", "action_post", id)?;
            if record.get("state").and_then(Value::as_str) == Some("posted") {
                return Err(LedgerError::remote(
                    "account.move",
                    "action_post",
                    "only draft journal entries can be posted",
                ));
            }
            record.insert("state".to_string(), json!("posted"));
        }
        Ok(Value::Bool(true))
    }

    fn check_partner_endpoints(&mut self, ids: &[RecordId]) -> Result<Value> {
        let outcome = self.verification_outcome.clone();
        for &id in ids {
            let record = self.record_mut("res.partner", "button_account_peppol_check_partner_endpoint", id)?;
            record.insert("peppol_verification_state".to_string(), json!(outcome));
        }
        Ok(Value::Bool(true))
    }

    fn send_and_print(&mut self, ids: &[RecordId]) -> Result<Value> {
        for &id in ids {
            let wizard = self.record_mut("account.move.send.wizard", "action_send_and_print", id)?;
            let move_id = wizard
                .get("move_id")
                .and_then(many2one_id)
                .ok_or_else(|| {
                    LedgerError::remote("account.move.send.wizard", "action_send_and_print", "wizard has no move")
                })?;

            let invoice = self.record_mut("account.move", "action_send_and_print", move_id)?;
            if invoice.get("state").and_then(Value::as_str) != Some("posted") {
                return Err(LedgerError::remote(
                    "account.move.send.wizard",
                    "action_send_and_print",
                    "only posted invoices can be sent",
                ));
            }
            invoice.insert("peppol_move_state".to_string(), json!("done"));
        }
        Ok(json!({ "type": "ir.actions.act_window_close" }))
    }
}

#[async_trait]
impl LedgerBackend for MemoryBackend {
    async fn search(&self, model: &str, domain: &Domain, limit: Option<usize>) -> Result<Vec<RecordId>> {
        let mut state = self.state();
        state.enter(model, "search")?;

        let ids = state
            .models
            .get(model)
            .map(|records| {
                records
                    .iter()
                    .filter(|(_, values)| domain.matches(values))
                    .map(|(id, _)| *id)
                    .take(limit.unwrap_or(usize::MAX))
                    .collect()
            })
            .unwrap_or_default();

        Ok(ids)
    }

    async fn read(&self, model: &str, ids: &[RecordId], fields: &[&str]) -> Result<Vec<Record>> {
        let mut state = self.state();
        state.enter(model, "read")?;

        let mut result = Vec::with_capacity(ids.len());
        for &id in ids {
            let stored = state.record_mut(model, "read", id)?;
            let mut values = Record::new();
            values.insert("id".to_string(), json!(id));
            for field in fields {
                let value = stored.get(*field).cloned().unwrap_or(Value::Bool(false));
                values.insert((*field).to_string(), value);
            }
            result.push(values);
        }

        Ok(result)
    }

    async fn create(&self, model: &str, mut values: Record) -> Result<RecordId> {
        let mut state = self.state();
        state.enter(model, "create")?;

        match model {
            "account.move" => {
                values.entry("state").or_insert_with(|| json!("draft"));
                values.entry("peppol_move_state").or_insert_with(|| json!("ready"));
            }
            "res.partner" => {
                // The server verifies the endpoint on create when the partner
                // is set up for Peppol and has an identifier to look up
                let has_vat = values.get("vat").and_then(Value::as_str).is_some_and(|v| !v.is_empty());
                let on_peppol = values.get("invoice_sending_method").and_then(Value::as_str) == Some("peppol");
                let initial = if has_vat && on_peppol {
                    state.verification_outcome.clone()
                } else {
                    "not_verified".to_string()
                };
                values.entry("peppol_verification_state").or_insert_with(|| json!(initial));
            }
            "account.move.send.wizard" => {
                let move_id = values.get("move_id").and_then(many2one_id);
                let exists = move_id
                    .map(|id| state.models.get("account.move").is_some_and(|m| m.contains_key(&id)))
                    .unwrap_or(false);
                if !exists {
                    return Err(LedgerError::remote(model, "create", "move_id does not reference an invoice"));
                }
            }
            _ => {}
        }

        let id = state.allocate_id();
        state.models.entry(model.to_string()).or_default().insert(id, values);
        debug!("memory ledger created {}({})", model, id);
        Ok(id)
    }

    async fn action(&self, model: &str, method: &str, ids: &[RecordId], _kwargs: Record) -> Result<Value> {
        let mut state = self.state();
        state.enter(model, method)?;

        match (model, method) {
            ("account.move", "action_post") => state.post_moves(ids),
            ("res.partner", "button_account_peppol_check_partner_endpoint") => state.check_partner_endpoints(ids),
            ("account.move.send.wizard", "action_send_and_print") => state.send_and_print(ids),
            _ => Err(LedgerError::remote(model, method, "method not found")),
        }
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Build a record from a JSON object literal.
fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        _ => Record::new(),
    }
}
