//! Search filters and record values exchanged with the accounting system.

use serde::ser::{Serialize, SerializeSeq, SerializeTuple, Serializer};
use serde_json::Value;

/// Remote record identifier.
pub type RecordId = i64;

/// Field values of a single remote record, keyed by field name.
pub type Record = serde_json::Map<String, Value>;

/// A single `[field, operator, value]` filter term.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub field: String,
    pub operator: String,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator: operator.into(),
            value: value.into(),
        }
    }

    /// Evaluate the condition against a locally held record.
    pub(crate) fn matches(&self, record: &Record) -> bool {
        let actual = record.get(&self.field).unwrap_or(&Value::Bool(false));

        match self.operator.as_str() {
            "=" => values_equal(actual, &self.value),
            "!=" => !values_equal(actual, &self.value),
            "in" => self
                .value
                .as_array()
                .map(|options| options.iter().any(|v| values_equal(actual, v)))
                .unwrap_or(false),
            _ => false,
        }
    }
}

impl Serialize for Condition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut tuple = serializer.serialize_tuple(3)?;
        tuple.serialize_element(&self.field)?;
        tuple.serialize_element(&self.operator)?;
        tuple.serialize_element(&self.value)?;
        tuple.end()
    }
}

/// An implicit-AND list of conditions, serialized the way Odoo expects a
/// search domain: `[["code", "=", "700000"], ...]`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Domain {
    conditions: Vec<Condition>,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an exact-match term.
    pub fn field_eq(self, field: &str, value: impl Into<Value>) -> Self {
        self.with(Condition::new(field, "=", value))
    }

    /// Add an arbitrary term.
    pub fn with(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub(crate) fn matches(&self, record: &Record) -> bool {
        self.conditions.iter().all(|c| c.matches(record))
    }
}

impl Serialize for Domain {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.conditions.len()))?;
        for condition in &self.conditions {
            seq.serialize_element(condition)?;
        }
        seq.end()
    }
}

/// Extract the id from a many2one field value.
///
/// Odoo returns `[id, "display name"]` for a set relation and `false` for an
/// empty one; locally stored records may hold the bare id.
pub fn many2one_id(value: &Value) -> Option<RecordId> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::Array(items) => items.first().and_then(Value::as_i64),
        _ => None,
    }
}

fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(b)) => match (a.as_f64(), b.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => false,
        },
        (Value::Array(_), Value::Number(_)) => many2one_id(actual) == many2one_id(expected),
        _ => actual == expected,
    }
}
