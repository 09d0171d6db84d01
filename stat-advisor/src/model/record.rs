//! Raw tabular records and value helpers.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fields of one table inside a record, keyed by field name.
pub type TableData = BTreeMap<String, Value>;

/// Completion state of a data-entry record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    Complete,
    Incomplete,
    Draft,
    #[serde(other)]
    Other,
}

/// One subject's data, grouped by table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    #[serde(default)]
    pub id: Option<String>,
    pub status: RecordStatus,
    #[serde(default)]
    pub data: BTreeMap<String, TableData>,
}

impl Record {
    /// Creates an empty record with the given status.
    pub fn new(status: RecordStatus) -> Self {
        Self {
            id: None,
            status,
            data: BTreeMap::new(),
        }
    }

    /// Creates an empty complete record.
    pub fn complete() -> Self {
        Self::new(RecordStatus::Complete)
    }

    /// Sets a field value in the named table, creating the table if needed.
    pub fn with_field(
        mut self,
        table: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.data
            .entry(table.into())
            .or_default()
            .insert(field.into(), value.into());
        self
    }

    pub fn is_complete(&self) -> bool {
        self.status == RecordStatus::Complete
    }
}

/// Returns true for values that count as "present but empty".
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Interprets a value as a number.
///
/// Numeric strings are parsed and booleans map to 1/0; everything else,
/// including non-finite results, yields `None`.
pub fn as_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Interprets a value as a category label.
///
/// Multi-select arrays become a comma-joined label so each distinct
/// combination is its own category.
pub fn as_category(value: &Value) -> Option<String> {
    if is_blank(value) {
        return None;
    }
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let labels: Vec<String> = items.iter().filter_map(as_category).collect();
            (!labels.is_empty()).then(|| labels.join(","))
        }
        Value::Object(_) => Some(value.to_string()),
        Value::Null => None,
    }
}
