//! Primary-key deduplication.

use std::collections::HashSet;

use crate::error::SchemaError;
use crate::types::{DataSet, Value};

/// Type-aware key identity: `Int64(7)` and `Utf8("7")` are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum KeyIdentity {
    Int(i64),
    Float(u64),
    Bool(bool),
    Text(String),
}

impl KeyIdentity {
    fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Null => None,
            Value::Int64(v) => Some(Self::Int(*v)),
            // -0.0 and 0.0 are the same key.
            Value::Float64(v) => Some(Self::Float((v + 0.0).to_bits())),
            Value::Bool(v) => Some(Self::Bool(*v)),
            Value::Utf8(s) => Some(Self::Text(s.clone())),
        }
    }
}

/// Keep the first row for every distinct value of `key_column`, in input order.
///
/// Later rows with an already-seen key are dropped even if their other fields differ.
/// Rows with a `Null` key are never merged with each other.
pub fn dedupe(dataset: &DataSet, key_column: &str) -> Result<DataSet, SchemaError> {
    let Some(idx) = dataset.schema.index_of(key_column) else {
        return Err(SchemaError {
            missing: vec![key_column.to_string()],
            available: dataset.schema.field_names().map(str::to_owned).collect(),
        });
    };

    let mut seen = HashSet::new();
    Ok(dataset.filter_rows(|row| {
        match row.get(idx).and_then(KeyIdentity::of) {
            Some(key) => seen.insert(key),
            None => true,
        }
    }))
}
