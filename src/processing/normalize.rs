//! Deterministic cleanup of freshly parsed data.
//!
//! [`normalize`] never fails: anything it cannot make sense of is left as text for the
//! validator to reject. Running it twice gives the same result as running it once.

use crate::config::{FieldRule, FieldSpec};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Canonicalize column names, trim cells, and coerce declared columns to their types.
///
/// - Column names: BOM and surrounding whitespace stripped, lowercased, internal runs of
///   whitespace or `-` replaced by a single `_`.
/// - Text cells are trimmed; cells that end up empty become [`Value::Null`].
/// - Declared columns are coerced cell by cell where the text is unambiguous (see
///   [`coerce`]); the schema field takes the declared type either way.
/// - Columns declared with [`FieldRule::Email`] are lowercased.
/// - Undeclared columns keep their current type.
pub fn normalize(dataset: &DataSet, declared: &[FieldSpec]) -> DataSet {
    let specs: Vec<Option<&FieldSpec>> = dataset
        .schema
        .fields
        .iter()
        .map(|f| {
            let name = canonical_column_name(&f.name);
            declared.iter().find(|spec| spec.name == name)
        })
        .collect();

    let schema = Schema::new(
        dataset
            .schema
            .fields
            .iter()
            .zip(&specs)
            .map(|(field, spec)| {
                let data_type = spec.map_or(field.data_type, |s| s.data_type);
                Field::new(canonical_column_name(&field.name), data_type)
            })
            .collect(),
    );

    // Read at the schema width; cells missing from a short row are Null.
    dataset.map_rows(schema, |row| {
        specs
            .iter()
            .enumerate()
            .map(|(i, spec)| normalize_cell(row.get(i).unwrap_or(&Value::Null), *spec))
            .collect()
    })
}

/// Canonical form of a column header.
pub fn canonical_column_name(raw: &str) -> String {
    let trimmed = raw.trim_matches(|c: char| c == '\u{feff}' || c.is_whitespace());
    let mut out = String::with_capacity(trimmed.len());
    let mut pending_separator = false;
    for c in trimmed.chars() {
        if c.is_whitespace() || c == '-' {
            pending_separator = true;
            continue;
        }
        if pending_separator && !out.is_empty() {
            out.push('_');
        }
        pending_separator = false;
        out.extend(c.to_lowercase());
    }
    out
}

fn normalize_cell(value: &Value, spec: Option<&FieldSpec>) -> Value {
    let value = match value {
        Value::Utf8(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Value::Null;
            }
            Value::Utf8(trimmed.to_owned())
        }
        other => other.clone(),
    };

    let Some(spec) = spec else {
        return value;
    };
    match (coerce(value, spec.data_type), spec.rule) {
        (Value::Utf8(s), FieldRule::Email) => Value::Utf8(s.to_lowercase()),
        (coerced, _) => coerced,
    }
}

/// Convert `value` to `data_type` when the conversion is lossless and unambiguous.
///
/// - `Int64`: integer text, or a finite float with no fractional part (`"7.0"`).
/// - `Float64`: any finite number.
/// - `Bool`: `true/false/t/f/yes/no/y/n/1/0`, case-insensitive.
/// - `Utf8`: any non-null value, rendered as text.
///
/// Values that do not convert are returned unchanged.
pub fn coerce(value: Value, data_type: DataType) -> Value {
    match (data_type, value) {
        (_, Value::Null) => Value::Null,
        (DataType::Int64, Value::Utf8(s)) => {
            if let Ok(v) = s.parse::<i64>() {
                return Value::Int64(v);
            }
            match s.parse::<f64>().ok().and_then(integral) {
                Some(v) => Value::Int64(v),
                None => Value::Utf8(s),
            }
        }
        (DataType::Int64, Value::Float64(f)) => match integral(f) {
            Some(v) => Value::Int64(v),
            None => Value::Float64(f),
        },
        (DataType::Float64, Value::Utf8(s)) => match s.parse::<f64>() {
            Ok(f) if f.is_finite() => Value::Float64(f),
            _ => Value::Utf8(s),
        },
        (DataType::Float64, Value::Int64(v)) => Value::Float64(v as f64),
        (DataType::Bool, Value::Utf8(s)) => match parse_bool(&s) {
            Some(b) => Value::Bool(b),
            None => Value::Utf8(s),
        },
        (DataType::Utf8, v @ (Value::Int64(_) | Value::Float64(_) | Value::Bool(_))) => {
            Value::Utf8(v.to_string())
        }
        (_, v) => v,
    }
}

fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "true" | "t" | "1" | "yes" | "y" => Some(true),
        "false" | "f" | "0" | "no" | "n" => Some(false),
        _ => None,
    }
}
