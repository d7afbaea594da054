//! Row/column contract enforcement.
//!
//! Validation has two distinct failure tiers:
//!
//! - Column tier: a required column is absent. Nothing can be partitioned, so
//!   [`validate`] returns `Err(SchemaError)`.
//! - Row tier: a row breaks a constraint. That is a classification, not an error: the row
//!   lands in [`ValidationOutcome::invalid`] and the reason is recorded.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::config::{FieldRule, FieldSpec};
use crate::error::SchemaError;
use crate::types::{DataSet, DataType, Value};

/// Why a row was routed to the invalid partition.
#[derive(Debug, Clone, PartialEq)]
pub enum RejectReason {
    /// A required value is empty.
    Missing,
    /// The value is not of the declared type after normalization.
    TypeMismatch { expected: DataType },
    /// Not a `local@domain.tld` address.
    InvalidEmail,
    /// Numeric value is zero or negative.
    NotPositive,
    /// Numeric value outside the inclusive range.
    OutOfRange { min: f64, max: f64 },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::Missing => f.write_str("missing required value"),
            RejectReason::TypeMismatch { expected } => write!(f, "expected {expected}"),
            RejectReason::InvalidEmail => f.write_str("invalid email address"),
            RejectReason::NotPositive => f.write_str("must be greater than zero"),
            RejectReason::OutOfRange { min, max } => write!(f, "outside range [{min}, {max}]"),
        }
    }
}

/// First failed check of an invalid row.
#[derive(Debug, Clone, PartialEq)]
pub struct RowRejection {
    /// 0-based row index in the validated dataset.
    pub row: usize,
    pub column: String,
    pub reason: RejectReason,
}

/// Partition of one dataset. `valid.row_count() + invalid.row_count()` always equals the
/// input row count, and both partitions keep input order.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationOutcome {
    pub valid: DataSet,
    pub invalid: DataSet,
    /// One entry per invalid row, in row order.
    pub rejections: Vec<RowRejection>,
}

/// Check the column contract, then classify every row independently.
pub fn validate(dataset: &DataSet, declared: &[FieldSpec]) -> Result<ValidationOutcome, SchemaError> {
    let missing: Vec<String> = declared
        .iter()
        .filter(|spec| spec.required && dataset.schema.index_of(&spec.name).is_none())
        .map(|spec| spec.name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(SchemaError {
            missing,
            available: dataset.schema.field_names().map(str::to_owned).collect(),
        });
    }

    // Optional columns absent from the input have nothing to check.
    let bound: Vec<(usize, &FieldSpec)> = declared
        .iter()
        .filter_map(|spec| dataset.schema.index_of(&spec.name).map(|idx| (idx, spec)))
        .collect();

    let mut valid = dataset.empty_like();
    let mut invalid = dataset.empty_like();
    let mut rejections = Vec::new();

    for (row_idx, row) in dataset.rows.iter().enumerate() {
        let failure = bound.iter().find_map(|(idx, spec)| {
            let value = row.get(*idx).unwrap_or(&Value::Null);
            check_value(value, spec).err().map(|reason| (spec, reason))
        });

        match failure {
            None => valid.rows.push(row.clone()),
            Some((spec, reason)) => {
                rejections.push(RowRejection {
                    row: row_idx,
                    column: spec.name.clone(),
                    reason,
                });
                invalid.rows.push(row.clone());
            }
        }
    }

    Ok(ValidationOutcome {
        valid,
        invalid,
        rejections,
    })
}

fn check_value(value: &Value, spec: &FieldSpec) -> Result<(), RejectReason> {
    if value.is_null() {
        return if spec.required {
            Err(RejectReason::Missing)
        } else {
            Ok(())
        };
    }
    if !value.conforms_to(spec.data_type) {
        return Err(RejectReason::TypeMismatch {
            expected: spec.data_type,
        });
    }

    match spec.rule {
        FieldRule::None => Ok(()),
        FieldRule::Email => match value {
            Value::Utf8(s) if is_valid_email(s) => Ok(()),
            _ => Err(RejectReason::InvalidEmail),
        },
        FieldRule::Positive => match as_f64(value) {
            Some(v) if v > 0.0 => Ok(()),
            _ => Err(RejectReason::NotPositive),
        },
        FieldRule::Range { min, max } => match as_f64(value) {
            Some(v) if v >= min && v <= max => Ok(()),
            _ => Err(RejectReason::OutOfRange { min, max }),
        },
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Int64(v) => Some(*v as f64),
        Value::Float64(v) => Some(*v),
        _ => None,
    }
}

/// `local@domain.tld`: one `@`, no whitespace, at least two non-empty domain labels.
static EMAIL_PATTERN: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s.]+(\.[^@\s.]+)+$"));

fn is_valid_email(s: &str) -> bool {
    EMAIL_PATTERN
        .as_ref()
        .is_ok_and(|pattern| pattern.is_match(s))
}
