//! Pipeline configuration.
//!
//! [`PipelineConfig::default`] is the users contract (`user_id`, `email`, `age`) with the
//! output layout other systems discover results by. A JSON file can override any part:
//!
//! ```json
//! {
//!   "schema": [
//!     { "name": "user_id", "data_type": "int64", "required": true, "rule": "positive" },
//!     { "name": "email", "data_type": "utf8", "required": true, "rule": "email" },
//!     { "name": "age", "data_type": "int64", "rule": { "range": { "min": 0, "max": 150 } } }
//!   ],
//!   "key_column": "user_id",
//!   "fingerprint_algorithm": "md5"
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::fingerprint::{ContentFingerprint, FingerprintAlgorithm};
use crate::pipeline::IngestionSeverity;
use crate::processing::canonical_column_name;
use crate::storage::ObjectLocation;
use crate::types::DataType;

/// Placeholder substituted with the content fingerprint in output templates.
pub const FINGERPRINT_PLACEHOLDER: &str = "{fingerprint}";

/// Extra per-value constraint applied by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRule {
    /// Type conformance only.
    #[default]
    None,
    /// `local@domain.tld` shape; values are lowercased during normalization.
    Email,
    /// Strictly greater than zero.
    Positive,
    /// Inclusive numeric range.
    Range { min: f64, max: f64 },
}

/// Declared column of the expected input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Canonical (normalized) column name.
    pub name: String,
    /// Semantic type values are coerced to.
    pub data_type: DataType,
    /// Required columns must exist and be non-empty in every valid row.
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub rule: FieldRule,
}

impl FieldSpec {
    /// A required field.
    pub fn required(name: impl Into<String>, data_type: DataType, rule: FieldRule) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: true,
            rule,
        }
    }

    /// An optional field: may be absent from the input or empty in a row.
    pub fn optional(name: impl Into<String>, data_type: DataType, rule: FieldRule) -> Self {
        Self {
            name: name.into(),
            data_type,
            required: false,
            rule,
        }
    }
}

/// Where run outputs are written, relative to the source bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputLayout {
    /// Valid, deduplicated rows. Its existence is the idempotency marker.
    pub processed_template: String,
    /// Invalid rows, or the whole file on a schema failure.
    pub error_template: String,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            processed_template: "processed/users_cleaned_{fingerprint}.csv".to_string(),
            error_template: "error/invalid_rows_{fingerprint}.csv".to_string(),
        }
    }
}

impl OutputLayout {
    /// Location of the processed artifact for this content.
    pub fn processed_location(
        &self,
        source: &ObjectLocation,
        fingerprint: &ContentFingerprint,
    ) -> ObjectLocation {
        source.with_key(render(&self.processed_template, fingerprint))
    }

    /// Location of the error artifact for this content.
    pub fn error_location(
        &self,
        source: &ObjectLocation,
        fingerprint: &ContentFingerprint,
    ) -> ObjectLocation {
        source.with_key(render(&self.error_template, fingerprint))
    }
}

fn render(template: &str, fingerprint: &ContentFingerprint) -> String {
    template.replace(FINGERPRINT_PLACEHOLDER, fingerprint.as_str())
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Expected columns, in output order of declaration.
    pub schema: Vec<FieldSpec>,
    /// Primary identifier used for deduplication.
    pub key_column: String,
    pub fingerprint_algorithm: FingerprintAlgorithm,
    pub layout: OutputLayout,
    /// Fatal errors at or above this severity are also reported as alerts.
    pub alert_at_or_above: IngestionSeverity,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: vec![
                FieldSpec::required("user_id", DataType::Int64, FieldRule::Positive),
                FieldSpec::required("email", DataType::Utf8, FieldRule::Email),
                FieldSpec::optional(
                    "age",
                    DataType::Int64,
                    FieldRule::Range {
                        min: 0.0,
                        max: 150.0,
                    },
                ),
            ],
            key_column: "user_id".to_string(),
            fingerprint_algorithm: FingerprintAlgorithm::default(),
            layout: OutputLayout::default(),
            alert_at_or_above: IngestionSeverity::Critical,
        }
    }
}

impl PipelineConfig {
    /// Load and validate a JSON config file. Missing keys fall back to defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> PipelineResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read(path).map_err(|e| PipelineError::Config {
            message: format!("cannot read {}: {e}", path.display()),
        })?;
        Self::from_json_slice(&raw)
    }

    /// Parse and validate a JSON config document.
    pub fn from_json_slice(raw: &[u8]) -> PipelineResult<Self> {
        let config: Self = serde_json::from_slice(raw).map_err(|e| PipelineError::Config {
            message: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Check internal consistency.
    ///
    /// - at least one field, no duplicate names, every name in canonical form
    /// - the key column is a declared, required field
    /// - both output templates are fingerprint-keyed and distinct
    /// - rules match their field type and range rules have `min <= max`
    pub fn validate(&self) -> PipelineResult<()> {
        let invalid = |message: String| Err(PipelineError::Config { message });

        if self.schema.is_empty() {
            return invalid("schema must declare at least one field".to_string());
        }
        for (i, field) in self.schema.iter().enumerate() {
            if field.name.trim().is_empty() {
                return invalid(format!("field #{i} has an empty name"));
            }
            let canonical = canonical_column_name(&field.name);
            if canonical != field.name {
                return invalid(format!(
                    "field '{}' is not a canonical column name (expected '{canonical}')",
                    field.name
                ));
            }
            if self.schema[..i].iter().any(|f| f.name == field.name) {
                return invalid(format!("field '{}' is declared twice", field.name));
            }
            let numeric = matches!(field.data_type, DataType::Int64 | DataType::Float64);
            match field.rule {
                FieldRule::None => {}
                FieldRule::Email if field.data_type == DataType::Utf8 => {}
                FieldRule::Positive if numeric => {}
                FieldRule::Range { min, max } if numeric => {
                    if min.is_nan() || max.is_nan() || min > max {
                        return invalid(format!("field '{}' has range min > max", field.name));
                    }
                }
                rule => {
                    return invalid(format!(
                        "rule {rule:?} does not apply to {} field '{}'",
                        field.data_type, field.name
                    ));
                }
            }
        }

        match self.schema.iter().find(|f| f.name == self.key_column) {
            Some(f) if f.required => {}
            Some(_) => {
                return invalid(format!(
                    "key column '{}' must be a required field",
                    self.key_column
                ));
            }
            None => {
                return invalid(format!(
                    "key column '{}' is not declared in the schema",
                    self.key_column
                ));
            }
        }

        for (name, template) in [
            ("processed_template", &self.layout.processed_template),
            ("error_template", &self.layout.error_template),
        ] {
            if !template.contains(FINGERPRINT_PLACEHOLDER) {
                return invalid(format!(
                    "{name} '{template}' must contain {FINGERPRINT_PLACEHOLDER}"
                ));
            }
        }
        if self.layout.processed_template == self.layout.error_template {
            return invalid("processed and error templates must differ".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldRule, PipelineConfig};
    use crate::error::PipelineError;
    use crate::fingerprint::{FingerprintAlgorithm, fingerprint};
    use crate::storage::ObjectLocation;
    use crate::types::DataType;

    #[test]
    fn default_config_is_valid() {
        PipelineConfig::default().validate().unwrap();
    }

    #[test]
    fn layout_is_keyed_by_fingerprint_not_source_name() {
        let config = PipelineConfig::default();
        let fp = fingerprint(b"abc", FingerprintAlgorithm::Md5);
        let a = ObjectLocation::new("landing", "incoming/a.csv");
        let b = ObjectLocation::new("landing", "other/b.csv");

        let processed = config.layout.processed_location(&a, &fp);
        assert_eq!(
            processed.key,
            "processed/users_cleaned_900150983cd24fb0d6963f7d28e17f72.csv"
        );
        assert_eq!(processed, config.layout.processed_location(&b, &fp));
        assert_eq!(
            config.layout.error_location(&a, &fp).key,
            "error/invalid_rows_900150983cd24fb0d6963f7d28e17f72.csv"
        );
    }

    #[test]
    fn json_overrides_merge_with_defaults() {
        let raw = br#"{
            "schema": [
                { "name": "user_id", "data_type": "int64", "required": true, "rule": "positive" },
                { "name": "score", "data_type": "float64", "rule": { "range": { "min": 0, "max": 1 } } }
            ],
            "fingerprint_algorithm": "sha256"
        }"#;
        let config = PipelineConfig::from_json_slice(raw).unwrap();

        assert_eq!(config.key_column, "user_id");
        assert_eq!(config.fingerprint_algorithm, FingerprintAlgorithm::Sha256);
        assert_eq!(config.schema[1].data_type, DataType::Float64);
        assert!(!config.schema[1].required);
        assert_eq!(config.schema[1].rule, FieldRule::Range { min: 0.0, max: 1.0 });
    }

    #[test]
    fn key_column_must_be_required() {
        let mut config = PipelineConfig::default();
        config.key_column = "age".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
        assert!(err.to_string().contains("must be a required field"));
    }

    #[test]
    fn field_names_must_be_canonical() {
        let raw = br#"{
            "schema": [
                { "name": "User_ID", "data_type": "int64", "required": true, "rule": "positive" },
                { "name": "email", "data_type": "utf8", "required": true, "rule": "email" }
            ],
            "key_column": "User_ID"
        }"#;
        let err = PipelineConfig::from_json_slice(raw).unwrap_err();
        assert!(matches!(err, PipelineError::Config { .. }));
        assert!(err.to_string().contains("expected 'user_id'"), "{err}");

        let mut config = PipelineConfig::default();
        config.schema[2].name = "Age ".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn templates_must_be_content_addressed() {
        let mut config = PipelineConfig::default();
        config.layout.processed_template = "processed/users_cleaned.csv".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("{fingerprint}"));
    }

    #[test]
    fn numeric_rule_on_text_field_is_rejected() {
        let mut config = PipelineConfig::default();
        config.schema[1].rule = FieldRule::Positive;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("does not apply to utf8 field 'email'"));
    }

    #[test]
    fn unknown_rule_is_rejected() {
        let raw = br#"{ "schema": [ { "name": "user_id", "data_type": "int64", "required": true, "rule": "bogus" } ] }"#;
        assert!(matches!(
            PipelineConfig::from_json_slice(raw),
            Err(PipelineError::Config { .. })
        ));
    }
}
