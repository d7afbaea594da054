//! Core data model types for the ingestion pipeline.
//!
//! A parsed file becomes an in-memory [`DataSet`]: an ordered list of rows sharing one
//! [`Schema`] (a list of typed [`Field`]s). Every pipeline stage consumes a `DataSet` by
//! reference and hands back a new one, so no stage observes another stage's mutation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Logical data type for a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// 64-bit signed integer.
    Int64,
    /// 64-bit floating point number.
    Float64,
    /// Boolean.
    Bool,
    /// UTF-8 string.
    Utf8,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Int64 => "int64",
            DataType::Float64 => "float64",
            DataType::Bool => "bool",
            DataType::Utf8 => "utf8",
        };
        f.write_str(name)
    }
}

/// A single named, typed field in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Field/column name.
    pub name: String,
    /// Field data type.
    pub data_type: DataType,
}

impl Field {
    /// Create a new field.
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// Ordered column layout of a [`DataSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    /// Ordered list of fields.
    pub fields: Vec<Field>,
}

impl Schema {
    /// Create a new schema from fields.
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields }
    }

    /// Iterate field names in order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Returns the index of the first field with this name, if present.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }
}

/// A single typed cell in a [`DataSet`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Missing/empty value.
    Null,
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit float.
    Float64(f64),
    /// Boolean.
    Bool(bool),
    /// UTF-8 string.
    Utf8(String),
}

impl Value {
    /// Returns `true` for [`Value::Null`].
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Returns `true` when the value is stored as the given logical type.
    ///
    /// `Null` conforms to every type; presence is checked separately.
    pub fn conforms_to(&self, data_type: DataType) -> bool {
        matches!(
            (self, data_type),
            (Value::Null, _)
                | (Value::Int64(_), DataType::Int64)
                | (Value::Float64(_), DataType::Float64)
                | (Value::Bool(_), DataType::Bool)
                | (Value::Utf8(_), DataType::Utf8)
        )
    }
}

/// Renders the value the way it is written to a CSV cell (`Null` is empty).
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Int64(v) => write!(f, "{v}"),
            Value::Float64(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Utf8(s) => f.write_str(s),
        }
    }
}

/// In-memory tabular dataset.
///
/// Rows are stored as `Vec<Vec<Value>>` in the same order as the [`Schema`] fields.
#[derive(Debug, Clone, PartialEq)]
pub struct DataSet {
    /// Schema describing row shape.
    pub schema: Schema,
    /// Row-major value storage.
    pub rows: Vec<Vec<Value>>,
}

impl DataSet {
    /// Create a dataset from schema and rows.
    pub fn new(schema: Schema, rows: Vec<Vec<Value>>) -> Self {
        Self { schema, rows }
    }

    /// An empty dataset sharing this dataset's schema.
    pub fn empty_like(&self) -> Self {
        Self {
            schema: self.schema.clone(),
            rows: Vec::new(),
        }
    }

    /// Number of rows in the dataset.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Returns `true` if the dataset has no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Create a new dataset containing only rows that match `predicate`.
    ///
    /// The returned dataset preserves the original schema and row order.
    pub fn filter_rows<F>(&self, mut predicate: F) -> Self
    where
        F: FnMut(&[Value]) -> bool,
    {
        let rows = self
            .rows
            .iter()
            .filter(|row| predicate(row.as_slice()))
            .cloned()
            .collect();
        Self {
            schema: self.schema.clone(),
            rows,
        }
    }

    /// Create a new dataset with `schema` by applying `mapper` to every row.
    ///
    /// Mapped rows are fitted to the schema width: short rows are padded with
    /// [`Value::Null`], extra cells are dropped.
    pub fn map_rows<F>(&self, schema: Schema, mut mapper: F) -> Self
    where
        F: FnMut(&[Value]) -> Vec<Value>,
    {
        let width = schema.fields.len();
        let rows = self
            .rows
            .iter()
            .map(|row| {
                let mut out = mapper(row.as_slice());
                out.resize(width, Value::Null);
                out
            })
            .collect();

        Self { schema, rows }
    }
}

#[cfg(test)]
mod tests {
    use super::{DataSet, DataType, Field, Schema, Value};

    fn sample_dataset() -> DataSet {
        let schema = Schema::new(vec![
            Field::new("user_id", DataType::Int64),
            Field::new("email", DataType::Utf8),
        ]);
        DataSet::new(
            schema,
            vec![
                vec![Value::Int64(1), Value::Utf8("a@x.io".to_string())],
                vec![Value::Int64(2), Value::Null],
                vec![Value::Int64(3), Value::Utf8("c@x.io".to_string())],
            ],
        )
    }

    #[test]
    fn index_of_returns_first_match() {
        let schema = Schema::new(vec![
            Field::new("email", DataType::Utf8),
            Field::new("email", DataType::Utf8),
        ]);
        assert_eq!(schema.index_of("email"), Some(0));
        assert_eq!(schema.index_of("missing"), None);
    }

    #[test]
    fn filter_rows_preserves_order_and_leaves_input_untouched() {
        let ds = sample_dataset();
        let out = ds.filter_rows(|row| !row[1].is_null());

        assert_eq!(out.schema, ds.schema);
        assert_eq!(out.row_count(), 2);
        assert_eq!(out.rows[0][0], Value::Int64(1));
        assert_eq!(out.rows[1][0], Value::Int64(3));
        assert_eq!(ds.row_count(), 3);
    }

    #[test]
    fn map_rows_fits_rows_to_schema_width() {
        let ds = sample_dataset();
        let schema = ds.schema.clone();

        let short = ds.map_rows(schema.clone(), |_row| vec![Value::Int64(1)]);
        assert!(short.rows.iter().all(|r| r == &vec![Value::Int64(1), Value::Null]));

        let wide = ds.map_rows(schema, |row| {
            let mut out = row.to_vec();
            out.push(Value::Bool(true));
            out
        });
        assert_eq!(wide.rows, ds.rows);
    }

    #[test]
    fn display_renders_csv_cells() {
        assert_eq!(Value::Null.to_string(), "");
        assert_eq!(Value::Int64(7).to_string(), "7");
        assert_eq!(Value::Float64(1.5).to_string(), "1.5");
        assert_eq!(Value::Bool(false).to_string(), "false");
        assert_eq!(Value::Utf8("x".to_string()).to_string(), "x");
    }

    #[test]
    fn null_conforms_to_every_type() {
        assert!(Value::Null.conforms_to(DataType::Int64));
        assert!(Value::Int64(1).conforms_to(DataType::Int64));
        assert!(!Value::Utf8("1".to_string()).conforms_to(DataType::Int64));
    }
}
