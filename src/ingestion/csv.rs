//! CSV adapter: payload bytes to [`DataSet`] and back.

use std::io::Read;

use crate::error::{PipelineError, PipelineResult};
use crate::types::{DataSet, DataType, Field, Schema, Value};

/// Parse a CSV payload into an untyped [`DataSet`].
///
/// Rules:
///
/// - The first non-blank line is the header.
/// - Every column is typed [`DataType::Utf8`]; coercion is the normalizer's job.
/// - Cells are kept verbatim except empty cells, which become [`Value::Null`].
/// - Short rows are padded with `Null`; a row wider than the header is a parse error.
pub fn parse_csv(bytes: &[u8]) -> PipelineResult<DataSet> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(bytes);
    parse_csv_from_reader(&mut rdr)
}

/// Parse CSV data from an existing reader. The reader must be `flexible` for short rows
/// to be padded instead of rejected.
pub fn parse_csv_from_reader<R: Read>(rdr: &mut csv::Reader<R>) -> PipelineResult<DataSet> {
    let headers = rdr.headers().map_err(parse_error)?.clone();
    let width = headers.len();
    let schema = Schema::new(
        headers
            .iter()
            .map(|h| Field::new(h, DataType::Utf8))
            .collect(),
    );

    let mut rows: Vec<Vec<Value>> = Vec::new();
    for result in rdr.records() {
        let record = result.map_err(parse_error)?;
        if record.len() > width {
            return Err(PipelineError::Parse {
                line: record.position().map_or(0, |p| p.line()),
                message: format!("expected {width} fields, saw {}", record.len()),
            });
        }

        let mut row: Vec<Value> = record.iter().map(raw_value).collect();
        row.resize(width, Value::Null);
        rows.push(row);
    }

    Ok(DataSet::new(schema, rows))
}

/// Serialize a [`DataSet`] as CSV: header row, then one line per row, no index column.
pub fn write_csv(dataset: &DataSet) -> PipelineResult<Vec<u8>> {
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(dataset.schema.field_names())?;
    for row in &dataset.rows {
        wtr.write_record(row.iter().map(|v| v.to_string()))?;
    }
    wtr.into_inner()
        .map_err(|e| PipelineError::Csv(csv::Error::from(e.into_error())))
}

fn raw_value(cell: &str) -> Value {
    if cell.is_empty() {
        Value::Null
    } else {
        Value::Utf8(cell.to_owned())
    }
}

fn parse_error(err: csv::Error) -> PipelineError {
    if let csv::ErrorKind::Io(_) = err.kind() {
        return PipelineError::Csv(err);
    }
    PipelineError::Parse {
        line: err.position().map_or(0, |p| p.line()),
        message: err.to_string(),
    }
}
