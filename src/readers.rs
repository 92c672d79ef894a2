//! Chart row sources: CSV exports and JSON API dumps.
//!
//! Both readers produce `Row`s. JSON objects are flattened into dotted field
//! names ("track.artist"); arrays and nulls are dropped.

use anyhow::{Context, Result};
use encoding_rs::{Encoding, UTF_8};
use serde::Deserialize;
use serde_json::Value;
use std::borrow::Cow;
use std::path::Path;

use crate::models::{FieldNames, FieldValue, Row};

/// File format of a chart source.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    #[default]
    Csv,
    Json,
}

impl SourceFormat {
    /// Field names used by sources of this format unless overridden.
    pub fn default_fields(self) -> FieldNames {
        match self {
            SourceFormat::Csv => FieldNames::csv(),
            SourceFormat::Json => FieldNames::json(),
        }
    }
}

/// Look up a character encoding by its WHATWG label ("utf-8",
/// "windows-1252", "latin1", ...). No label means UTF-8.
pub fn lookup_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    match label {
        None => Ok(UTF_8),
        Some(label) => Encoding::for_label(label.trim().as_bytes())
            .with_context(|| format!("Unknown character encoding {:?}", label)),
    }
}

/// Decode file contents. A byte order mark overrides `encoding`.
fn decode<'a>(bytes: &'a [u8], encoding: &'static Encoding, path: &Path) -> Cow<'a, str> {
    let (text, used, malformed) = encoding.decode(bytes);
    if malformed {
        log::warn!("{:?}: malformed {} sequences replaced", path, used.name());
    }
    text
}

/// Read all rows of a CSV file with a header line, decoded from `encoding`.
///
/// Short records simply lack the trailing fields, so a missing column surfaces
/// as a missing field during ingestion.
pub fn read_csv_rows(path: &Path, encoding: &'static Encoding) -> Result<Vec<Row>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to open CSV file {:?}", path))?;
    let text = decode(&bytes, encoding, path);
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader
        .headers()
        .with_context(|| format!("Failed to read CSV header of {:?}", path))?
        .iter()
        .map(|header| header.trim_start_matches('\u{FEFF}').to_string())
        .collect();

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("Failed to read CSV record {} of {:?}", index + 1, path))?;
        let row: Row = headers
            .iter()
            .zip(record.iter())
            .map(|(name, value)| (name.clone(), FieldValue::from(value)))
            .collect();
        rows.push(row);
    }
    Ok(rows)
}

/// Read all rows of a JSON file. `pointer` (RFC 6901, e.g. "/data/0/positions")
/// selects the array of rows; without it the document itself must be an array.
pub fn read_json_rows(path: &Path, pointer: Option<&str>, encoding: &'static Encoding) -> Result<Vec<Row>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to open JSON file {:?}", path))?;
    let text = decode(&bytes, encoding, path);
    let document: Value =
        serde_json::from_str(&text).with_context(|| format!("Failed to parse JSON file {:?}", path))?;
    json_rows(&document, pointer).with_context(|| format!("Invalid row data in {:?}", path))
}

/// Extract flattened rows from a parsed JSON document.
pub fn json_rows(document: &Value, pointer: Option<&str>) -> Result<Vec<Row>> {
    let rows = match pointer {
        Some(pointer) => document
            .pointer(pointer)
            .with_context(|| format!("No value at JSON pointer {:?}", pointer))?,
        None => document,
    };
    let items = rows
        .as_array()
        .context("Expected an array of row objects")?;

    let mut result = Vec::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        if !item.is_object() {
            anyhow::bail!("Row {} is not an object", index + 1);
        }
        let mut row = Row::new();
        flatten_into("", item, &mut row);
        result.push(row);
    }
    Ok(result)
}

fn flatten_into(prefix: &str, value: &Value, row: &mut Row) {
    match value {
        Value::Object(map) => {
            for (name, value) in map {
                let name = if prefix.is_empty() {
                    name.clone()
                } else {
                    format!("{}.{}", prefix, name)
                };
                flatten_into(&name, value, row);
            }
        }
        Value::String(s) => {
            row.insert(prefix.to_string(), FieldValue::from(s.as_str()));
        }
        Value::Number(n) => {
            let value = match n.as_i64() {
                Some(n) => FieldValue::Integer(n),
                None => FieldValue::Text(n.to_string()),
            };
            row.insert(prefix.to_string(), value);
        }
        Value::Bool(b) => {
            row.insert(prefix.to_string(), FieldValue::Flag(*b));
        }
        Value::Null | Value::Array(_) => {}
    }
}
