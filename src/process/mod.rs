// src/process/mod.rs
pub mod csv_writer;
pub mod filter;
pub mod payload;

use anyhow::{Context, Result};
use serde_json::{Map, Value};
use std::{fs, path::Path};
use tracing::{debug, instrument, warn};

pub const COUNTRY_KEY: &str = "SpatialDim";
pub const YEAR_KEY: &str = "TimeDim";
pub const GENDER_KEY: &str = "Dim1";
pub const RATE_KEY: &str = "NumericValue";

/// One element of the dataset's `value` array.
///
/// The typed fields are lenient views over `fields`, used for filtering and
/// ordering only: a key that is absent or has an unusable type reads as `None`
/// instead of failing the load. Payloads are built from the raw `fields`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    /// Country code (`SpatialDim`).
    pub spatial_dim: Option<String>,
    /// Sort key derived from `TimeDim`. `None` when the value is not an
    /// integral year (`"2015-2019"`, `2015.5`), which sorts before every dated row.
    pub time_dim: Option<i64>,
    /// Gender dimension code (`Dim1`).
    pub dim1: Option<String>,
    /// Rate (`NumericValue`).
    pub numeric_value: Option<f64>,
    /// The source object, key order preserved. Feeds the CSV snapshot.
    pub fields: Map<String, Value>,
}

impl RawRecord {
    pub fn from_value(value: Value) -> Self {
        let fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            spatial_dim: fields.get(COUNTRY_KEY).and_then(as_text),
            time_dim: fields.get(YEAR_KEY).and_then(as_year),
            dim1: fields.get(GENDER_KEY).and_then(as_text),
            numeric_value: fields.get(RATE_KEY).and_then(as_number),
            fields,
        }
    }
}

fn as_text(v: &Value) -> Option<String> {
    v.as_str().map(str::to_string)
}

fn as_year(v: &Value) -> Option<i64> {
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// In-memory table: one row per dataset element, columns in first-seen key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrafficTable {
    pub columns: Vec<String>,
    pub rows: Vec<RawRecord>,
}

impl TrafficTable {
    pub fn from_values(values: Vec<Value>) -> Self {
        let rows: Vec<RawRecord> = values.into_iter().map(RawRecord::from_value).collect();
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.fields.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.clone());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Read the cached dataset from disk. Only an IO failure is an error;
/// content problems degrade to an empty table.
#[instrument(level = "info", skip(path), fields(file = %path.as_ref().display()))]
pub fn load_traffic_json<P: AsRef<Path>>(path: P) -> Result<TrafficTable> {
    let bytes = fs::read(&path)
        .with_context(|| format!("Failed to read dataset file: {:?}", path.as_ref()))?;
    Ok(parse_traffic_json(&bytes))
}

/// Parse `{"value": [...]}` into a table.
pub fn parse_traffic_json(bytes: &[u8]) -> TrafficTable {
    let root: Value = match serde_json::from_slice(bytes) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "dataset is not valid JSON; treating as empty");
            return TrafficTable::default();
        }
    };

    let values = match root {
        Value::Object(mut map) => map.remove("value"),
        _ => None,
    };
    match values {
        Some(Value::Array(items)) => {
            debug!(rows = items.len(), "dataset parsed");
            TrafficTable::from_values(items)
        }
        Some(other) => {
            warn!(kind = json_kind(&other), "`value` is not an array; treating as empty");
            TrafficTable::default()
        }
        None => {
            warn!("dataset has no `value` key; treating as empty");
            TrafficTable::default()
        }
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
