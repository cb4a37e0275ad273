use anyhow::{Context, Result};
use csv::{Terminator, WriterBuilder};
use serde_json::Value;
use std::{fs, path::Path};
use tracing::{info, instrument};

use super::TrafficTable;

/// Write `table` as a header-included CSV at `path`, replacing any existing file.
#[instrument(level = "info", skip(table, path), fields(file = %path.as_ref().display(), rows = table.len()))]
pub fn write_table_csv<P: AsRef<Path>>(table: &TrafficTable, path: P) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("creating {:?}", parent))?;
    }

    let mut wtr = WriterBuilder::new()
        .has_headers(false)
        .terminator(Terminator::Any(b'\n'))
        .from_path(path)
        .with_context(|| format!("creating CSV file {:?}", path))?;

    if !table.columns.is_empty() {
        wtr.write_record(&table.columns)
            .context("writing CSV header")?;
    }
    for (idx, row) in table.rows.iter().enumerate() {
        let record: Vec<String> = table
            .columns
            .iter()
            .map(|col| cell(row.fields.get(col)))
            .collect();
        wtr.write_record(&record)
            .with_context(|| format!("writing CSV row {}", idx))?;
    }
    wtr.flush().with_context(|| format!("flushing {:?}", path))?;

    info!("wrote filtered table");
    Ok(())
}

fn cell(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(other) => other.to_string(),
    }
}
