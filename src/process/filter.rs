use std::collections::BTreeMap;
use tracing::debug;

use super::{RawRecord, TrafficTable};

/// Keep rows with `rate < max_rate` and `Dim1 == gender`, then sort by year.
///
/// The sort is stable, so rows sharing a year keep their source order.
/// Rows missing a rate or gender are dropped. Rows whose year is missing or
/// not an integral year sort first, so they are only picked as a country's
/// latest row when that country has no dated row.
pub fn filter_traffic_table(table: TrafficTable, max_rate: f64, gender: &str) -> TrafficTable {
    let TrafficTable { columns, mut rows } = table;
    let before = rows.len();

    rows.retain(|r| matches!(r.numeric_value, Some(v) if v < max_rate));
    rows.retain(|r| r.dim1.as_deref() == Some(gender));
    rows.sort_by_key(|r| r.time_dim);

    debug!(before, after = rows.len(), max_rate, gender, "filtered table");
    TrafficTable { columns, rows }
}

/// Partition rows by country code. Rows without a country share the `None` group.
/// Each group keeps the table's row order.
pub fn group_by_country(table: &TrafficTable) -> BTreeMap<Option<&str>, Vec<&RawRecord>> {
    let mut groups: BTreeMap<Option<&str>, Vec<&RawRecord>> = BTreeMap::new();
    for row in &table.rows {
        groups.entry(row.spatial_dim.as_deref()).or_default().push(row);
    }
    groups
}

/// The last row of every country group. On a year-sorted table this is the
/// latest year; among rows tied on that year, the one seen last wins.
pub fn latest_by_country(table: &TrafficTable) -> Vec<RawRecord> {
    group_by_country(table)
        .into_values()
        .filter_map(|mut group| group.pop().cloned())
        .collect()
}
