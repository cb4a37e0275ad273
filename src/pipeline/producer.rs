// src/pipeline/producer.rs

use anyhow::{Context, Result};
use reqwest::Client;
use tracing::{error, info, instrument};

use crate::{
    config::Config,
    fetch::download_dataset,
    process::{
        csv_writer::write_table_csv,
        filter::{filter_traffic_table, latest_by_country},
        load_traffic_json,
        payload::TrafficPayload,
        RawRecord, TrafficTable,
    },
    workitems::WorkItemQueue,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProduceSummary {
    pub rows_loaded: usize,
    pub rows_kept: usize,
    pub countries: usize,
    pub items_enqueued: usize,
    /// `false` when the CSV snapshot could not be written. Items stay queued.
    pub snapshot_written: bool,
}

/// Download, load, filter, group, enqueue, then snapshot.
/// Only a failed download (or queue write) aborts the run.
#[instrument(level = "info", skip_all, fields(url = %config.dataset_url))]
pub async fn run_producer<Q: WorkItemQueue>(
    config: &Config,
    client: &Client,
    queue: &mut Q,
) -> Result<ProduceSummary> {
    info!("Producing traffic data...");

    // ─── 1) acquire ─────────────────────────────────────────────────
    info!("Downloading traffic data...");
    download_dataset(client, &config.dataset_url, &config.dataset_cache_path)
        .await
        .context("downloading traffic data")?;

    // ─── 2) load ────────────────────────────────────────────────────
    info!("Reading traffic data...");
    let table = load_traffic_json(&config.dataset_cache_path)?;

    produce_from_table(config, table, queue).await
}

/// Steps after acquisition: filter, group, project, emit, snapshot.
pub async fn produce_from_table<Q: WorkItemQueue>(
    config: &Config,
    table: TrafficTable,
    queue: &mut Q,
) -> Result<ProduceSummary> {
    let rows_loaded = table.len();

    info!("Filtering traffic data...");
    let filtered = filter_traffic_table(table, config.max_rate, &config.gender);

    info!("Getting the latest data year by country...");
    let latest = latest_by_country(&filtered);

    info!("Preparing traffic data payloads...");
    let payloads = create_traffic_payloads(&latest);

    info!("Creating traffic work items...");
    let mut items_enqueued = 0;
    for payload in &payloads {
        let body = payload
            .to_work_item_payload()
            .context("serializing traffic payload")?;
        let id = queue
            .enqueue(body)
            .await
            .with_context(|| format!("enqueueing traffic data for {:?}", payload.country))?;
        info!(%id, country = %payload.country, "work item created");
        items_enqueued += 1;
    }

    info!("Storing processed traffic data...");
    let snapshot_written = match write_table_csv(&filtered, &config.filtered_csv_path) {
        Ok(()) => true,
        Err(e) => {
            error!(
                path = %config.filtered_csv_path.display(),
                error = %format!("{:#}", e),
                "could not store filtered traffic data"
            );
            false
        }
    };

    let summary = ProduceSummary {
        rows_loaded,
        rows_kept: filtered.len(),
        countries: latest.len(),
        items_enqueued,
        snapshot_written,
    };
    info!(?summary, "producer finished");
    Ok(summary)
}

pub fn create_traffic_payloads(latest: &[RawRecord]) -> Vec<TrafficPayload> {
    latest
        .iter()
        .map(|rec| {
            let payload = TrafficPayload::from_record(rec);
            info!(
                country = %payload.country,
                year = ?payload.year,
                rate = ?payload.rate,
                "traffic data"
            );
            payload
        })
        .collect()
}
