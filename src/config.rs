// src/config.rs

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Deserialize;
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};

pub const DEFAULT_DATASET_URL: &str =
    "https://github.com/robocorp/inhuman-insurance-inc/raw/main/RS_198.json";
pub const DEFAULT_SALES_API_URL: &str =
    "https://robocorp.com/inhuman-insurance-inc/sales-system-api";

/// Settings shared by the producer and consumer runs.
///
/// Every field has a default, so a YAML file only needs the keys it changes.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Remote JSON dataset (`{"value": [...]}`).
    pub dataset_url: String,
    /// Local copy of the downloaded dataset, overwritten on every run.
    pub dataset_cache_path: PathBuf,
    /// CSV snapshot of the filtered (pre-grouping) table.
    pub filtered_csv_path: PathBuf,
    /// JSON file backing the work-item queue.
    pub work_items_path: PathBuf,
    /// Downstream endpoint receiving one POST per valid work item.
    pub sales_api_url: String,
    pub http_timeout_secs: u64,
    /// Rows are kept only when their rate is strictly below this.
    pub max_rate: f64,
    /// `Dim1` value for the both-genders aggregate.
    pub gender: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dataset_url: DEFAULT_DATASET_URL.to_string(),
            dataset_cache_path: PathBuf::from("output/traffic.json"),
            filtered_csv_path: PathBuf::from("output/traffic.csv"),
            work_items_path: PathBuf::from("output/work-items.json"),
            sales_api_url: DEFAULT_SALES_API_URL.to_string(),
            http_timeout_secs: 30,
            max_rate: 5.0,
            gender: "BTSX".to_string(),
        }
    }
}

impl Config {
    /// Load from an optional YAML file. With no path the defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            None => Ok(Self::default()),
            Some(p) => {
                let text = fs::read_to_string(p)
                    .with_context(|| format!("reading config file {}", p.display()))?;
                Self::from_yaml(&text).with_context(|| format!("parsing config {}", p.display()))
            }
        }
    }

    pub fn from_yaml(text: &str) -> Result<Self> {
        // an empty document deserializes to unit, not a map
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let cfg: Self = serde_yaml::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings no run can work with.
    pub fn validate(&self) -> Result<()> {
        if self.http_timeout_secs == 0 {
            bail!("http_timeout_secs must be at least 1");
        }
        Ok(())
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// HTTP client used for the download and the sales API calls.
    pub fn http_client(&self) -> Result<Client> {
        self.validate()?;
        Client::builder()
            .timeout(self.http_timeout())
            .build()
            .context("building HTTP client")
    }
}
