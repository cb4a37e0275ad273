// src/fetch/mod.rs

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument};
use url::Url;

/// Download the dataset at `url` and save it to `dest`, replacing any previous copy.
/// Returns the number of bytes written.
#[instrument(level = "info", skip(client, dest), fields(file = %dest.as_ref().display()))]
pub async fn download_dataset(client: &Client, url: &str, dest: impl AsRef<Path>) -> Result<u64> {
    let dest = dest.as_ref();
    let url = Url::parse(url).with_context(|| format!("parsing dataset URL {}", url))?;

    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)
            .await
            .with_context(|| format!("creating {}", parent.display()))?;
    }

    debug!(%url, "requesting dataset");
    let bytes = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {}", url))?
        .error_for_status()
        .with_context(|| format!("Non-success status {}", url))?
        .bytes()
        .await
        .with_context(|| format!("reading body from {}", url))?;

    fs::write(dest, &bytes)
        .await
        .with_context(|| format!("writing {}", dest.display()))?;

    info!(bytes = bytes.len(), "dataset saved");
    Ok(bytes.len() as u64)
}
