// src/sales/mod.rs

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::process::payload::TrafficPayload;

/// What the sales system answered for one POST.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SalesResponse {
    pub status: u16,
    /// `message` from the body of a non-200 answer.
    pub message: Option<String>,
}

impl SalesResponse {
    pub fn is_success(&self) -> bool {
        self.status == StatusCode::OK.as_u16()
    }

    /// Failure text reported on the work item. Bodies without a usable
    /// `message` fall back to the status code.
    pub fn failure_message(&self) -> String {
        match &self.message {
            Some(m) => m.clone(),
            None => format!("sales API returned {}", self.status),
        }
    }
}

#[async_trait]
pub trait SalesApi: Send + Sync {
    /// POST one payload. `Err` means no HTTP answer was obtained.
    async fn post_traffic(&self, payload: &TrafficPayload) -> Result<SalesResponse>;
}

pub struct HttpSalesApi {
    client: Client,
    url: Url,
}

impl HttpSalesApi {
    pub fn new(client: Client, url: &str) -> Result<Self> {
        let url = Url::parse(url).with_context(|| format!("parsing sales API URL {}", url))?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl SalesApi for HttpSalesApi {
    async fn post_traffic(&self, payload: &TrafficPayload) -> Result<SalesResponse> {
        let resp = self
            .client
            .post(self.url.clone())
            .json(payload)
            .send()
            .await
            .with_context(|| format!("POST {}", self.url))?;

        let status = resp.status();
        debug!(%status, country = %payload.country, "sales API answered");
        if status == StatusCode::OK {
            return Ok(SalesResponse {
                status: status.as_u16(),
                message: None,
            });
        }

        // the body is only diagnostic here, so a broken one is not an error
        let body = resp.bytes().await.unwrap_or_default();
        Ok(SalesResponse {
            status: status.as_u16(),
            message: message_from_body(&body),
        })
    }
}

fn message_from_body(body: &[u8]) -> Option<String> {
    let json: Value = serde_json::from_slice(body).ok()?;
    match json.get("message")? {
        Value::String(s) => Some(s.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}
