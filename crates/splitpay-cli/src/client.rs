//! Thin JSON client for the node's HTTP API.

use anyhow::Context;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use serde_json::Value;

/// Header the node reads the acting recipient from.
pub const RECIPIENT_HEADER: &str = "x-recipient-id";

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct ApiClient {
    endpoint: String,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(endpoint: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.endpoint, path))
    }

    /// Send `builder` and decode the JSON body, turning non-2xx answers into errors.
    pub async fn send(&self, builder: RequestBuilder) -> anyhow::Result<Value> {
        let resp = builder.send().await.with_context(|| {
            format!(
                "could not reach node at {} (is splitpay-node running?)",
                self.endpoint
            )
        })?;

        let status = resp.status();
        if status.is_success() {
            return Ok(resp.json().await?);
        }
        match resp.json::<ErrorResponse>().await {
            Ok(err) => anyhow::bail!("request failed (HTTP {}): {}", status, err.error),
            Err(_) => anyhow::bail!("request failed (HTTP {})", status),
        }
    }
}

/// Render an optional JSON field for display.
pub fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        None | Some(Value::Null) => "-".to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
