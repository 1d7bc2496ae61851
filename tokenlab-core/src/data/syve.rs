//! HTTP client for the Syve price and metadata API.
//!
//! - `POST {api_base}/prices_usd`: bucketed OHLC aggregates for one token,
//!   newest first, cursor paginated.
//! - `GET {api_base}/metadata/erc20?address=a,b,c`: ERC-20 metadata for a
//!   comma-joined batch of addresses.
//!
//! HTTP 429 maps to `DataError::RateLimited`; retries happen one layer up.

use super::provider::{
    DataError, MetadataSource, PageRequest, PageResponse, PageSource, RawRecord,
};
use crate::domain::EntityId;
use reqwest::StatusCode;
use serde_json::{json, Value};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.syve.ai/v1";

pub struct SyveClient {
    client: reqwest::blocking::Client,
    api_base: String,
    interval: String,
}

impl SyveClient {
    /// Build a client for the given API base URL and bucket interval
    /// (e.g. `1m`, `1h`, `1d`).
    pub fn new(
        api_base: impl Into<String>,
        interval: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("tokenlab/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            interval: interval.into(),
        })
    }

    pub fn interval(&self) -> &str {
        &self.interval
    }

    fn prices_url(&self) -> String {
        format!("{}/prices_usd", self.api_base)
    }

    fn metadata_url(&self, ids: &[EntityId]) -> String {
        let joined: Vec<&str> = ids.iter().map(|id| id.as_str()).collect();
        format!("{}/metadata/erc20?address={}", self.api_base, joined.join(","))
    }

    /// Send a request and decode its JSON body, mapping status codes.
    fn send_json(&self, request: reqwest::blocking::RequestBuilder) -> Result<Value, DataError> {
        let resp = request.send().map_err(|e| {
            if e.is_connect() || e.is_timeout() {
                DataError::NetworkUnreachable(e.to_string())
            } else {
                DataError::Upstream(e.to_string())
            }
        })?;

        check_status(resp.status())?;
        resp.json()
            .map_err(|e| DataError::Upstream(format!("failed to decode response: {e}")))
    }
}

/// 429 means throttled; any other non-2xx status is an upstream failure.
pub fn check_status(status: StatusCode) -> Result<(), DataError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(DataError::RateLimited);
    }
    if !status.is_success() {
        return Err(DataError::Upstream(format!("HTTP {status}")));
    }
    Ok(())
}

/// Request body for one page of OHLC buckets.
pub fn prices_body(request: &PageRequest, interval: &str) -> Value {
    let mut options = vec![
        json!({"type": "size", "params": {"value": request.page_size}}),
        json!({"type": "sort", "params": {"field": "timestamp", "value": "desc"}}),
    ];
    if let Some(cursor) = &request.cursor {
        options.push(json!({"type": "cursor", "params": {"value": cursor.as_str()}}));
    }

    json!({
        "filter": {
            "type": "eq",
            "params": {"field": "token_address", "value": request.entity.as_str()},
        },
        "bucket": {
            "type": "range",
            "params": {"field": "timestamp", "interval": interval},
        },
        "aggregate": [
            {"type": "open", "params": {"field": "price_usd_token"}},
            {"type": "max", "params": {"field": "price_usd_token"}},
            {"type": "min", "params": {"field": "price_usd_token"}},
            {"type": "close", "params": {"field": "price_usd_token"}},
        ],
        "options": options,
    })
}

/// Decode a page body. A missing `results` array is an upstream error.
pub fn parse_page(body: Value) -> Result<PageResponse, DataError> {
    serde_json::from_value(body)
        .map_err(|e| DataError::Upstream(format!("malformed price page: {e}")))
}

/// Extract `results.results` from a metadata body.
pub fn parse_metadata(body: Value) -> Result<Vec<RawRecord>, DataError> {
    let results = body
        .get("results")
        .and_then(|r| r.get("results"))
        .ok_or_else(|| DataError::Upstream("metadata response missing results.results".into()))?;

    let items = results
        .as_array()
        .ok_or_else(|| DataError::Upstream("metadata results.results is not an array".into()))?;

    items
        .iter()
        .map(|item| match item {
            Value::Object(map) => Ok(map.clone()),
            other => Err(DataError::Upstream(format!(
                "metadata record is not an object: {other}"
            ))),
        })
        .collect()
}

impl PageSource for SyveClient {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, DataError> {
        let body = prices_body(request, &self.interval);
        let value = self.send_json(self.client.post(self.prices_url()).json(&body))?;
        parse_page(value)
    }
}

impl MetadataSource for SyveClient {
    fn fetch_metadata(&self, ids: &[EntityId]) -> Result<Vec<RawRecord>, DataError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let value = self.send_json(self.client.get(self.metadata_url(ids)))?;
        parse_metadata(value)
    }
}
