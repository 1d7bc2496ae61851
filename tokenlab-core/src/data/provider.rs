//! Data source traits, wire types and structured error types.
//!
//! The `PageSource` and `MetadataSource` traits abstract over the upstream
//! API so the download loops can be driven by scripted fakes in tests.

use super::download::EntityReport;
use crate::domain::{Cursor, EntityId};
use serde::Deserialize;
use std::path::PathBuf;
use thiserror::Error;

/// One upstream record, kept as a JSON object in its original key order.
pub type RawRecord = serde_json::Map<String, serde_json::Value>;

/// Structured error types for download operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("still rate limited after {attempts} attempts")]
    RateLimitExhausted { attempts: u32 },

    #[error("upstream error: {0}")]
    Upstream(String),

    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("checkpoint I/O error at {path:?}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sink I/O error at {path:?}: {source}")]
    Sink {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("sink format error at {path:?}: {message}")]
    SinkFormat { path: PathBuf, message: String },

    #[error("token list error: {0}")]
    TokenList(String),

    #[error("config error: {0}")]
    Config(String),
}

/// A single page request against the paginated query endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub entity: EntityId,
    pub page_size: u32,
    pub cursor: Option<Cursor>,
}

#[derive(Debug, Clone, Deserialize)]
struct CursorEnvelope {
    #[serde(default)]
    next: Option<Cursor>,
}

/// Decoded page: `{ "results": [...], "cursor": { "next": "..." } }`.
///
/// An empty `results` sequence is the end-of-data signal; the cursor may be
/// absent on such a page.
#[derive(Debug, Clone, Deserialize)]
pub struct PageResponse {
    pub results: Vec<RawRecord>,
    #[serde(default)]
    cursor: Option<CursorEnvelope>,
}

impl PageResponse {
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Cursor to echo back for the following page.
    pub fn next_cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref().and_then(|c| c.next.as_ref())
    }
}

/// Paginated OHLC query endpoint.
///
/// One call is one HTTP attempt: throttling surfaces as
/// `DataError::RateLimited` and is retried by the fetch client, not here.
pub trait PageSource {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, DataError>;
}

/// Batched token metadata endpoint.
pub trait MetadataSource {
    /// Fetch metadata records for a batch of ids. The first field of each
    /// record is expected to be the token address.
    fn fetch_metadata(&self, ids: &[EntityId]) -> Result<Vec<RawRecord>, DataError>;
}

/// Progress callback for download loops.
pub trait DownloadProgress {
    /// A page was appended to the sink and its cursor checkpointed.
    fn on_page(&self, entity: &EntityId, rows: usize, cursor: &Cursor);

    /// An entity finished (drained, capped, or failed).
    fn on_entity_complete(
        &self,
        entity: &EntityId,
        index: usize,
        total: usize,
        result: &Result<EntityReport, DataError>,
    );

    /// A metadata batch was appended. `saved` counts rows in the sink so far.
    fn on_metadata_batch(&self, rows: usize, saved: usize, requested: usize);
}

/// Progress reporter that writes through the `log` facade.
pub struct LogProgress;

impl DownloadProgress for LogProgress {
    fn on_page(&self, entity: &EntityId, rows: usize, cursor: &Cursor) {
        log::info!(target: "tokenlab::ohlc", "[{entity}] Downloaded {rows} records. Last cursor: {cursor}.");
    }

    fn on_entity_complete(
        &self,
        entity: &EntityId,
        index: usize,
        total: usize,
        result: &Result<EntityReport, DataError>,
    ) {
        match result {
            Ok(report) => log::info!(
                target: "tokenlab::ohlc",
                "Finished downloading token {}/{total} (address = {entity}, {} rows in {} pages).",
                index + 1,
                report.rows,
                report.pages
            ),
            Err(e) => log::error!(
                target: "tokenlab::ohlc",
                "Failed token {}/{total} (address = {entity}): {e}",
                index + 1
            ),
        }
    }

    fn on_metadata_batch(&self, rows: usize, saved: usize, requested: usize) {
        log::info!(
            target: "tokenlab::metadata",
            "Finished downloading metadata for {rows} tokens - Total: {saved}/{requested}."
        );
    }
}

/// Progress reporter that discards everything.
pub struct NoProgress;

impl DownloadProgress for NoProgress {
    fn on_page(&self, _entity: &EntityId, _rows: usize, _cursor: &Cursor) {}

    fn on_entity_complete(
        &self,
        _entity: &EntityId,
        _index: usize,
        _total: usize,
        _result: &Result<EntityReport, DataError>,
    ) {
    }

    fn on_metadata_batch(&self, _rows: usize, _saved: usize, _requested: usize) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_page_with_cursor() {
        let page: PageResponse = serde_json::from_value(json!({
            "results": [{"timestamp": 1, "price_usd_token_open": 2.5}],
            "cursor": {"next": "abc"}
        }))
        .unwrap();
        assert!(!page.is_empty());
        assert_eq!(page.next_cursor().map(|c| c.as_str()), Some("abc"));
    }

    #[test]
    fn empty_page_may_omit_cursor() {
        let page: PageResponse = serde_json::from_value(json!({"results": []})).unwrap();
        assert!(page.is_empty());
        assert!(page.next_cursor().is_none());
    }

    #[test]
    fn record_keys_keep_wire_order() {
        let page: PageResponse = serde_json::from_str(
            r#"{"results":[{"z":1,"a":2,"m":3}],"cursor":{"next":"n"}}"#,
        )
        .unwrap();
        let keys: Vec<&str> = page.results[0].keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["z", "a", "m"]);
    }
}
