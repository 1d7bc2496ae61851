//! Scripted fakes shared by the integration tests. Nothing here touches the network.

#![allow(dead_code)]

use serde_json::{json, Value};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::time::Duration;
use tokenlab_core::data::{
    DataError, MetadataSource, PageRequest, PageResponse, PageSource, RawRecord, Sleeper,
};
use tokenlab_core::domain::EntityId;

/// Records every requested sleep instead of sleeping.
#[derive(Default)]
pub struct RecordingSleeper {
    pub slept: RefCell<Vec<Duration>>,
}

impl RecordingSleeper {
    pub fn total(&self) -> Duration {
        self.slept.borrow().iter().sum()
    }

    pub fn count(&self) -> usize {
        self.slept.borrow().len()
    }
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.slept.borrow_mut().push(duration);
    }
}

/// One OHLC bucket as the upstream would send it.
pub fn bucket(ts: i64) -> Value {
    json!({
        "timestamp": ts,
        "date_time": format!("ts-{ts}"),
        "price_usd_token_open": 1.0 + ts as f64 / 1000.0,
        "price_usd_token_max": 2.0,
        "price_usd_token_min": 0.5,
        "price_usd_token_close": 1.5,
    })
}

/// Build a page the way it arrives on the wire.
pub fn page(records: Vec<Value>, next: Option<&str>) -> PageResponse {
    let body = match next {
        Some(next) => json!({"results": records, "cursor": {"next": next}}),
        None => json!({"results": records}),
    };
    serde_json::from_value(body).unwrap()
}

/// Paginated source serving `pages` in order.
///
/// The page after cursor `c{k}` is `pages[k]`; the first request (no cursor)
/// gets `pages[0]`. Past the end, an empty page is returned.
pub struct ScriptedSource {
    pages: RefCell<Vec<PageResponse>>,
    pub requests: RefCell<Vec<PageRequest>>,
    /// Remaining 429 responses to send before serving.
    pub throttle: Cell<u32>,
    /// Fail the request with this (1-based) call number.
    pub fail_on_call: Cell<Option<usize>>,
    pub failing_entities: HashSet<EntityId>,
}

impl ScriptedSource {
    /// `n_pages` pages of `per_page` buckets, cursors `c1..=c{n}`.
    pub fn with_pages(n_pages: usize, per_page: usize) -> Self {
        let source = Self::empty();
        for _ in 0..n_pages {
            source.push_page(per_page);
        }
        source
    }

    pub fn empty() -> Self {
        Self {
            pages: RefCell::new(Vec::new()),
            requests: RefCell::new(Vec::new()),
            throttle: Cell::new(0),
            fail_on_call: Cell::new(None),
            failing_entities: HashSet::new(),
        }
    }

    /// Append another page, as if new data arrived upstream.
    pub fn push_page(&self, per_page: usize) {
        let mut pages = self.pages.borrow_mut();
        let k = pages.len();
        let records = (0..per_page)
            .map(|j| bucket((k * per_page + j) as i64))
            .collect();
        let next = format!("c{}", k + 1);
        pages.push(page(records, Some(&next)));
    }

    pub fn push_raw(&self, response: PageResponse) {
        self.pages.borrow_mut().push(response);
    }

    /// Cursors sent with each request, `None` for the first page.
    pub fn requested_cursors(&self) -> Vec<Option<String>> {
        self.requests
            .borrow()
            .iter()
            .map(|r| r.cursor.as_ref().map(|c| c.as_str().to_string()))
            .collect()
    }

    fn page_index(cursor: Option<&str>) -> usize {
        match cursor {
            None => 0,
            Some(c) => c
                .strip_prefix('c')
                .and_then(|n| n.parse().ok())
                .expect("scripted cursors look like c<k>"),
        }
    }
}

impl PageSource for ScriptedSource {
    fn fetch_page(&self, request: &PageRequest) -> Result<PageResponse, DataError> {
        self.requests.borrow_mut().push(request.clone());
        let call = self.requests.borrow().len();

        if self.failing_entities.contains(&request.entity) {
            return Err(DataError::Upstream(format!("HTTP 500 for {}", request.entity)));
        }
        if self.fail_on_call.get() == Some(call) {
            return Err(DataError::Upstream("HTTP 502".into()));
        }
        if self.throttle.get() > 0 {
            self.throttle.set(self.throttle.get() - 1);
            return Err(DataError::RateLimited);
        }

        let index = Self::page_index(request.cursor.as_ref().map(|c| c.as_str()));
        let pages = self.pages.borrow();
        Ok(pages
            .get(index)
            .cloned()
            .unwrap_or_else(|| page(Vec::new(), None)))
    }
}

/// Metadata source answering one record per requested id.
#[derive(Default)]
pub struct ScriptedMetadata {
    pub requests: RefCell<Vec<Vec<String>>>,
    /// Fail the request with this (1-based) call number.
    pub fail_on_call: Cell<Option<usize>>,
    pub throttle: Cell<u32>,
}

impl ScriptedMetadata {
    pub fn requested(&self) -> Vec<Vec<String>> {
        self.requests.borrow().clone()
    }
}

impl MetadataSource for ScriptedMetadata {
    fn fetch_metadata(&self, ids: &[EntityId]) -> Result<Vec<RawRecord>, DataError> {
        if self.throttle.get() > 0 {
            self.throttle.set(self.throttle.get() - 1);
            return Err(DataError::RateLimited);
        }

        self.requests
            .borrow_mut()
            .push(ids.iter().map(|id| id.as_str().to_string()).collect());
        let call = self.requests.borrow().len();
        if self.fail_on_call.get() == Some(call) {
            return Err(DataError::Upstream(
                "metadata response missing results.results".into(),
            ));
        }

        Ok(ids
            .iter()
            .map(|id| match json!({
                "address": id.as_str(),
                "symbol": id.as_str().to_uppercase(),
                "decimals": 18,
            }) {
                Value::Object(map) => map,
                _ => unreachable!(),
            })
            .collect())
    }
}
