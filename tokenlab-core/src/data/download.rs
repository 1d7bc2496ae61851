//! Resumable OHLC download loop and the multi-token orchestrator.
//!
//! Per token the loop walks `INIT → RESUMING → PAGING → DRAINED`:
//! - INIT: normalized id, checkpoint path, sink path
//! - RESUMING: the saved cursor (if any) becomes the first request's cursor
//! - PAGING: fetch, format, append, then checkpoint the next cursor
//! - DRAINED: an empty page or the page cap ends the token
//!
//! The checkpoint is only written after the page is in the sink. A crash in
//! between replays that one page on the next run (duplicate rows) and never
//! skips data.

use super::backoff::FetchClient;
use super::checkpoint::CheckpointStore;
use super::format::format_records;
use super::provider::{DataError, DownloadProgress, PageRequest};
use super::sink::CsvSink;
use crate::domain::{Cursor, EntityId};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Paging settings for one download run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingOptions {
    pub page_size: u32,
    /// Stop after this many written pages; `None` drains the token.
    pub max_pages: Option<u32>,
    /// Pause between consecutive page requests.
    pub politeness_delay: Duration,
}

impl Default for PagingOptions {
    fn default() -> Self {
        Self {
            page_size: 100_000,
            max_pages: None,
            politeness_delay: Duration::from_millis(1010),
        }
    }
}

/// Why a token's loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    /// The upstream returned an empty page.
    Exhausted,
    /// `max_pages` pages were written.
    PageLimit,
}

/// Outcome of draining one token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityReport {
    pub entity: EntityId,
    pub resumed_from: Option<Cursor>,
    pub pages: u32,
    pub rows: usize,
    pub last_cursor: Option<Cursor>,
    pub reason: DrainReason,
}

/// Per-token resumable OHLC downloader.
///
/// Sink files live at `{data_dir}/{entity}.csv`; checkpoints are managed by
/// the `CheckpointStore`.
pub struct OhlcDownloader<'a> {
    client: FetchClient<'a>,
    checkpoints: CheckpointStore,
    data_dir: PathBuf,
    options: PagingOptions,
}

impl<'a> OhlcDownloader<'a> {
    pub fn new(
        client: FetchClient<'a>,
        checkpoints: CheckpointStore,
        data_dir: impl Into<PathBuf>,
        options: PagingOptions,
    ) -> Self {
        Self {
            client,
            checkpoints,
            data_dir: data_dir.into(),
            options,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Sink file for a token.
    pub fn sink_path(&self, entity: &EntityId) -> PathBuf {
        self.data_dir.join(format!("{entity}.csv"))
    }

    pub fn checkpoints(&self) -> &CheckpointStore {
        &self.checkpoints
    }

    /// Drain pagination for one token, resuming from its checkpoint.
    pub fn run(
        &self,
        entity: &EntityId,
        progress: &dyn DownloadProgress,
    ) -> Result<EntityReport, DataError> {
        let sink = CsvSink::new(self.sink_path(entity));

        let resumed_from = self.checkpoints.load(entity)?;
        if let Some(cursor) = &resumed_from {
            log::debug!("[{entity}] resuming from cursor {cursor}");
        }

        let mut report = EntityReport {
            entity: entity.clone(),
            resumed_from: resumed_from.clone(),
            pages: 0,
            rows: 0,
            last_cursor: resumed_from.clone(),
            reason: DrainReason::Exhausted,
        };
        let mut cursor = resumed_from;

        loop {
            let request = PageRequest {
                entity: entity.clone(),
                page_size: self.options.page_size,
                cursor: cursor.clone(),
            };
            let page = self.client.fetch(&request)?;
            if page.is_empty() {
                report.reason = DrainReason::Exhausted;
                return Ok(report);
            }

            let next = page.next_cursor().cloned().ok_or_else(|| {
                DataError::Upstream(format!(
                    "non-empty page for {entity} carried no next cursor"
                ))
            })?;

            let records = format_records(&page.results)?;
            let written = sink.append(&records)?;
            self.checkpoints.save(entity, &next)?;

            report.pages += 1;
            report.rows += written;
            report.last_cursor = Some(next.clone());
            progress.on_page(entity, written, &next);

            if let Some(max) = self.options.max_pages {
                if report.pages >= max {
                    report.reason = DrainReason::PageLimit;
                    return Ok(report);
                }
            }

            cursor = Some(next);
            self.client.sleeper().sleep(self.options.politeness_delay);
        }
    }
}

/// Drain every token in order, isolating failures per token.
///
/// A failing token is recorded in the summary and the next token proceeds.
pub fn download_entities(
    downloader: &OhlcDownloader<'_>,
    entities: &[EntityId],
    progress: &dyn DownloadProgress,
) -> DownloadSummary {
    let total = entities.len();
    let mut summary = DownloadSummary {
        total,
        reports: Vec::new(),
        errors: Vec::new(),
    };

    for (i, entity) in entities.iter().enumerate() {
        let result = downloader.run(entity, progress);
        progress.on_entity_complete(entity, i, total, &result);

        match result {
            Ok(report) => summary.reports.push(report),
            Err(e) => summary.errors.push((entity.clone(), e)),
        }
    }

    summary
}

/// Summary of a multi-token download.
#[derive(Debug)]
pub struct DownloadSummary {
    pub total: usize,
    pub reports: Vec<EntityReport>,
    pub errors: Vec<(EntityId, DataError)>,
}

impl DownloadSummary {
    pub fn succeeded(&self) -> usize {
        self.reports.len()
    }

    pub fn failed(&self) -> usize {
        self.errors.len()
    }

    pub fn all_succeeded(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.reports.iter().map(|r| r.rows).sum()
    }
}
