//! Batched token metadata download.
//!
//! The shared metadata sink is the only record of what has been downloaded:
//! its first column (the token address) is scanned at the start of every run
//! and those tokens are skipped. No separate checkpoint exists.

use super::backoff::{retry_rate_limited, RetryPolicy, Sleeper};
use super::provider::{DataError, DownloadProgress, MetadataSource};
use super::sink::CsvSink;
use crate::domain::EntityId;
use std::collections::HashSet;
use std::time::Duration;

/// Batching settings for the metadata loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataOptions {
    /// Ids per upstream request.
    pub batch_size: usize,
    /// Pause between consecutive batch requests.
    pub politeness_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for MetadataOptions {
    fn default() -> Self {
        Self {
            batch_size: 10,
            politeness_delay: Duration::from_millis(1010),
            retry: RetryPolicy::default(),
        }
    }
}

/// Outcome of a metadata run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataReport {
    /// Tokens already present in the sink before this run.
    pub already_present: usize,
    /// Tokens requested during this run.
    pub requested: usize,
    pub batches: usize,
    /// Rows appended during this run.
    pub rows: usize,
}

pub struct MetadataDownloader<'a> {
    source: &'a dyn MetadataSource,
    sleeper: &'a dyn Sleeper,
    sink: CsvSink,
    options: MetadataOptions,
}

impl<'a> MetadataDownloader<'a> {
    pub fn new(
        source: &'a dyn MetadataSource,
        sleeper: &'a dyn Sleeper,
        sink: CsvSink,
        options: MetadataOptions,
    ) -> Self {
        Self {
            source,
            sleeper,
            sink,
            options,
        }
    }

    /// Ids that still need metadata, in input order, without repeats.
    pub fn pending(&self, entities: &[EntityId]) -> Result<(Vec<EntityId>, usize), DataError> {
        let visited: HashSet<EntityId> = self
            .sink
            .first_column()?
            .into_iter()
            .map(EntityId::new)
            .collect();

        let mut queued = HashSet::new();
        let pending = entities
            .iter()
            .filter(|id| !visited.contains(*id) && queued.insert((*id).clone()))
            .cloned()
            .collect();
        Ok((pending, visited.len()))
    }

    /// Fetch and append metadata for every token not yet in the sink.
    ///
    /// A malformed batch response aborts the run; batches appended before it
    /// stay in the sink and are skipped next time.
    pub fn run(
        &self,
        entities: &[EntityId],
        progress: &dyn DownloadProgress,
    ) -> Result<MetadataReport, DataError> {
        let (pending, already_present) = self.pending(entities)?;
        log::info!(
            target: "tokenlab::metadata",
            "Running token metadata downloader... already downloaded: {already_present}, to download: {}",
            pending.len()
        );

        let mut report = MetadataReport {
            already_present,
            requested: pending.len(),
            batches: 0,
            rows: 0,
        };

        let batch_size = self.options.batch_size.max(1);
        for (i, batch) in pending.chunks(batch_size).enumerate() {
            if i > 0 {
                self.sleeper.sleep(self.options.politeness_delay);
            }

            let records = retry_rate_limited(&self.options.retry, self.sleeper, || {
                self.source.fetch_metadata(batch)
            })?;
            let written = self.sink.append(&records)?;

            report.batches += 1;
            report.rows += written;
            progress.on_metadata_batch(
                written,
                already_present + report.rows,
                already_present + report.requested,
            );
        }

        Ok(report)
    }
}
