//! Data download: fetch, checkpoint, sink, and the loops that tie them together.

pub mod backoff;
pub mod checkpoint;
pub mod download;
pub mod format;
pub mod metadata;
pub mod provider;
pub mod sink;
pub mod syve;
pub mod token_list;

pub use backoff::{retry_rate_limited, FetchClient, RetryPolicy, Sleeper, ThreadSleeper};
pub use checkpoint::CheckpointStore;
pub use download::{
    download_entities, DownloadSummary, DrainReason, EntityReport, OhlcDownloader, PagingOptions,
};
pub use format::{format_records, round_significant, OhlcRecord, OHLC_HEADER, PRICE_SIG_FIGS};
pub use metadata::{MetadataDownloader, MetadataOptions, MetadataReport};
pub use provider::{
    DataError, DownloadProgress, LogProgress, MetadataSource, NoProgress, PageRequest,
    PageResponse, PageSource, RawRecord,
};
pub use sink::{CsvSink, SinkRecord};
pub use syve::SyveClient;
pub use token_list::TokenList;
