//! TokenLab CLI: download token OHLC history and ERC-20 metadata.
//!
//! Modes (combinable, at least one required):
//! - `--metadata`: fetch metadata for every listed token not yet in
//!   `{base_dir}/token_metadata.csv`
//! - `--ohlc`: drain OHLC buckets per token into
//!   `{base_dir}/ohlc/{resolution}/{address}.csv`, resuming from checkpoints

use anyhow::{bail, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tokenlab_core::config::TokenlabConfig;
use tokenlab_core::data::{
    download_entities, CheckpointStore, CsvSink, FetchClient, LogProgress, MetadataDownloader,
    OhlcDownloader, SyveClient, ThreadSleeper, TokenList,
};

#[derive(Parser)]
#[command(
    name = "tokenlab",
    about = "TokenLab CLI: resumable token price and metadata downloader"
)]
struct Cli {
    /// Download token metadata.
    #[arg(long, default_value_t = false)]
    metadata: bool,

    /// Download OHLC price history.
    #[arg(long, default_value_t = false)]
    ohlc: bool,

    /// OHLC bucket interval (e.g. 1m, 1h, 1d).
    #[arg(long)]
    resolution: Option<String>,

    /// TOML config file. Flags below override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data directory. Defaults to ./data.
    #[arg(long)]
    base_dir: Option<PathBuf>,

    /// JSON array of token addresses. Defaults to {base_dir}/token_list.json.
    #[arg(long)]
    token_list: Option<PathBuf>,

    /// Buckets per page request.
    #[arg(long)]
    page_size: Option<u32>,

    /// Stop each token after this many pages.
    #[arg(long)]
    max_pages: Option<u32>,

    /// Give up on a request after this many throttled retries (default: never).
    #[arg(long)]
    max_rate_limit_retries: Option<u32>,
}

impl Cli {
    /// Resolve the effective config: file (or defaults), then flag overrides.
    fn config(&self) -> Result<TokenlabConfig> {
        let mut config = match &self.config {
            Some(path) => TokenlabConfig::from_file(path)?,
            None => TokenlabConfig::default(),
        };

        if let Some(resolution) = &self.resolution {
            config.resolution = resolution.clone();
        }
        if let Some(base_dir) = &self.base_dir {
            config.base_dir = base_dir.clone();
        }
        if let Some(token_list) = &self.token_list {
            config.token_list = Some(token_list.clone());
        }
        if let Some(page_size) = self.page_size {
            config.page_size = page_size;
        }
        if self.max_pages.is_some() {
            config.max_pages = self.max_pages;
        }
        if self.max_rate_limit_retries.is_some() {
            config.max_rate_limit_retries = self.max_rate_limit_retries;
        }

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    if !cli.metadata && !cli.ohlc {
        bail!("please specify --metadata or --ohlc");
    }

    let config = cli.config()?;
    let token_list = config.token_list_path();
    let tokens = TokenList::from_file(&token_list)?;
    log::info!(
        "loaded {} tokens from {}",
        tokens.len(),
        token_list.display()
    );

    let client = SyveClient::new(
        config.api_base.clone(),
        config.resolution.clone(),
        config.request_timeout(),
    )?;
    let sleeper = ThreadSleeper;
    let progress = LogProgress;

    if cli.metadata {
        run_metadata(&config, &client, &sleeper, &tokens, &progress)?;
    }

    if cli.ohlc {
        let failed = run_ohlc(&config, &client, &sleeper, &tokens, &progress);
        if failed > 0 {
            std::process::exit(1);
        }
    }

    Ok(())
}

fn run_metadata(
    config: &TokenlabConfig,
    client: &SyveClient,
    sleeper: &ThreadSleeper,
    tokens: &TokenList,
    progress: &LogProgress,
) -> Result<()> {
    let downloader = MetadataDownloader::new(
        client,
        sleeper,
        CsvSink::new(config.metadata_path()),
        config.metadata_options(),
    );
    let report = downloader.run(tokens.tokens(), progress)?;
    log::info!(
        "metadata done: {} rows in {} batches ({} already present)",
        report.rows,
        report.batches,
        report.already_present
    );
    Ok(())
}

/// Returns the number of tokens that failed.
fn run_ohlc(
    config: &TokenlabConfig,
    client: &SyveClient,
    sleeper: &ThreadSleeper,
    tokens: &TokenList,
    progress: &LogProgress,
) -> usize {
    log::info!(
        "downloading {} OHLC buckets into {}",
        client.interval(),
        config.ohlc_dir().display()
    );

    let downloader = OhlcDownloader::new(
        FetchClient::new(client, sleeper, config.retry_policy()),
        CheckpointStore::new(config.checkpoint_dir()),
        config.ohlc_dir(),
        config.paging_options(),
    );
    let summary = download_entities(&downloader, tokens.tokens(), progress);

    log::info!(
        "Download complete: {}/{} succeeded, {} failed, {} rows written",
        summary.succeeded(),
        summary.total,
        summary.failed(),
        summary.rows()
    );
    for (token, err) in &summary.errors {
        eprintln!("Error for {token}: {err}");
    }
    summary.failed()
}

/// `[18-Oct-2026 14:03:07] [12.3456] [tokenlab::ohlc] message`
fn init_logging() {
    let started = Instant::now();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format(move |buf, record| {
            writeln!(
                buf,
                "[{}] [{:.4}] [{}] {}",
                chrono::Local::now().format("%d-%b-%Y %H:%M:%S"),
                started.elapsed().as_secs_f64(),
                record.target(),
                record.args()
            )
        })
        .init();
}
