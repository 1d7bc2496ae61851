//! Download configuration.
//!
//! Loaded from an optional TOML file; every field has a default so an empty
//! file (or no file) is a valid configuration. The base directory is explicit
//! here and every path below it is derived from this struct.

use crate::data::{DataError, MetadataOptions, PagingOptions, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct TokenlabConfig {
    /// Root of all downloaded data.
    pub base_dir: PathBuf,
    /// JSON array of token addresses. Defaults to `{base_dir}/token_list.json`.
    pub token_list: Option<PathBuf>,
    pub api_base: String,
    /// OHLC bucket interval, e.g. `1m`, `1h`, `1d`.
    pub resolution: String,
    pub page_size: u32,
    /// Stop each token after this many pages.
    pub max_pages: Option<u32>,
    pub politeness_delay_ms: u64,
    pub rate_limit_backoff_ms: u64,
    /// Retry cap for throttled requests; unset retries forever.
    pub max_rate_limit_retries: Option<u32>,
    pub metadata_batch_size: usize,
    pub request_timeout_secs: u64,
}

impl Default for TokenlabConfig {
    fn default() -> Self {
        Self {
            base_dir: PathBuf::from("data"),
            token_list: None,
            api_base: crate::data::syve::DEFAULT_API_BASE.to_string(),
            resolution: "1m".to_string(),
            page_size: 100_000,
            max_pages: None,
            politeness_delay_ms: 1010,
            rate_limit_backoff_ms: 1000,
            max_rate_limit_retries: None,
            metadata_batch_size: 10,
            request_timeout_secs: 30,
        }
    }
}

impl TokenlabConfig {
    /// Load a config from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, DataError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| DataError::Config(format!("read {}: {e}", path.display())))?;
        Self::from_toml(&content)
    }

    /// Parse a config from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, DataError> {
        toml::from_str(content).map_err(|e| DataError::Config(format!("parse config TOML: {e}")))
    }

    /// Reject settings the download loops cannot honor.
    pub fn validate(&self) -> Result<(), DataError> {
        if self.page_size == 0 {
            return Err(DataError::Config("page_size must be positive".into()));
        }
        if self.metadata_batch_size == 0 {
            return Err(DataError::Config("metadata_batch_size must be positive".into()));
        }
        if self.politeness_delay_ms <= 1000 {
            return Err(DataError::Config(format!(
                "politeness_delay_ms must exceed 1000, got {}",
                self.politeness_delay_ms
            )));
        }
        if self.resolution.trim().is_empty() {
            return Err(DataError::Config("resolution must not be empty".into()));
        }
        Ok(())
    }

    /// The token list file, explicit or under `base_dir`.
    pub fn token_list_path(&self) -> PathBuf {
        self.token_list
            .clone()
            .unwrap_or_else(|| self.base_dir.join("token_list.json"))
    }

    /// `{base_dir}/ohlc/{resolution}`, one CSV per token.
    pub fn ohlc_dir(&self) -> PathBuf {
        self.base_dir.join("ohlc").join(&self.resolution)
    }

    /// `{base_dir}/ohlc/{resolution}/checkpoints`, one cursor file per token.
    pub fn checkpoint_dir(&self) -> PathBuf {
        self.ohlc_dir().join("checkpoints")
    }

    /// `{base_dir}/token_metadata.csv`, the shared metadata sink.
    pub fn metadata_path(&self) -> PathBuf {
        self.base_dir.join("token_metadata.csv")
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            backoff: Duration::from_millis(self.rate_limit_backoff_ms),
            max_retries: self.max_rate_limit_retries,
        }
    }

    pub fn paging_options(&self) -> PagingOptions {
        PagingOptions {
            page_size: self.page_size,
            max_pages: self.max_pages,
            politeness_delay: Duration::from_millis(self.politeness_delay_ms),
        }
    }

    pub fn metadata_options(&self) -> MetadataOptions {
        MetadataOptions {
            batch_size: self.metadata_batch_size,
            politeness_delay: Duration::from_millis(self.politeness_delay_ms),
            retry: self.retry_policy(),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_is_default() {
        let config = TokenlabConfig::from_toml("").unwrap();
        assert_eq!(config, TokenlabConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn partial_toml_overrides_fields() {
        let config = TokenlabConfig::from_toml(
            r#"
base_dir = "/srv/prices"
resolution = "1h"
max_pages = 3
max_rate_limit_retries = 20
"#,
        )
        .unwrap();

        assert_eq!(config.page_size, 100_000);
        assert_eq!(config.max_pages, Some(3));
        assert_eq!(config.ohlc_dir(), PathBuf::from("/srv/prices/ohlc/1h"));
        assert_eq!(
            config.checkpoint_dir(),
            PathBuf::from("/srv/prices/ohlc/1h/checkpoints")
        );
        assert_eq!(
            config.metadata_path(),
            PathBuf::from("/srv/prices/token_metadata.csv")
        );
        assert_eq!(
            config.token_list_path(),
            PathBuf::from("/srv/prices/token_list.json")
        );
        assert_eq!(config.retry_policy().max_retries, Some(20));
        assert_eq!(config.retry_policy().backoff, Duration::from_secs(1));
    }

    #[test]
    fn explicit_token_list_wins_over_base_dir() {
        let config = TokenlabConfig::from_toml(
            r#"
base_dir = "/srv"
token_list = "/etc/tokenlab/tokens.json"
"#,
        )
        .unwrap();
        assert_eq!(
            config.token_list_path(),
            PathBuf::from("/etc/tokenlab/tokens.json")
        );
        assert_eq!(
            TokenlabConfig::default().token_list_path(),
            PathBuf::from("data/token_list.json")
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err = TokenlabConfig::from_toml("page_sise = 10").unwrap_err();
        assert!(matches!(err, DataError::Config(_)));
    }

    #[test]
    fn validate_rejects_short_politeness_delay() {
        let config = TokenlabConfig {
            politeness_delay_ms: 1000,
            ..TokenlabConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_sizes() {
        let config = TokenlabConfig {
            page_size: 0,
            ..TokenlabConfig::default()
        };
        assert!(config.validate().is_err());

        let config = TokenlabConfig {
            metadata_batch_size: 0,
            ..TokenlabConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
