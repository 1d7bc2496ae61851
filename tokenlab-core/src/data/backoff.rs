//! Rate-limit backoff and the paginated fetch client.
//!
//! When the upstream answers HTTP 429 the identical request is retried after a
//! fixed backoff. By default there is no retry cap: throttling is expected to
//! clear, and the download is a long-running batch job. A cap can be
//! configured, in which case the last throttled attempt surfaces as
//! `DataError::RateLimitExhausted`.

use super::provider::{DataError, PageRequest, PageResponse, PageSource};
use std::time::Duration;

/// Blocking sleep, injectable so tests can observe delays without waiting.
pub trait Sleeper {
    fn sleep(&self, duration: Duration);
}

/// Real sleeper backed by `std::thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadSleeper;

impl Sleeper for ThreadSleeper {
    fn sleep(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Retry policy for throttled requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Fixed wait between a throttled attempt and its retry.
    pub backoff: Duration,
    /// Maximum number of retries; `None` retries forever.
    pub max_retries: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(1),
            max_retries: None,
        }
    }
}

/// Run `op` until it returns anything other than `DataError::RateLimited`.
///
/// Every other error is returned untouched on the first occurrence.
pub fn retry_rate_limited<T, F>(
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
    mut op: F,
) -> Result<T, DataError>
where
    F: FnMut() -> Result<T, DataError>,
{
    let mut retries: u32 = 0;
    loop {
        match op() {
            Err(DataError::RateLimited) => {
                if let Some(max) = policy.max_retries {
                    if retries >= max {
                        return Err(DataError::RateLimitExhausted {
                            attempts: retries + 1,
                        });
                    }
                }
                retries += 1;
                log::warn!(
                    "rate limited, retrying in {:?} (retry {retries})",
                    policy.backoff
                );
                sleeper.sleep(policy.backoff);
            }
            other => return other,
        }
    }
}

/// Page fetcher that layers the retry policy over a `PageSource`.
pub struct FetchClient<'a> {
    source: &'a dyn PageSource,
    sleeper: &'a dyn Sleeper,
    policy: RetryPolicy,
}

impl<'a> FetchClient<'a> {
    pub fn new(source: &'a dyn PageSource, sleeper: &'a dyn Sleeper, policy: RetryPolicy) -> Self {
        Self {
            source,
            sleeper,
            policy,
        }
    }

    /// Fetch one page, retrying the identical request while throttled.
    pub fn fetch(&self, request: &PageRequest) -> Result<PageResponse, DataError> {
        retry_rate_limited(&self.policy, self.sleeper, || self.source.fetch_page(request))
    }

    pub fn sleeper(&self) -> &dyn Sleeper {
        self.sleeper
    }
}
