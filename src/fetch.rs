use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::country::CountryCode;
use crate::provider::{ReviewProvider, SortOrder};
use crate::review::RawReviewRecord;

/// How often a failed page is retried before it is given up on.
/// The default performs no retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub retries: u32,
    /// Delay before the first retry, doubled for every following one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 0,
            base_delay: Duration::from_millis(500),
        }
    }
}

/// Result of asking for one page. A provider error never escapes the fetcher,
/// it is reported as `Failed` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum PageOutcome {
    Page(Vec<RawReviewRecord>),
    Failed(String),
    /// Cancellation was observed before a (re)try could start.
    Cancelled,
}

/// Fetches single pages of most recent reviews from a provider.
#[derive(Clone)]
pub struct ReviewPageFetcher {
    provider: Arc<dyn ReviewProvider>,
    retry: RetryPolicy,
}

impl ReviewPageFetcher {
    pub fn new(provider: Arc<dyn ReviewProvider>, retry: RetryPolicy) -> Self {
        Self { provider, retry }
    }

    /// No attempt is started once `cancel` has fired, and a pending retry delay is cut
    /// short by it.
    pub async fn fetch(
        &self,
        app_id: &str,
        country: &CountryCode,
        page: u32,
        cancel: &CancellationToken,
    ) -> PageOutcome {
        let country_lc = country.for_provider();
        let mut attempt = 0;

        loop {
            if cancel.is_cancelled() {
                return PageOutcome::Cancelled;
            }

            match self
                .provider
                .fetch_reviews_page(app_id, &country_lc, page, SortOrder::Recent)
                .await
            {
                Ok(records) => {
                    debug!(app_id, %country, page, count = records.len(), "fetched page");
                    return PageOutcome::Page(records);
                }
                Err(e) if attempt < self.retry.retries => {
                    let delay = self.retry.base_delay * 2u32.saturating_pow(attempt);
                    attempt += 1;
                    warn!(app_id, %country, page, attempt, error = %e, "page fetch failed, retrying in {delay:?}");
                    tokio::select! {
                        _ = cancel.cancelled() => return PageOutcome::Cancelled,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                Err(e) => return PageOutcome::Failed(e.to_string()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::provider::Platform;
    use crate::{Error, Result};

    /// Fails the first `failures` calls, then serves one record. When `cancel_on_call`
    /// is set, the token is cancelled as soon as the provider is first reached.
    struct Flaky {
        failures: u32,
        cancel_on_call: Option<CancellationToken>,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ReviewProvider for Flaky {
        fn platform(&self) -> Platform {
            Platform::Ios
        }

        async fn fetch_reviews_page(
            &self,
            _app_id: &str,
            country: &str,
            _page: u32,
            _sort: SortOrder,
        ) -> Result<Vec<RawReviewRecord>> {
            if let Some(cancel) = &self.cancel_on_call {
                cancel.cancel();
            }
            let mut calls = self.calls.lock().unwrap();
            calls.push(country.to_string());
            if calls.len() as u32 <= self.failures {
                Err(Error::UnexpectedShape("boom".into()))
            } else {
                Ok(vec![RawReviewRecord::default()])
            }
        }
    }

    fn flaky(failures: u32) -> Arc<Flaky> {
        Arc::new(Flaky {
            failures,
            cancel_on_call: None,
            calls: Mutex::new(Vec::new()),
        })
    }

    #[tokio::test]
    async fn lowercases_country_for_the_provider() {
        let provider = flaky(0);
        let fetcher = ReviewPageFetcher::new(provider.clone(), RetryPolicy::default());

        let outcome = fetcher
            .fetch("123", &"VN".parse().unwrap(), 1, &CancellationToken::new())
            .await;

        assert_eq!(outcome, PageOutcome::Page(vec![RawReviewRecord::default()]));
        assert_eq!(*provider.calls.lock().unwrap(), ["vn"]);
    }

    #[tokio::test]
    async fn provider_errors_become_failed_pages() {
        let fetcher = ReviewPageFetcher::new(flaky(1), RetryPolicy::default());

        let outcome = fetcher
            .fetch("123", &"US".parse().unwrap(), 1, &CancellationToken::new())
            .await;

        assert!(matches!(outcome, PageOutcome::Failed(reason) if reason.contains("boom")));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_are_bounded() {
        let retry = RetryPolicy {
            retries: 2,
            base_delay: Duration::from_millis(10),
        };
        let cancel = CancellationToken::new();

        let provider = flaky(2);
        let outcome = ReviewPageFetcher::new(provider.clone(), retry)
            .fetch("123", &"US".parse().unwrap(), 1, &cancel)
            .await;
        assert!(matches!(outcome, PageOutcome::Page(_)));
        assert_eq!(provider.calls.lock().unwrap().len(), 3);

        let provider = flaky(5);
        let outcome = ReviewPageFetcher::new(provider.clone(), retry)
            .fetch("123", &"US".parse().unwrap(), 1, &cancel)
            .await;
        assert!(matches!(outcome, PageOutcome::Failed(_)));
        assert_eq!(provider.calls.lock().unwrap().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_retrying() {
        let cancel = CancellationToken::new();
        let provider = Arc::new(Flaky {
            failures: u32::MAX,
            cancel_on_call: Some(cancel.clone()),
            calls: Mutex::new(Vec::new()),
        });
        let retry = RetryPolicy {
            retries: 5,
            base_delay: Duration::from_secs(1),
        };
        let started = tokio::time::Instant::now();

        let outcome = ReviewPageFetcher::new(provider.clone(), retry)
            .fetch("123", &"US".parse().unwrap(), 1, &cancel)
            .await;

        assert_eq!(outcome, PageOutcome::Cancelled);
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_cuts_the_backoff_short() {
        let cancel = CancellationToken::new();
        let provider = flaky(u32::MAX);
        let retry = RetryPolicy {
            retries: 3,
            base_delay: Duration::from_secs(60),
        };

        tokio::spawn({
            let cancel = cancel.clone();
            async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                cancel.cancel();
            }
        });
        let outcome = ReviewPageFetcher::new(provider.clone(), retry)
            .fetch("123", &"US".parse().unwrap(), 1, &cancel)
            .await;

        assert_eq!(outcome, PageOutcome::Cancelled);
        assert_eq!(provider.calls.lock().unwrap().len(), 1);
    }
}
