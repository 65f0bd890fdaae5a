use std::time::Duration;

use examsim_core::error::AppError;
use examsim_core::retry::{FetchConfig, RetryPolicy, retry_after_delay};
use examsim_core::traits::{Fetcher, FetcherFactory};
use reqwest::Client;
use reqwest::header::RETRY_AFTER;

/// HTTP fetcher using reqwest.
///
/// Downloads raw HTML with a browser User-Agent, connect and total timeouts,
/// and retries transient failures (429, 5xx gateway errors, connection
/// failures, timeouts) with exponential backoff. A `Retry-After` header
/// replaces the computed backoff.
///
/// Each instance owns its own connection pool.
pub struct ReqwestFetcher {
    client: Client,
    timeout_secs: u64,
    retry: RetryPolicy,
}

/// One failed attempt and whether another is worth making.
struct AttemptError {
    error: AppError,
    retryable: bool,
    retry_after: Option<Duration>,
}

impl AttemptError {
    /// Transport-level failure; retried when the error kind is transient.
    fn new(error: AppError) -> Self {
        Self {
            retryable: error.is_retryable(),
            error,
            retry_after: None,
        }
    }
}

impl ReqwestFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, AppError> {
        config.validate()?;
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .connect_timeout(config.connect_timeout)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::HttpError(e.to_string()))?;

        Ok(Self {
            client,
            timeout_secs: config.timeout.as_secs(),
            retry: config.retry.clone(),
        })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, AttemptError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            AttemptError::new(if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else if e.is_connect() {
                AppError::NetworkError(format!("Connection failed: {e}"))
            } else {
                AppError::HttpError(e.to_string())
            })
        })?;

        let status = response.status();
        if !status.is_success() {
            let code = status.as_u16();
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(retry_after_delay);
            let error = if code == 429 {
                AppError::RateLimitExceeded
            } else {
                AppError::HttpError(format!("HTTP {code} for {url}"))
            };
            return Err(AttemptError {
                error,
                retryable: RetryPolicy::is_retryable_status(code),
                retry_after,
            });
        }

        response.text().await.map_err(|e| {
            AttemptError::new(if e.is_timeout() {
                AppError::Timeout(self.timeout_secs)
            } else {
                AppError::HttpError(format!("Failed to read response body: {e}"))
            })
        })
    }
}

impl Fetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let mut attempt = 0;
        loop {
            let failure = match self.fetch_once(url).await {
                Ok(body) => return Ok(body),
                Err(failure) => failure,
            };
            if !failure.retryable || attempt >= self.retry.retries {
                return Err(failure.error);
            }
            attempt += 1;
            let delay = self.retry.delay_for(attempt, failure.retry_after);
            tracing::warn!(
                url = %url,
                error = %failure.error,
                attempt,
                retries = self.retry.retries,
                sleep_ms = %delay.as_millis(),
                "Transient fetch failure, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }
}

/// Factory building one independent [`ReqwestFetcher`] per worker.
#[derive(Clone)]
pub struct ReqwestFetcherFactory {
    config: FetchConfig,
}

impl ReqwestFetcherFactory {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }
}

impl FetcherFactory for ReqwestFetcherFactory {
    type Fetcher = ReqwestFetcher;

    fn create(&self) -> Result<ReqwestFetcher, AppError> {
        ReqwestFetcher::new(&self.config)
    }
}
