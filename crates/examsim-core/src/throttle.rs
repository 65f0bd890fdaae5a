//! Politeness delay for fetching.
//!
//! Wraps any [`Fetcher`] and sleeps a uniformly random duration before each
//! request. Each worker owns its own wrapper, so this bounds the rate of one
//! worker only: the aggregate rate is roughly `workers / mean(delay)`.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use examsim_core::throttle::{ThrottledFetcher, ThrottleConfig};
//!
//! # use examsim_core::traits::Fetcher;
//! # struct MyFetcher;
//! # impl Fetcher for MyFetcher {
//! #     async fn fetch(&self, _: &str) -> Result<String, examsim_core::error::AppError> { todo!() }
//! # }
//! let config = ThrottleConfig::new(Duration::from_millis(600), Duration::from_millis(1600));
//! let fetcher = ThrottledFetcher::new(MyFetcher, config);
//! ```

use std::time::Duration;

use rand::Rng;

use crate::error::AppError;
use crate::retry::FetchConfig;
use crate::traits::Fetcher;

/// Bounds of the random pre-request sleep.
#[derive(Debug, Clone, PartialEq)]
pub struct ThrottleConfig {
    pub min_delay: Duration,
    pub max_delay: Duration,
}

impl ThrottleConfig {
    /// Sleep uniformly in `[min_delay, max_delay]`.
    pub fn new(min_delay: Duration, max_delay: Duration) -> Self {
        Self {
            min_delay,
            max_delay,
        }
    }

    /// No sleep at all.
    pub fn none() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }

    pub fn from_fetch_config(config: &FetchConfig) -> Self {
        Self::new(config.min_delay, config.max_delay)
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.min_delay > self.max_delay {
            return Err(AppError::ConfigError(
                "min delay must not exceed max delay".into(),
            ));
        }
        Ok(())
    }

    /// Draw one delay.
    fn sample(&self) -> Duration {
        if self.max_delay <= self.min_delay {
            return self.min_delay;
        }
        let lo = self.min_delay.as_secs_f64();
        let hi = self.max_delay.as_secs_f64();
        Duration::from_secs_f64(rand::thread_rng().gen_range(lo..=hi))
    }
}

impl Default for ThrottleConfig {
    /// 0.6 to 1.6 seconds.
    fn default() -> Self {
        Self::new(Duration::from_millis(600), Duration::from_millis(1600))
    }
}

/// A [`Fetcher`] wrapper that sleeps a random delay before every request.
pub struct ThrottledFetcher<F> {
    inner: F,
    config: ThrottleConfig,
}

impl<F: Fetcher> ThrottledFetcher<F> {
    pub fn new(inner: F, config: ThrottleConfig) -> Self {
        Self { inner, config }
    }
}

impl<F: Fetcher> Fetcher for ThrottledFetcher<F> {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        let delay = self.config.sample();
        if !delay.is_zero() {
            tracing::debug!(url = %url, sleep_ms = %delay.as_millis(), "Throttling request");
            tokio::time::sleep(delay).await;
        }
        self.inner.fetch(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::MockFetcher;
    use std::time::Instant;

    #[test]
    fn sample_is_bounded() {
        let config = ThrottleConfig::new(Duration::from_millis(100), Duration::from_millis(150));
        for _ in 0..200 {
            let d = config.sample();
            assert!(d >= Duration::from_millis(100));
            assert!(d <= Duration::from_millis(150));
        }
    }

    #[test]
    fn equal_bounds_are_fixed() {
        let config = ThrottleConfig::new(Duration::from_millis(40), Duration::from_millis(40));
        assert_eq!(config.sample(), Duration::from_millis(40));
        assert_eq!(ThrottleConfig::none().sample(), Duration::ZERO);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let config = ThrottleConfig::new(Duration::from_secs(2), Duration::from_secs(1));
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
        assert!(ThrottleConfig::default().validate().is_ok());
    }

    #[tokio::test]
    async fn sleeps_before_every_request() {
        let inner = MockFetcher::with_responses(vec![Ok("a".into()), Ok("b".into())]);
        let config = ThrottleConfig::new(Duration::from_millis(50), Duration::from_millis(60));
        let fetcher = ThrottledFetcher::new(inner.clone(), config);

        let start = Instant::now();
        fetcher.fetch("http://example.com/1").await.unwrap();
        fetcher.fetch("http://example.com/2").await.unwrap();
        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(
            inner.calls(),
            vec!["http://example.com/1", "http://example.com/2"]
        );
    }

    #[tokio::test]
    async fn passes_through_errors() {
        let inner = MockFetcher::with_error(AppError::HttpError("fail".into()));
        let fetcher = ThrottledFetcher::new(inner, ThrottleConfig::none());

        let err = fetcher.fetch("http://example.com").await.unwrap_err();
        assert!(matches!(err, AppError::HttpError(_)));
    }
}
