//! Fetch tuning: timeouts, politeness delays and the retry/backoff policy.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::AppError;

/// Desktop browser User-Agent sent unless overridden.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";

/// HTTP statuses worth retrying.
const RETRYABLE_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Retry budget and exponential backoff.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub retries: u32,
    /// Backoff before retry `n` is `backoff_factor * 2^(n-1)`.
    pub backoff_factor: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            retries: 4,
            backoff_factor: Duration::from_millis(600),
            max_backoff: Duration::from_secs(120),
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable_status(status: u16) -> bool {
        RETRYABLE_STATUSES.contains(&status)
    }

    /// Computed backoff before retry `attempt` (1-based).
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(31);
        let secs = self.backoff_factor.as_secs_f64() * f64::from(1u32 << exp);
        Duration::from_secs_f64(secs.min(self.max_backoff.as_secs_f64()))
    }

    /// Delay before retry `attempt`; a server-sent `Retry-After` wins.
    pub fn delay_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(d) => d.min(self.max_backoff),
            None => self.backoff_for(attempt),
        }
    }
}

/// Parse a `Retry-After` header value: delta-seconds or an HTTP-date.
///
/// Dates in the past yield a zero delay.
pub fn parse_retry_after(value: &str, now: DateTime<Utc>) -> Option<Duration> {
    let value = value.trim();
    if let Ok(secs) = value.parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = DateTime::parse_from_rfc2822(value).ok()?.with_timezone(&Utc);
    Some((at - now).to_std().unwrap_or(Duration::ZERO))
}

/// [`parse_retry_after`] relative to the current time.
pub fn retry_after_delay(value: &str) -> Option<Duration> {
    parse_retry_after(value, Utc::now())
}

/// Everything a fetcher needs to know about how to talk to the site.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchConfig {
    pub user_agent: String,
    pub connect_timeout: Duration,
    pub timeout: Duration,
    /// Lower bound of the random pre-request sleep.
    pub min_delay: Duration,
    /// Upper bound of the random pre-request sleep.
    pub max_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            connect_timeout: Duration::from_secs(10),
            timeout: Duration::from_secs(25),
            min_delay: Duration::from_millis(600),
            max_delay: Duration::from_millis(1600),
            retry: RetryPolicy::default(),
        }
    }
}

impl FetchConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.min_delay > self.max_delay {
            return Err(AppError::ConfigError(format!(
                "min delay ({:.2}s) must not exceed max delay ({:.2}s)",
                self.min_delay.as_secs_f64(),
                self.max_delay.as_secs_f64()
            )));
        }
        if self.timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(AppError::ConfigError(
                "timeouts must be greater than zero".into(),
            ));
        }
        if self.user_agent.trim().is_empty() {
            return Err(AppError::ConfigError("user agent must not be empty".into()));
        }
        Ok(())
    }
}

/// Convert a user-supplied number of seconds into a `Duration`.
pub fn seconds(value: f64, name: &str) -> Result<Duration, AppError> {
    Duration::try_from_secs_f64(value)
        .map_err(|_| AppError::ConfigError(format!("{name} must be a non-negative number of seconds")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn retryable_statuses() {
        for s in [429, 500, 502, 503, 504] {
            assert!(RetryPolicy::is_retryable_status(s));
        }
        for s in [200, 301, 400, 403, 404, 501] {
            assert!(!RetryPolicy::is_retryable_status(s));
        }
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_for(1), Duration::from_millis(600));
        assert_eq!(policy.backoff_for(2), Duration::from_millis(1200));
        assert_eq!(policy.backoff_for(3), Duration::from_millis(2400));
        assert_eq!(policy.backoff_for(20), Duration::from_secs(120));
    }

    #[test]
    fn retry_after_overrides_backoff() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(7))),
            Duration::from_secs(7)
        );
        assert_eq!(
            policy.delay_for(1, Some(Duration::from_secs(3600))),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn parses_retry_after_forms() {
        let now = Utc.with_ymd_and_hms(2015, 10, 21, 7, 27, 0).unwrap();
        assert_eq!(parse_retry_after("120", now), Some(Duration::from_secs(120)));
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT", now),
            Some(Duration::from_secs(60))
        );
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:00:00 GMT", now),
            Some(Duration::ZERO)
        );
        assert_eq!(parse_retry_after("soon", now), None);
    }

    #[test]
    fn validate_rejects_inverted_delays() {
        let config = FetchConfig {
            min_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(1),
            ..FetchConfig::default()
        };
        assert!(matches!(config.validate(), Err(AppError::ConfigError(_))));
        assert!(FetchConfig::default().validate().is_ok());
    }

    #[test]
    fn seconds_rejects_negative() {
        assert_eq!(seconds(0.5, "delay").unwrap(), Duration::from_millis(500));
        assert!(seconds(-1.0, "delay").is_err());
        assert!(seconds(f64::NAN, "delay").is_err());
    }
}
