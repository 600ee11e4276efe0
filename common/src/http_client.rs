use crate::errors::{AppError, FetchErrorKind};
use reqwest::Client;
use std::time::Duration;
use tracing::{Instrument, error, info, instrument, warn};

/// Exponential backoff schedule for retried requests.
///
/// The wait after failed attempt `n` (1-based) is
/// `multiplier * 2^(n - 1)`, clamped to `[min_backoff, max_backoff]`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub multiplier: Duration,
    pub min_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn backoff_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let raw = self.multiplier.saturating_mul(1_u32 << exponent);
        raw.clamp(self.min_backoff, self.max_backoff.max(self.min_backoff))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        // 1s, 2s between three attempts; capped at 4s
        Self {
            max_attempts: 3,
            multiplier: Duration::from_secs(1),
            min_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(4),
        }
    }
}

/// HTTP client with retry logic and timeout
pub struct HttpClient {
    client: Client,
    retry: RetryPolicy,
    timeout: Duration,
}

impl HttpClient {
    pub fn new(timeout: Duration, retry: RetryPolicy) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            retry,
            timeout,
        })
    }

    /// Fetch JSON from URL with retry and exponential backoff.
    ///
    /// Only transient failures are retried. The returned error is always an
    /// [`AppError::FetchError`] wrapping the last attempt's failure.
    pub async fn get_json<T>(&self, url: &str) -> Result<T, AppError>
    where
        T: serde::de::DeserializeOwned,
    {
        self.get_json_with_attempts(url).await.map(|(body, _)| body)
    }

    /// Like [`HttpClient::get_json`], also returning the attempt that succeeded.
    #[instrument(skip(self), fields(url = %url))]
    pub async fn get_json_with_attempts<T>(&self, url: &str) -> Result<(T, u32), AppError>
    where
        T: serde::de::DeserializeOwned,
    {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;
            let span = tracing::info_span!("http_request", attempt);

            let err = match self.fetch_with_timeout(url).instrument(span).await {
                Ok(response) => {
                    info!(url = %url, attempt, "Request successful");
                    return Ok((response, attempt));
                }
                Err(e) => e,
            };

            if !err.is_transient() {
                warn!(url = %url, attempt, error = %err, "Request failed permanently, not retrying");
                return Err(AppError::fetch(FetchErrorKind::Permanent, attempt, err));
            }

            if attempt >= max_attempts {
                error!(
                    url = %url,
                    attempts = attempt,
                    error = %err,
                    "All retry attempts exhausted"
                );
                return Err(AppError::fetch(FetchErrorKind::Transient, attempt, err));
            }

            let backoff = self.retry.backoff_after(attempt);
            warn!(
                url = %url,
                attempt,
                backoff_ms = backoff.as_millis(),
                error = %err,
                "Request failed, retrying with exponential backoff"
            );
            tokio::time::sleep(backoff).await;
        }
    }

    async fn fetch_with_timeout<T>(&self, url: &str) -> Result<T, AppError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = tokio::time::timeout(self.timeout, self.client.get(url).send())
            .await
            .map_err(|_| AppError::timeout(format!("Request to {} timed out", url)))?
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::timeout(format!("Request to {} timed out", url))
                } else {
                    AppError::NetworkError(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::http(
                status.as_u16(),
                format!("HTTP error: {}", status),
            ));
        }

        let text = response.text().await.map_err(AppError::NetworkError)?;
        let json: T = serde_json::from_str(&text).map_err(AppError::ParseError)?;

        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff_after(1), Duration::from_secs(1));
        assert_eq!(policy.backoff_after(2), Duration::from_secs(2));
        assert_eq!(policy.backoff_after(3), Duration::from_secs(4));
        assert_eq!(policy.backoff_after(10), Duration::from_secs(4));
    }

    #[test]
    fn backoff_respects_minimum() {
        let policy = RetryPolicy {
            max_attempts: 3,
            multiplier: Duration::from_millis(100),
            min_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(2),
        };
        assert_eq!(policy.backoff_after(1), Duration::from_millis(500));
        assert_eq!(policy.backoff_after(4), Duration::from_millis(800));
        assert_eq!(policy.backoff_after(6), Duration::from_secs(2));
    }
}
