//! Shared retry loop for HTTP model services
//!
//! - HTTP 429 and 5xx: retry with exponential backoff
//! - other HTTP 4xx: fail immediately
//! - network errors: retry

use reqwest::{RequestBuilder, Response};
use std::time::Duration;

/// Backoff before retry `attempt` (1-based): 1s, 2s, 4s, ... capped at 32s
pub(crate) fn backoff_delay(attempt: u32) -> Duration {
    Duration::from_secs(1 << (attempt.saturating_sub(1)).min(5))
}

/// Send the request built by `make_request` up to `max_retries + 1` times.
///
/// Returns the first successful response, or a message describing the last
/// failure. `service` names the backend in messages.
pub(crate) async fn send_with_retry<F>(
    service: &str,
    max_retries: u32,
    make_request: F,
) -> std::result::Result<Response, String>
where
    F: Fn() -> RequestBuilder,
{
    let mut last_err = None;

    for attempt in 0..=max_retries {
        if attempt > 0 {
            let delay = backoff_delay(attempt);
            tracing::debug!(
                "Retrying {} request (attempt {}/{}) after {:?}",
                service,
                attempt + 1,
                max_retries + 1,
                delay
            );
            tokio::time::sleep(delay).await;
        }

        match make_request().send().await {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return Ok(response);
                }

                let body = response.text().await.unwrap_or_default();
                let message = format!("{} API error {}: {}", service, status, body);
                if status.as_u16() == 429 || status.is_server_error() {
                    tracing::warn!("{}", message);
                    last_err = Some(message);
                    continue;
                }
                return Err(message);
            }
            Err(e) => {
                tracing::warn!("{} connection error: {}", service, e);
                last_err = Some(format!("{} connection error: {}", service, e));
            }
        }
    }

    Err(last_err.unwrap_or_else(|| format!("{} request failed after retries", service)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        assert_eq!(backoff_delay(1), Duration::from_secs(1));
        assert_eq!(backoff_delay(2), Duration::from_secs(2));
        assert_eq!(backoff_delay(3), Duration::from_secs(4));
        assert_eq!(backoff_delay(20), Duration::from_secs(32));
    }
}
