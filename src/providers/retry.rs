use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const RATE_LIMIT_MAX_RETRIES: usize = 5;
const BASE_DELAY: Duration = Duration::from_secs(2);
const MAX_DELAY: Duration = Duration::from_secs(60);

pub(crate) fn is_rate_limited(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status.as_u16() == 529 {
        return true;
    }
    let lower = body.to_lowercase();
    lower.contains("rate limit")
        || lower.contains("too many requests")
        || lower.contains("quota")
        || lower.contains("overloaded")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    value.parse::<u64>().ok().map(Duration::from_secs)
}

/// Doubling delay between rate-limited attempts, capped at one minute.
/// A `retry-after` hint from the server wins when it is longer.
pub(crate) struct Backoff {
    delay: Duration,
}

impl Backoff {
    pub(crate) fn new() -> Self {
        Self { delay: BASE_DELAY }
    }

    pub(crate) async fn wait(
        &mut self,
        provider: &str,
        attempt: usize,
        retry_after: Option<Duration>,
    ) {
        let wait = match retry_after {
            Some(hint) if hint > self.delay => hint,
            _ => self.delay,
        };
        warn!(
            "{} rate limited; retrying in {:.1}s (attempt {}/{})",
            provider,
            wait.as_secs_f32(),
            attempt,
            RATE_LIMIT_MAX_RETRIES
        );
        sleep(wait).await;
        self.delay = (self.delay * 2).min(MAX_DELAY);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn overload_statuses_and_body_markers_are_rate_limits() {
        assert!(is_rate_limited(StatusCode::TOO_MANY_REQUESTS, ""));
        assert!(is_rate_limited(
            StatusCode::from_u16(529).unwrap(),
            "overloaded"
        ));
        assert!(is_rate_limited(
            StatusCode::BAD_REQUEST,
            "Rate limit exceeded for this key"
        ));
        assert!(!is_rate_limited(StatusCode::BAD_REQUEST, "invalid image"));
    }

    #[test]
    fn retry_after_reads_integer_seconds_only() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("12"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(
            "retry-after",
            HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"),
        );
        assert_eq!(retry_after(&headers), None);
    }
}
