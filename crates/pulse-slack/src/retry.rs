//! Retry and backoff helpers for Slack Web API calls.

use std::time::Duration;

use chrono::{DateTime, Utc};

pub fn is_retryable_slack_status(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

pub fn is_retryable_transport_error(error: &reqwest::Error) -> bool {
    error.is_timeout() || error.is_connect() || error.is_request() || error.is_body()
}

/// Parses a `Retry-After` header carrying either delay seconds or an HTTP
/// date, returning the delay in milliseconds.
pub fn parse_retry_after_ms(headers: &reqwest::header::HeaderMap) -> Option<u64> {
    let raw = headers
        .get(reqwest::header::RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(seconds.saturating_mul(1_000));
    }

    let retry_at = DateTime::parse_from_rfc2822(raw).ok()?.with_timezone(&Utc);
    let delay_ms = retry_at.signed_duration_since(Utc::now()).num_milliseconds();
    if delay_ms <= 0 {
        return Some(0);
    }
    u64::try_from(delay_ms).ok()
}

/// A server-directed delay wins outright; otherwise exponential backoff
/// capped at 64x the base delay.
pub fn retry_delay(base_delay_ms: u64, attempt: usize, retry_after_ms: Option<u64>) -> Duration {
    if let Some(retry_after_ms) = retry_after_ms {
        return Duration::from_millis(retry_after_ms);
    }
    let exponent = attempt.saturating_sub(1).min(6) as u32;
    let scale = 2_u64.pow(exponent);
    Duration::from_millis(base_delay_ms.max(1).saturating_mul(scale))
}

pub fn truncate_for_error(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    let mut truncated: String = value.chars().take(max_chars).collect();
    truncated.push_str("...");
    truncated
}

#[cfg(test)]
mod tests {
    use reqwest::header::{HeaderMap, HeaderValue};

    use super::{
        is_retryable_slack_status, parse_retry_after_ms, retry_delay, truncate_for_error,
    };

    #[test]
    fn retry_status_selection_is_correct() {
        assert!(is_retryable_slack_status(429));
        assert!(is_retryable_slack_status(503));
        assert!(!is_retryable_slack_status(400));
        assert!(!is_retryable_slack_status(404));
    }

    #[test]
    fn unit_parse_retry_after_ms_accepts_seconds_and_rejects_invalid_values() {
        let mut headers = HeaderMap::new();
        headers.insert("retry-after", HeaderValue::from_static("3"));
        assert_eq!(parse_retry_after_ms(&headers), Some(3_000));

        headers.insert("retry-after", HeaderValue::from_static("not-a-number"));
        assert_eq!(parse_retry_after_ms(&headers), None);
    }

    #[test]
    fn functional_parse_retry_after_ms_accepts_http_dates() {
        let mut headers = HeaderMap::new();
        let raw = (chrono::Utc::now() + chrono::Duration::seconds(2))
            .to_rfc2822()
            .replace("+0000", "GMT");
        headers.insert(
            "retry-after",
            HeaderValue::from_str(raw.as_str()).expect("retry-after date"),
        );
        let delay = parse_retry_after_ms(&headers).expect("delay from date");
        assert!(delay <= 2_500, "delay should be close to 2s, got {delay}");
    }

    #[test]
    fn regression_retry_delay_honors_retry_after_over_backoff() {
        assert_eq!(
            retry_delay(100, 1, Some(5_000)),
            std::time::Duration::from_millis(5_000)
        );
        assert_eq!(
            retry_delay(100, 1, None),
            std::time::Duration::from_millis(100)
        );
        assert_eq!(
            retry_delay(100, 3, None),
            std::time::Duration::from_millis(400)
        );
        // Exponent caps at 2^6 no matter how many attempts pile up.
        assert_eq!(
            retry_delay(100, 40, None),
            std::time::Duration::from_millis(6_400)
        );
    }

    #[test]
    fn unit_truncate_for_error_appends_ellipsis_past_limit() {
        assert_eq!(truncate_for_error("short", 10), "short");
        assert_eq!(truncate_for_error("abcdefghij", 4), "abcd...");
    }
}
