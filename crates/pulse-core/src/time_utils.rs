/// Returns the current Unix timestamp in milliseconds.
pub fn current_unix_timestamp_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
        .try_into()
        .unwrap_or(u64::MAX)
}

/// Returns the current Unix timestamp in seconds.
pub fn current_unix_timestamp() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

/// Returns the start of a trailing window ending at `now_unix`.
pub fn lookback_oldest_unix(now_unix: u64, window_seconds: u64) -> u64 {
    now_unix.saturating_sub(window_seconds)
}

/// Formats a Unix-seconds bound the way the Slack history API expects its
/// `oldest` parameter.
pub fn slack_oldest_param(unix_seconds: u64) -> String {
    unix_seconds.to_string()
}
