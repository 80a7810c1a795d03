/// Current Unix time in milliseconds.
pub fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Build a Slack archive permalink from a channel id and a message `ts`.
///
/// Slack permalinks drop the dot from the timestamp:
/// `1712345678.000200` → `{base}/archives/C01/p1712345678000200`.
pub fn archive_link(base_url: &str, channel_id: &str, ts: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let ts: String = ts.chars().filter(|c| c.is_ascii_digit()).collect();
    format!("{base}/archives/{channel_id}/p{ts}")
}
