//! Shared REST plumbing for the exchange clients.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::StatusCode;

use crate::error::{ExchangeError, ExchangeResult};

/// Build the HTTP client used by one exchange capability.
pub(crate) fn build_client(request_timeout_secs: u64) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(5))
        .timeout(Duration::from_secs(request_timeout_secs.max(1)))
        .build()
        .context("failed to create HTTP client")
}

/// Read a response body as JSON without discarding it on HTTP errors.
///
/// Exchanges put the useful error code in the body of 4xx responses, so the
/// status is returned alongside the parsed body for the caller to classify.
pub(crate) async fn read_json(resp: reqwest::Response) -> ExchangeResult<(StatusCode, serde_json::Value)> {
    let status = resp.status();
    let text = resp.text().await?;
    if text.trim().is_empty() {
        return Ok((status, serde_json::Value::Null));
    }
    match serde_json::from_str(&text) {
        Ok(body) => Ok((status, body)),
        Err(_) if !status.is_success() => Err(status_error(status, &text)),
        Err(e) => Err(ExchangeError::Decode(format!("{e}: {}", truncate(&text, 200)))),
    }
}

/// Map an HTTP status without a usable body onto an error kind.
pub(crate) fn status_error(status: StatusCode, body: &str) -> ExchangeError {
    let message = format!("HTTP {status}: {}", truncate(body, 200));
    match status.as_u16() {
        401 | 403 => ExchangeError::Authentication(message),
        418 | 429 => ExchangeError::RateLimited(message),
        _ => ExchangeError::Rejected {
            code: i64::from(status.as_u16()),
            message,
        },
    }
}

/// Join `(key, value)` pairs into a URL-encoded query string.
pub(crate) fn encode_query(params: &[(&str, &str)]) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Returns the current Unix timestamp in milliseconds.
pub(crate) fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
