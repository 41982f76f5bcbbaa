//! Classified exchange failures.
//!
//! Both exchanges report failures as a numeric code plus message (Binance
//! `code`/`msg`, Bybit `retCode`/`retMsg`). The per-exchange `classify`
//! functions map those codes onto [`ExchangeError`] kinds so callers and logs
//! can tell an auth failure from a rate limit from a bad order.

use thiserror::Error;

/// Result alias for exchange operations.
pub type ExchangeResult<T> = Result<T, ExchangeError>;

/// Why an exchange operation failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// Bad API key, signature, or permissions.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Request quota exceeded.
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Not enough balance or margin for the order.
    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Order parameters rejected (size, price, symbol, ...).
    #[error("invalid order: {0}")]
    InvalidOrder(String),

    /// Unknown order ID (or order/symbol mismatch) on cancel.
    #[error("order not found: {0}")]
    OrderNotFound(String),

    /// Network, TLS, or timeout failure before a response was read.
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// Any other exchange-side rejection.
    #[error("exchange error {code}: {message}")]
    Rejected { code: i64, message: String },
}

impl From<reqwest::Error> for ExchangeError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
