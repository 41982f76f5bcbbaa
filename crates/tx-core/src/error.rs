//! Typed error definitions for the signal relay.
//!
//! Three families, matching how each failure is surfaced:
//!
//! - [`ValidationError`]: a signal payload was malformed, incomplete, or
//!   unauthorized. Always local; the signal is discarded.
//! - [`ConfigurationError`]: an exchange is not configured or could not be
//!   initialized. Degrades to "unavailable for that exchange".
//! - [`ExecError`]: an exchange operation was attempted and did not succeed.
//!
//! All variants implement `std::error::Error` via `thiserror`, so they
//! integrate with `anyhow::Result` at the plumbing layers.

use thiserror::Error;

/// Reasons a raw signal payload is rejected before any exchange interaction.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A required key is absent (or `null`).
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A field holds a non-scalar value, or an empty string where text is required.
    #[error("invalid value for field {0}")]
    InvalidField(&'static str),

    /// SIDE is not `buy` or `sell`.
    #[error("invalid SIDE {0:?}: expected 'buy' or 'sell'")]
    InvalidSide(String),

    /// QUANTITY is not a finite number greater than zero.
    #[error("invalid QUANTITY {0:?}: expected a positive number")]
    InvalidQuantity(String),

    /// ORDER_TYPE is `limit` but no PRICE was supplied.
    #[error("missing PRICE for limit order")]
    MissingPrice,

    /// PRICE is not a finite number greater than zero.
    #[error("invalid PRICE {0:?}: expected a positive number")]
    InvalidPrice(String),

    /// ORDER_TYPE is neither `market` nor `limit`.
    #[error("unsupported ORDER_TYPE {0:?}")]
    UnsupportedOrderType(String),

    /// A PIN is configured and the payload's PIN does not match it.
    #[error("PIN mismatch")]
    PinMismatch,
}

/// Exchange availability and configuration problems.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// The named exchange is not present in the registry.
    #[error("exchange '{0}' is not configured or unavailable")]
    ExchangeUnavailable(String),

    /// The configuration names an exchange this build has no client for.
    #[error("unknown exchange '{0}'")]
    UnknownExchange(String),

    /// API key or secret is empty for a configured exchange.
    #[error("missing credentials for exchange '{0}'")]
    MissingCredentials(String),

    /// Any other structurally invalid setting.
    #[error("config error: {0}")]
    Invalid(String),
}

/// Outcome of a failed exchange operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// The exchange (or the transport to it) rejected the operation.
    #[error("exchange rejected: {0}")]
    ExchangeRejected(String),

    /// `close_position` found no open position for the symbol.
    #[error("no open position for {symbol} on {exchange}")]
    NoOpenPosition { exchange: String, symbol: String },

    /// The target exchange could not be resolved.
    #[error(transparent)]
    Unavailable(#[from] ConfigurationError),
}
