//! Binance USDT-M futures connection settings.
//!
//! Built from a generic [`ConnectionConfig`] entry. Only `api_key` and
//! `api_secret` are mandatory; everything else has a production default.

use std::collections::BTreeMap;

use tx_core::config::ConnectionConfig;
use tx_core::error::ConfigurationError;

/// Production USDT-margined futures REST endpoint.
pub const LIVE_REST_URL: &str = "https://fapi.binance.com";

/// Demo-trading futures REST endpoint (paper account, same API surface).
pub const DEMO_REST_URL: &str = "https://demo-fapi.binance.com";

/// Default spacing between REST calls.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 50;

/// Typed configuration for the Binance futures capability.
#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub api_key: String,

    /// Binance API secret (HMAC-SHA256 signing).
    pub api_secret: String,

    /// Optional path to a PEM-encoded Ed25519 private key. When set, requests
    /// are signed with Ed25519 instead of HMAC.
    pub ed25519_key_path: Option<String>,

    /// REST base URL without trailing slash.
    pub rest_url: String,

    /// `recvWindow` for signed requests (milliseconds, 0 = Binance default).
    pub recv_window: u64,

    pub request_timeout_secs: u64,

    /// Whether this connection targets the demo environment.
    pub demo: bool,

    pub symbol_aliases: BTreeMap<String, String>,
}

impl BinanceConfig {
    /// Derive the Binance settings from a connection entry.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::MissingCredentials`] if the key or
    /// secret is empty.
    pub fn from_connection(conn: &ConnectionConfig) -> Result<Self, ConfigurationError> {
        if !conn.has_credentials() {
            return Err(ConfigurationError::MissingCredentials(conn.name()));
        }
        let rest_url = match conn.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ if conn.demo => DEMO_REST_URL.to_string(),
            _ => LIVE_REST_URL.to_string(),
        };
        Ok(Self {
            api_key: conn.api_key.trim().to_string(),
            api_secret: conn.api_secret.trim().to_string(),
            ed25519_key_path: conn.ed25519_key_path.clone().filter(|p| !p.trim().is_empty()),
            rest_url,
            recv_window: conn.recv_window_ms,
            request_timeout_secs: conn.request_timeout_secs,
            demo: conn.demo,
            symbol_aliases: conn.symbol_aliases.clone(),
        })
    }
}
