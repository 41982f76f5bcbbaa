//! Bybit v5 connection settings.

use std::collections::BTreeMap;

use tx_core::config::ConnectionConfig;
use tx_core::error::ConfigurationError;

pub const LIVE_REST_URL: &str = "https://api.bybit.com";

/// Testnet endpoint, used when the connection is flagged `demo`.
pub const TESTNET_REST_URL: &str = "https://api-testnet.bybit.com";

/// Default spacing between REST calls.
pub const DEFAULT_MIN_INTERVAL_MS: u64 = 20;

/// Product category for USDT perpetuals.
pub const CATEGORY: &str = "linear";

/// Typed configuration for the Bybit capability.
#[derive(Debug, Clone)]
pub struct BybitConfig {
    pub api_key: String,
    pub api_secret: String,
    /// REST base URL without trailing slash.
    pub rest_url: String,
    /// `X-BAPI-RECV-WINDOW` header value (milliseconds).
    pub recv_window: u64,
    pub request_timeout_secs: u64,
    pub testnet: bool,
    pub symbol_aliases: BTreeMap<String, String>,
}

impl BybitConfig {
    /// Derive the Bybit settings from a connection entry.
    pub fn from_connection(conn: &ConnectionConfig) -> Result<Self, ConfigurationError> {
        if !conn.has_credentials() {
            return Err(ConfigurationError::MissingCredentials(conn.name()));
        }
        let rest_url = match conn.base_url.as_deref().map(str::trim) {
            Some(url) if !url.is_empty() => url.trim_end_matches('/').to_string(),
            _ if conn.demo => TESTNET_REST_URL.to_string(),
            _ => LIVE_REST_URL.to_string(),
        };
        Ok(Self {
            api_key: conn.api_key.trim().to_string(),
            api_secret: conn.api_secret.trim().to_string(),
            rest_url,
            recv_window: if conn.recv_window_ms == 0 { 5_000 } else { conn.recv_window_ms },
            request_timeout_secs: conn.request_timeout_secs,
            testnet: conn.demo,
            symbol_aliases: conn.symbol_aliases.clone(),
        })
    }
}
