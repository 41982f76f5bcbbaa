//! Exchange registry: name → exchange capability.
//!
//! Built once at startup from the `exchanges` config entries and immutable
//! afterwards, so it can be shared freely behind `Arc` by every intake
//! channel and the control API.
//!
//! Misconfigured entries never abort startup: an unknown exchange name,
//! empty credentials, or a construction failure is logged and the entry is
//! skipped. Lookups of a skipped (or never configured) exchange report
//! [`ConfigurationError::ExchangeUnavailable`].

use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use tracing::{info, warn};
use tx_core::config::ConnectionConfig;
use tx_core::error::ConfigurationError;

use crate::Exchange;
use crate::binance::BinanceExchange;
use crate::bybit::BybitExchange;

/// Create an exchange capability based on the `exchange` field in the config.
pub fn create_exchange(config: &ConnectionConfig) -> Result<Arc<dyn Exchange>> {
    let name = config.name();
    if !config.has_credentials() {
        return Err(ConfigurationError::MissingCredentials(name).into());
    }
    let exchange: Arc<dyn Exchange> = match name.as_str() {
        crate::binance::NAME => Arc::new(BinanceExchange::from_connection(config)?),
        crate::bybit::NAME => Arc::new(BybitExchange::from_connection(config)?),
        _ => return Err(ConfigurationError::UnknownExchange(name).into()),
    };
    Ok(exchange)
}

/// Immutable lookup table of configured exchanges, keyed by lower-case name.
#[derive(Clone, Default)]
pub struct ExchangeRegistry {
    exchanges: BTreeMap<String, Arc<dyn Exchange>>,
}

impl ExchangeRegistry {
    /// An empty registry (every lookup fails).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build the registry from config entries, skipping the ones that
    /// cannot be constructed.
    pub fn from_config(connections: &[ConnectionConfig]) -> Self {
        let mut registry = Self::empty();
        for conn in connections {
            let name = conn.name();
            match create_exchange(conn) {
                Ok(exchange) => {
                    registry.exchanges.insert(name, exchange);
                }
                Err(e) => warn!("[registry] skipping exchange '{name}': {e:#}"),
            }
        }
        info!(
            "[registry] {} exchange(s) available: [{}]",
            registry.len(),
            registry.names().collect::<Vec<_>>().join(", ")
        );
        registry
    }

    /// Build a registry from ready-made capabilities, keyed by
    /// [`Exchange::name`]. Later entries replace earlier ones of the same name.
    pub fn from_exchanges(exchanges: impl IntoIterator<Item = Arc<dyn Exchange>>) -> Self {
        let exchanges = exchanges
            .into_iter()
            .map(|ex| (ex.name().trim().to_lowercase(), ex))
            .collect();
        Self { exchanges }
    }

    /// Case-insensitive lookup.
    pub fn resolve(&self, name: &str) -> Option<Arc<dyn Exchange>> {
        self.exchanges.get(&name.trim().to_lowercase()).cloned()
    }

    /// Like [`resolve`](Self::resolve), but reports a missing exchange as
    /// [`ConfigurationError::ExchangeUnavailable`].
    pub fn require(&self, name: &str) -> Result<Arc<dyn Exchange>, ConfigurationError> {
        self.resolve(name)
            .ok_or_else(|| ConfigurationError::ExchangeUnavailable(name.trim().to_lowercase()))
    }

    /// Iterate `(name, exchange)` pairs in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Arc<dyn Exchange>)> {
        self.exchanges.iter().map(|(name, ex)| (name.as_str(), ex))
    }

    /// Registered names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.exchanges.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

impl std::fmt::Debug for ExchangeRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
