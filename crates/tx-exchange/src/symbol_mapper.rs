//! `BTC/USDT` ↔ `BTCUSDT` conversion.
//!
//! Binance and Bybit both name linear contracts by concatenating base and
//! quote. Signals and the control API use the slash form, optionally with a
//! settlement suffix (`BTC/USDT:USDT`).
//!
//! Conversion is rule based: to the exchange form, separators are dropped and
//! the result upper-cased; back to the slash form, a known quote suffix is
//! split off. Pairs the rules get wrong can be pinned with [`SymbolMapper::alias`].

use std::collections::HashMap;

use tx_core::symbol::strip_settle;

/// Quote assets tried, in order, when splitting a concatenated symbol.
const QUOTES: &[&str] = &["FDUSD", "USDT", "USDC", "BUSD", "TUSD", "BTC", "ETH", "BNB"];

#[derive(Debug, Clone, Default)]
pub struct SymbolMapper {
    /// exchange → display
    pinned: HashMap<String, String>,
    /// display → exchange
    pinned_rev: HashMap<String, String>,
}

impl SymbolMapper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mapper with `exchange → display` pins, e.g. from `symbol_aliases` in config.
    pub fn with_aliases<'a>(aliases: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let mut mapper = Self::new();
        for (exchange, display) in aliases {
            mapper.alias(exchange, display);
        }
        mapper
    }

    /// Pin a pair in both directions, overriding the rules.
    pub fn alias(&mut self, exchange: &str, display: &str) {
        self.pinned.insert(exchange.to_owned(), display.to_owned());
        self.pinned_rev.insert(display.to_owned(), exchange.to_owned());
    }

    /// `BTCUSDT` → `BTC/USDT`. Symbols with no recognized quote come back unchanged.
    pub fn to_display(&self, exchange: &str) -> String {
        if let Some(display) = self.pinned.get(exchange) {
            return display.clone();
        }
        split_quote(exchange)
            .map(|(base, quote)| format!("{base}/{quote}"))
            .unwrap_or_else(|| exchange.to_owned())
    }

    /// `BTC/USDT`, `btc-usdt` or `BTC/USDT:USDT` → `BTCUSDT`.
    pub fn to_exchange(&self, display: &str) -> String {
        let pair = strip_settle(display.trim());
        if let Some(exchange) = self.pinned_rev.get(pair) {
            return exchange.clone();
        }
        pair.chars()
            .filter(|c| !matches!(c, '/' | '-' | '_'))
            .flat_map(char::to_uppercase)
            .collect()
    }
}

fn split_quote(symbol: &str) -> Option<(&str, &str)> {
    QUOTES.iter().find_map(|quote| {
        symbol
            .strip_suffix(quote)
            .filter(|base| !base.is_empty())
            .map(|base| (base, *quote))
    })
}
