//! Unified symbol helpers.
//!
//! Signals and the control API use the slash-separated display form
//! (`BTC/USDT`), sometimes with a settlement suffix (`BTC/USDT:USDT`), while
//! exchanges use concatenated symbols (`BTCUSDT`). Comparisons go through
//! [`compact`] so all three spellings refer to the same instrument.

/// Strip an optional `:SETTLE` suffix (`BTC/USDT:USDT` → `BTC/USDT`).
#[inline]
pub fn strip_settle(symbol: &str) -> &str {
    symbol.split_once(':').map_or(symbol, |(pair, _)| pair)
}

/// Canonical compact form: upper-case, no settlement suffix, no separators.
pub fn compact(symbol: &str) -> String {
    strip_settle(symbol.trim())
        .chars()
        .filter(|c| !matches!(c, '/' | '-' | '_'))
        .flat_map(char::to_uppercase)
        .collect()
}

/// Returns `true` if both spellings name the same instrument.
pub fn same_symbol(a: &str, b: &str) -> bool {
    compact(a) == compact(b)
}
