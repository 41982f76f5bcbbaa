//! Trading-related data structures: positions, orders, balances, and the
//! derived portfolio summary.
//!
//! Everything here is a transient projection of live exchange state. Nothing
//! is cached or persisted; each query builds fresh values.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use super::enums::{OrderType, PositionSide, Side};

// ---------------------------------------------------------------------------
// Position
// ---------------------------------------------------------------------------

/// An open position as reported by one exchange.
///
/// Identified by `(exchange, symbol)` for the duration of one fetch only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Registry name of the reporting exchange.
    pub exchange: String,
    /// Unified symbol (e.g. `"BTC/USDT"`).
    pub symbol: String,
    /// Long or short.
    pub side: PositionSide,
    /// Absolute position size in contracts / base units.
    pub contracts: f64,
    /// Absolute notional value in quote currency.
    pub notional: f64,
    /// Average entry price.
    pub entry_price: f64,
    /// Liquidation price, if the exchange reports one.
    pub liquidation_price: Option<f64>,
    /// Fraction of notional held as margin, if known.
    pub margin_ratio: Option<f64>,
    /// Leverage, if the exchange reports it.
    pub leverage: Option<f64>,
    /// Unrealized PnL in quote currency.
    pub unrealized_pnl: f64,
}

impl Position {
    /// Margin attributed to this position (`notional × margin_ratio`), or
    /// zero when the margin ratio is unknown.
    pub fn margin_used(&self) -> f64 {
        self.margin_ratio.map_or(0.0, |ratio| self.notional * ratio)
    }
}

// ---------------------------------------------------------------------------
// Pending order
// ---------------------------------------------------------------------------

/// An open (resting) order, passed through largely as the exchange reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOrder {
    /// Registry name of the reporting exchange.
    pub exchange: String,
    /// Exchange-assigned order ID.
    pub order_id: String,
    /// Client-assigned order ID, if any.
    pub client_order_id: Option<String>,
    /// Unified symbol.
    pub symbol: String,
    /// Buy or sell, when recognizable.
    pub side: Option<Side>,
    /// Lower-cased exchange order type (`"limit"`, `"market"`, `"stop_market"`, ...).
    pub order_type: String,
    /// Limit price, absent for market-style orders.
    pub price: Option<f64>,
    /// Original order quantity.
    pub quantity: f64,
    /// Cumulative filled quantity.
    pub filled: f64,
    /// Lower-cased exchange status string.
    pub status: String,
    /// Creation / update time (ms since epoch), if reported.
    pub timestamp: Option<u64>,
    /// The exchange's raw order record.
    pub raw: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Balance
// ---------------------------------------------------------------------------

/// Balance of one currency.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct CurrencyBalance {
    pub total: f64,
    pub free: f64,
    pub used: f64,
}

/// Account balance keyed by upper-case currency code.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Balance {
    pub currencies: HashMap<String, CurrencyBalance>,
}

impl Balance {
    pub fn get(&self, currency: &str) -> Option<&CurrencyBalance> {
        self.currencies.get(&currency.to_uppercase())
    }

    pub fn insert(&mut self, currency: &str, balance: CurrencyBalance) {
        self.currencies.insert(currency.to_uppercase(), balance);
    }

    /// Total USDT, or zero if the account holds none.
    pub fn usdt_total(&self) -> f64 {
        self.get("USDT").map_or(0.0, |b| b.total)
    }
}

// ---------------------------------------------------------------------------
// Order acknowledgements
// ---------------------------------------------------------------------------

/// Exchange acknowledgement of a newly created order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderAck {
    /// Exchange-assigned order ID.
    pub order_id: String,
    /// Client order ID sent with the request.
    pub client_order_id: Option<String>,
    /// Unified symbol.
    pub symbol: String,
    pub side: Side,
    pub order_type: OrderType,
    pub quantity: f64,
    pub price: Option<f64>,
    /// The exchange's raw response.
    pub raw: serde_json::Value,
}

/// Exchange confirmation of a cancelled order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelConfirmation {
    pub order_id: String,
    pub symbol: String,
    /// Lower-cased status reported by the exchange, if any.
    pub status: Option<String>,
    pub raw: serde_json::Value,
}

// ---------------------------------------------------------------------------
// Portfolio summary
// ---------------------------------------------------------------------------

/// One exchange's contribution to a [`PortfolioSummary`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ExchangeContribution {
    pub portfolio_value_usdt: f64,
    pub unrealized_pnl: f64,
    pub margin_used: f64,
    pub open_positions: usize,
}

/// Aggregate statistics across all exchanges, recomputed on every request.
///
/// Not an atomic snapshot: each exchange is queried independently.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub portfolio_value_usdt: f64,
    pub total_unrealized_pnl: f64,
    pub margin_used: f64,
    /// Per-exchange contributions (failed exchanges contribute zero).
    pub exchanges: BTreeMap<String, ExchangeContribution>,
    /// Exchanges whose balance or position fetch failed.
    pub failed: Vec<String>,
}

impl PortfolioSummary {
    /// Fold one exchange's contribution into the totals.
    pub fn add(&mut self, exchange: &str, contribution: ExchangeContribution) {
        self.portfolio_value_usdt += contribution.portfolio_value_usdt;
        self.total_unrealized_pnl += contribution.unrealized_pnl;
        self.margin_used += contribution.margin_used;
        self.exchanges.insert(exchange.to_string(), contribution);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn position(margin_ratio: Option<f64>) -> Position {
        Position {
            exchange: "binance".into(),
            symbol: "BTC/USDT".into(),
            side: PositionSide::Long,
            contracts: 0.5,
            notional: 30_000.0,
            entry_price: 60_000.0,
            liquidation_price: None,
            margin_ratio,
            leverage: None,
            unrealized_pnl: 12.5,
        }
    }

    #[test]
    fn margin_used_requires_ratio() {
        assert_eq!(position(Some(0.1)).margin_used(), 3_000.0);
        assert_eq!(position(None).margin_used(), 0.0);
    }

    #[test]
    fn balance_lookup_is_case_insensitive() {
        let mut bal = Balance::default();
        bal.insert("usdt", CurrencyBalance { total: 100.0, free: 80.0, used: 20.0 });
        assert_eq!(bal.usdt_total(), 100.0);
        assert!(bal.get("BTC").is_none());
        assert_eq!(Balance::default().usdt_total(), 0.0);
    }

    #[test]
    fn summary_accumulates() {
        let mut summary = PortfolioSummary::default();
        summary.add(
            "binance",
            ExchangeContribution { portfolio_value_usdt: 100.0, unrealized_pnl: 5.0, margin_used: 10.0, open_positions: 1 },
        );
        summary.add(
            "bybit",
            ExchangeContribution { portfolio_value_usdt: 50.0, unrealized_pnl: -2.0, margin_used: 0.0, open_positions: 0 },
        );
        assert_eq!(summary.portfolio_value_usdt, 150.0);
        assert_eq!(summary.total_unrealized_pnl, 3.0);
        assert_eq!(summary.margin_used, 10.0);
        assert_eq!(summary.exchanges.len(), 2);
    }
}
