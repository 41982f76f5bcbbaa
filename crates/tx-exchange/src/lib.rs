//! # tx-exchange
//!
//! Exchange capabilities for the signal relay.
//!
//! Each exchange implements the [`Exchange`] trait, which provides a uniform
//! interface for the six operations the core consumes: position, open-order,
//! and balance queries, market and limit order creation, and cancellation.
//! Raw exchange responses are normalized into the fixed `tx-core` shapes
//! ([`Position`], [`PendingOrder`], [`Balance`]) with explicit optionality.
//!
//! ## Supported exchanges
//!
//! | Exchange | Module    | Market                  | Signing              |
//! |----------|-----------|-------------------------|----------------------|
//! | Binance  | `binance` | USDT-margined futures   | HMAC-SHA256 / Ed25519 |
//! | Bybit    | `bybit`   | v5 unified, `linear`    | HMAC-SHA256 headers  |
//!
//! Configured capabilities are collected once at startup into an immutable
//! [`ExchangeRegistry`].

pub mod binance;
pub mod bybit;
pub mod error;
pub mod registry;
pub mod symbol_mapper;
pub mod throttle;

#[cfg(any(test, feature = "test-util"))]
pub mod mock;

mod http;

use async_trait::async_trait;
use tx_core::{Balance, CancelConfirmation, OrderAck, PendingOrder, Position, Side};

pub use error::{ExchangeError, ExchangeResult};
pub use registry::ExchangeRegistry;

/// Trait implemented by every exchange capability.
///
/// All operations take `&self` so one handle can be shared (behind `Arc`)
/// by the webhook workers, the mailbox poller, and the control API at the
/// same time. Implementations own their request pacing; callers never
/// throttle.
///
/// Symbols are passed and returned in unified display form (`BTC/USDT`).
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Registry name (lower-case, e.g. `"binance"`).
    fn name(&self) -> &str;

    /// Query open positions. Zero-size entries are filtered out.
    async fn fetch_positions(&self) -> ExchangeResult<Vec<Position>>;

    /// Query all resting orders.
    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<PendingOrder>>;

    /// Query account balances.
    async fn fetch_balance(&self) -> ExchangeResult<Balance>;

    /// Submit a market order.
    async fn create_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> ExchangeResult<OrderAck>;

    /// Submit a good-till-cancel limit order.
    async fn create_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
    ) -> ExchangeResult<OrderAck>;

    /// Cancel a resting order.
    async fn cancel_order(&self, order_id: &str, symbol: &str)
    -> ExchangeResult<CancelConfirmation>;
}

/// Prefix of every client order ID this crate generates.
pub const CLIENT_ORDER_ID_PREFIX: &str = "tx-";

/// Generate a client order ID for a new order.
///
/// Sent with every order so the exchange can reject accidental replays.
pub(crate) fn new_client_order_id() -> String {
    format!("{CLIENT_ORDER_ID_PREFIX}{}", uuid::Uuid::new_v4().simple())
}
