//! In-memory [`Exchange`] for tests.
//!
//! Serves canned positions, orders, and balances, records every call, and
//! can be told to fail any operation with a chosen [`ExchangeError`] or to
//! panic outright.
//! Available to other crates through the `test-util` feature.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::json;
use tx_core::{
    Balance, CancelConfirmation, CurrencyBalance, OrderAck, OrderType, PendingOrder, Position,
    PositionSide, Side,
};

use crate::Exchange;
use crate::error::{ExchangeError, ExchangeResult};

/// Operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOp {
    FetchPositions,
    FetchOpenOrders,
    FetchBalance,
    CreateOrder,
    CancelOrder,
}

/// A recorded call.
#[derive(Debug, Clone, PartialEq)]
pub enum MockCall {
    FetchPositions,
    FetchOpenOrders,
    FetchBalance,
    MarketOrder { symbol: String, side: Side, quantity: f64 },
    LimitOrder { symbol: String, side: Side, quantity: f64, price: f64 },
    Cancel { order_id: String, symbol: String },
}

#[derive(Default)]
struct State {
    positions: Vec<Position>,
    orders: Vec<PendingOrder>,
    balance: Balance,
    failures: HashMap<MockOp, ExchangeError>,
    panics: HashSet<MockOp>,
    calls: Vec<MockCall>,
}

/// Scriptable in-memory exchange.
pub struct MockExchange {
    name: String,
    state: Mutex<State>,
    order_counter: AtomicU64,
}

impl MockExchange {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            state: Mutex::new(State::default()),
            order_counter: AtomicU64::new(0),
        }
    }

    pub fn with_positions(self, positions: Vec<Position>) -> Self {
        self.lock().positions = positions;
        self
    }

    pub fn with_orders(self, orders: Vec<PendingOrder>) -> Self {
        self.lock().orders = orders;
        self
    }

    /// Set the USDT balance (total = free).
    pub fn with_usdt(self, total: f64) -> Self {
        self.lock().balance.insert(
            "USDT",
            CurrencyBalance {
                total,
                free: total,
                used: 0.0,
            },
        );
        self
    }

    /// Make `op` fail with `err` until [`clear_failure`](Self::clear_failure).
    pub fn failing(self, op: MockOp, err: ExchangeError) -> Self {
        self.fail(op, err);
        self
    }

    pub fn fail(&self, op: MockOp, err: ExchangeError) {
        self.lock().failures.insert(op, err);
    }

    /// Make `op` panic, as a client bug would, until [`clear_failure`](Self::clear_failure).
    pub fn panicking(self, op: MockOp) -> Self {
        self.lock().panics.insert(op);
        self
    }

    pub fn clear_failure(&self, op: MockOp) {
        let mut state = self.lock();
        state.failures.remove(&op);
        state.panics.remove(&op);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<MockCall> {
        self.lock().calls.clone()
    }

    /// Recorded order submissions only.
    pub fn orders_placed(&self) -> Vec<MockCall> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, MockCall::MarketOrder { .. } | MockCall::LimitOrder { .. }))
            .collect()
    }

    /// Number of orders accepted so far.
    pub fn order_count(&self) -> u64 {
        self.order_counter.load(Ordering::Relaxed)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, op: MockOp, call: MockCall) -> ExchangeResult<()> {
        let mut state = self.lock();
        state.calls.push(call);
        if state.panics.contains(&op) {
            drop(state);
            panic!("{}: {op:?} blew up", self.name);
        }
        match state.failures.get(&op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn ack(&self, symbol: &str, side: Side, order_type: OrderType, quantity: f64, price: Option<f64>) -> OrderAck {
        let n = self.order_counter.fetch_add(1, Ordering::Relaxed) + 1;
        let order_id = format!("{}-{n}", self.name);
        OrderAck {
            raw: json!({ "orderId": order_id }),
            order_id,
            client_order_id: Some(format!("{}{n}", crate::CLIENT_ORDER_ID_PREFIX)),
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            price,
        }
    }
}

#[async_trait]
impl Exchange for MockExchange {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch_positions(&self) -> ExchangeResult<Vec<Position>> {
        self.record(MockOp::FetchPositions, MockCall::FetchPositions)?;
        Ok(self.lock().positions.clone())
    }

    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<PendingOrder>> {
        self.record(MockOp::FetchOpenOrders, MockCall::FetchOpenOrders)?;
        Ok(self.lock().orders.clone())
    }

    async fn fetch_balance(&self) -> ExchangeResult<Balance> {
        self.record(MockOp::FetchBalance, MockCall::FetchBalance)?;
        Ok(self.lock().balance.clone())
    }

    async fn create_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> ExchangeResult<OrderAck> {
        self.record(
            MockOp::CreateOrder,
            MockCall::MarketOrder {
                symbol: symbol.to_string(),
                side,
                quantity,
            },
        )?;
        Ok(self.ack(symbol, side, OrderType::Market, quantity, None))
    }

    async fn create_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
    ) -> ExchangeResult<OrderAck> {
        self.record(
            MockOp::CreateOrder,
            MockCall::LimitOrder {
                symbol: symbol.to_string(),
                side,
                quantity,
                price,
            },
        )?;
        Ok(self.ack(symbol, side, OrderType::Limit, quantity, Some(price)))
    }

    async fn cancel_order(
        &self,
        order_id: &str,
        symbol: &str,
    ) -> ExchangeResult<CancelConfirmation> {
        self.record(
            MockOp::CancelOrder,
            MockCall::Cancel {
                order_id: order_id.to_string(),
                symbol: symbol.to_string(),
            },
        )?;
        Ok(CancelConfirmation {
            order_id: order_id.to_string(),
            symbol: symbol.to_string(),
            status: Some("canceled".into()),
            raw: json!({ "orderId": order_id, "status": "CANCELED" }),
        })
    }
}

/// Build a position with sensible defaults for tests.
pub fn position(exchange: &str, symbol: &str, side: PositionSide, contracts: f64) -> Position {
    let entry_price = 100.0;
    Position {
        exchange: exchange.to_string(),
        symbol: symbol.to_string(),
        side,
        contracts,
        notional: contracts * entry_price,
        entry_price,
        liquidation_price: None,
        margin_ratio: None,
        leverage: None,
        unrealized_pnl: 0.0,
    }
}

/// Build a resting limit order for tests.
pub fn pending_order(exchange: &str, order_id: &str, symbol: &str) -> PendingOrder {
    PendingOrder {
        exchange: exchange.to_string(),
        order_id: order_id.to_string(),
        client_order_id: None,
        symbol: symbol.to_string(),
        side: Some(Side::Buy),
        order_type: "limit".into(),
        price: Some(100.0),
        quantity: 1.0,
        filled: 0.0,
        status: "new".into(),
        timestamp: None,
        raw: json!({ "orderId": order_id }),
    }
}
