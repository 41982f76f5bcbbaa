//! Order execution against exchange capabilities.
//!
//! Every operation is an independent try/report boundary: exchange failures
//! come back as [`ExecError`] values and are logged here, never propagated
//! as panics. Multi-exchange operations fan out per exchange (reads) or per
//! position (close-all) and collect per-unit outcomes.
//!
//! Nothing here coordinates concurrent callers. `close_position` reads the
//! position and then places the offsetting order; a concurrent signal on the
//! same symbol can race between the two steps, and the exchange account is
//! the only serialization point.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::join_all;
use serde::Serialize;
use tracing::{error, info, warn};
use tx_core::error::ExecError;
use tx_core::symbol::same_symbol;
use tx_core::{CancelConfirmation, OrderAck, OrderType, PendingOrder, Position};
use tx_exchange::{Exchange, ExchangeError, ExchangeRegistry};

use crate::validator::OrderIntent;

/// Fold a classified exchange failure into the executor's error.
fn rejected(err: ExchangeError) -> ExecError {
    ExecError::ExchangeRejected(err.to_string())
}

// ---------------------------------------------------------------------------
// Single-exchange operations
// ---------------------------------------------------------------------------

/// Submit the order described by `intent`.
///
/// Market intents never carry a price; limit intents always do.
pub async fn place_order(exchange: &dyn Exchange, intent: &OrderIntent) -> Result<OrderAck, ExecError> {
    let result = match (intent.order_type(), intent.price()) {
        (OrderType::Limit, Some(price)) => {
            exchange
                .create_limit_order(intent.symbol(), intent.side(), intent.quantity(), price)
                .await
        }
        _ => {
            exchange
                .create_market_order(intent.symbol(), intent.side(), intent.quantity())
                .await
        }
    };
    match result {
        Ok(ack) => {
            info!("[executor] order placed on {}: {intent} → id={}", exchange.name(), ack.order_id);
            Ok(ack)
        }
        Err(e) => {
            error!("[executor] order failed on {}: {intent}: {e}", exchange.name());
            Err(rejected(e))
        }
    }
}

/// Flatten the open position in `symbol` with a market order for its full
/// size on the offsetting side.
pub async fn close_position(exchange: &dyn Exchange, symbol: &str) -> Result<OrderAck, ExecError> {
    let positions = exchange.fetch_positions().await.map_err(|e| {
        error!("[executor] fetch positions on {} failed: {e}", exchange.name());
        rejected(e)
    })?;

    let Some(position) = positions
        .iter()
        .find(|p| p.contracts > 0.0 && same_symbol(&p.symbol, symbol))
    else {
        warn!("[executor] no open position for {symbol} on {}", exchange.name());
        return Err(ExecError::NoOpenPosition {
            exchange: exchange.name().to_string(),
            symbol: symbol.to_string(),
        });
    };

    let side = position.side.closing_side();
    match exchange
        .create_market_order(&position.symbol, side, position.contracts)
        .await
    {
        Ok(ack) => {
            info!(
                "[executor] closed {} {} on {}: {side} {} → id={}",
                position.side,
                position.symbol,
                exchange.name(),
                position.contracts,
                ack.order_id,
            );
            Ok(ack)
        }
        Err(e) => {
            error!("[executor] close {} on {} failed: {e}", position.symbol, exchange.name());
            Err(rejected(e))
        }
    }
}

/// Cancel a resting order.
pub async fn cancel_order(
    exchange: &dyn Exchange,
    order_id: &str,
    symbol: &str,
) -> Result<CancelConfirmation, ExecError> {
    match exchange.cancel_order(order_id, symbol).await {
        Ok(confirmation) => {
            info!("[executor] cancelled {order_id} ({symbol}) on {}", exchange.name());
            Ok(confirmation)
        }
        Err(e) => {
            warn!("[executor] cancel {order_id} ({symbol}) on {} failed: {e}", exchange.name());
            Err(rejected(e))
        }
    }
}

// ---------------------------------------------------------------------------
// Fan-out operations
// ---------------------------------------------------------------------------

/// Result of a read fan-out: whatever the healthy exchanges returned, plus
/// the error text of each exchange that failed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FanOut<T> {
    pub items: Vec<T>,
    pub failed: BTreeMap<String, String>,
}

impl<T> Default for FanOut<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            failed: BTreeMap::new(),
        }
    }
}

/// Query every exchange concurrently and merge the results in registry order.
async fn fan_out<T, F, Fut>(registry: &ExchangeRegistry, what: &str, op: F) -> FanOut<T>
where
    F: Fn(Arc<dyn Exchange>) -> Fut,
    Fut: Future<Output = Result<Vec<T>, ExchangeError>>,
{
    let results = join_all(registry.iter().map(|(name, ex)| {
        let fut = op(Arc::clone(ex));
        async move { (name, fut.await) }
    }))
    .await;

    let mut out = FanOut::default();
    for (name, result) in results {
        match result {
            Ok(items) => out.items.extend(items),
            Err(e) => {
                error!("[executor] fetch {what} on {name} failed: {e}");
                out.failed.insert(name.to_string(), e.to_string());
            }
        }
    }
    out
}

/// Open positions across every configured exchange.
pub async fn get_positions(registry: &ExchangeRegistry) -> FanOut<Position> {
    fan_out(registry, "positions", |ex| async move { ex.fetch_positions().await }).await
}

/// Resting orders across every configured exchange.
pub async fn get_pending_orders(registry: &ExchangeRegistry) -> FanOut<PendingOrder> {
    fan_out(registry, "open orders", |ex| async move { ex.fetch_open_orders().await }).await
}

/// Outcome of closing one discovered position.
#[derive(Debug, Clone, PartialEq)]
pub struct CloseOutcome {
    pub exchange: String,
    pub symbol: String,
    pub result: Result<OrderAck, ExecError>,
}

/// Per-position outcomes of [`close_all_positions`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CloseAllReport {
    pub outcomes: Vec<CloseOutcome>,
    /// Exchanges whose position snapshot could not be fetched.
    pub failed: BTreeMap<String, String>,
}

impl CloseAllReport {
    pub fn closed(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }
}

/// Close every open position on every exchange, best effort.
///
/// Takes one snapshot, then issues one independent close per discovered
/// position, sequentially. A failed close does not stop the rest, and there
/// is no rollback.
pub async fn close_all_positions(registry: &ExchangeRegistry) -> CloseAllReport {
    let snapshot = get_positions(registry).await;
    let mut report = CloseAllReport {
        outcomes: Vec::with_capacity(snapshot.items.len()),
        failed: snapshot.failed,
    };

    for position in snapshot.items {
        let result = match registry.require(&position.exchange) {
            Ok(exchange) => close_position(exchange.as_ref(), &position.symbol).await,
            Err(e) => Err(ExecError::Unavailable(e)),
        };
        report.outcomes.push(CloseOutcome {
            exchange: position.exchange,
            symbol: position.symbol,
            result,
        });
    }

    info!(
        "[executor] close-all: {}/{} positions closed, {} exchange(s) unreadable",
        report.closed(),
        report.outcomes.len(),
        report.failed.len(),
    );
    report
}
