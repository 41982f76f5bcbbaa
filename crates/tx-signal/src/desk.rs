//! Monitoring and control facade.
//!
//! [`TradeDesk`] is the public operation boundary consumed by dashboards and
//! the control API. It owns nothing but a shared handle to the registry;
//! every call goes to the exchanges live.

use std::sync::Arc;

use tx_core::error::ExecError;
use tx_core::{CancelConfirmation, OrderAck, PendingOrder, PortfolioSummary, Position};
use tx_exchange::ExchangeRegistry;

use crate::executor::{self, CloseAllReport, FanOut};
use crate::portfolio;

#[derive(Debug, Clone)]
pub struct TradeDesk {
    registry: Arc<ExchangeRegistry>,
}

impl TradeDesk {
    pub fn new(registry: Arc<ExchangeRegistry>) -> Self {
        Self { registry }
    }

    /// Open positions across every exchange.
    pub async fn positions(&self) -> FanOut<Position> {
        executor::get_positions(&self.registry).await
    }

    /// Resting orders across every exchange.
    pub async fn pending_orders(&self) -> FanOut<PendingOrder> {
        executor::get_pending_orders(&self.registry).await
    }

    pub async fn summarize(&self) -> PortfolioSummary {
        portfolio::summarize(&self.registry).await
    }

    pub async fn close_position(&self, exchange: &str, symbol: &str) -> Result<OrderAck, ExecError> {
        let exchange = self.registry.require(exchange)?;
        executor::close_position(exchange.as_ref(), symbol).await
    }

    pub async fn close_all_positions(&self) -> CloseAllReport {
        executor::close_all_positions(&self.registry).await
    }

    pub async fn cancel_order(
        &self,
        exchange: &str,
        order_id: &str,
        symbol: &str,
    ) -> Result<CancelConfirmation, ExecError> {
        let exchange = self.registry.require(exchange)?;
        executor::cancel_order(exchange.as_ref(), order_id, symbol).await
    }
}

#[cfg(test)]
mod tests {
    use tx_core::error::ConfigurationError;
    use tx_core::{PositionSide, Side};
    use tx_exchange::mock::{MockCall, MockExchange, MockOp, pending_order, position};
    use tx_exchange::{Exchange, ExchangeError};

    use super::*;

    fn desk(mocks: &[Arc<MockExchange>]) -> TradeDesk {
        TradeDesk::new(Arc::new(ExchangeRegistry::from_exchanges(
            mocks.iter().map(|m| m.clone() as Arc<dyn Exchange>),
        )))
    }

    #[tokio::test]
    async fn close_position_routes_by_exchange_name() {
        let binance = Arc::new(
            MockExchange::new("binance")
                .with_positions(vec![position("binance", "BTC/USDT", PositionSide::Short, 0.3)]),
        );
        let bybit = Arc::new(MockExchange::new("bybit"));
        let desk = desk(&[binance.clone(), bybit.clone()]);

        desk.close_position("BINANCE", "BTC/USDT").await.unwrap();
        assert_eq!(
            binance.orders_placed(),
            vec![MockCall::MarketOrder { symbol: "BTC/USDT".into(), side: Side::Buy, quantity: 0.3 }]
        );
        assert!(bybit.calls().is_empty());
    }

    #[tokio::test]
    async fn unknown_exchange_is_unavailable() {
        let desk = desk(&[Arc::new(MockExchange::new("binance"))]);
        let err = desk.cancel_order("okx", "1", "BTC/USDT").await.unwrap_err();
        assert_eq!(
            err,
            ExecError::Unavailable(ConfigurationError::ExchangeUnavailable("okx".into()))
        );
    }

    #[tokio::test]
    async fn reads_tolerate_one_failing_exchange() {
        let binance = Arc::new(
            MockExchange::new("binance")
                .with_orders(vec![pending_order("binance", "11", "BTC/USDT")])
                .with_usdt(250.0),
        );
        let bybit = Arc::new(
            MockExchange::new("bybit")
                .failing(MockOp::FetchOpenOrders, ExchangeError::Transport("timed out".into())),
        );
        let desk = desk(&[binance, bybit]);

        let orders = desk.pending_orders().await;
        assert_eq!(orders.items.len(), 1);
        assert!(orders.failed.contains_key("bybit"));

        let summary = desk.summarize().await;
        assert_eq!(summary.portfolio_value_usdt, 250.0);
        assert!(summary.failed.is_empty());
    }

    #[tokio::test]
    async fn cancel_delegates_to_exchange() {
        let bybit = Arc::new(MockExchange::new("bybit"));
        let desk = desk(&[bybit.clone()]);
        let confirmation = desk.cancel_order("bybit", "tx-42", "ETH/USDT").await.unwrap();
        assert_eq!(confirmation.order_id, "tx-42");
        assert_eq!(
            bybit.calls(),
            vec![MockCall::Cancel { order_id: "tx-42".into(), symbol: "ETH/USDT".into() }]
        );
    }
}
