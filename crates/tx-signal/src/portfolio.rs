//! Portfolio aggregation across exchanges.
//!
//! Recomputed from live data on every call:
//!
//! ```text
//! portfolio_value_usdt = Σ exchange  balance["USDT"].total
//! total_unrealized_pnl = Σ position  unrealized_pnl
//! margin_used          = Σ position  notional × margin_ratio   (0 if ratio unknown)
//! ```
//!
//! Exchanges are queried concurrently and independently, so the totals are
//! not an atomic snapshot. An exchange whose balance or position fetch fails
//! contributes zero and is listed in [`PortfolioSummary::failed`].

use std::sync::Arc;

use futures_util::future::join_all;
use tracing::{debug, error};
use tx_core::{ExchangeContribution, PortfolioSummary};
use tx_exchange::{Exchange, ExchangeRegistry, ExchangeResult};

/// One exchange's contribution: one balance fetch and one position fetch.
pub async fn contribution(exchange: &dyn Exchange) -> ExchangeResult<ExchangeContribution> {
    let (balance, positions) = tokio::join!(exchange.fetch_balance(), exchange.fetch_positions());
    let (balance, positions) = (balance?, positions?);

    Ok(ExchangeContribution {
        portfolio_value_usdt: balance.usdt_total(),
        unrealized_pnl: positions.iter().map(|p| p.unrealized_pnl).sum(),
        margin_used: positions.iter().map(|p| p.margin_used()).sum(),
        open_positions: positions.len(),
    })
}

/// Aggregate statistics over every configured exchange.
pub async fn summarize(registry: &ExchangeRegistry) -> PortfolioSummary {
    let results = join_all(registry.iter().map(|(name, ex)| {
        let ex = Arc::clone(ex);
        async move { (name, contribution(ex.as_ref()).await) }
    }))
    .await;

    let mut summary = PortfolioSummary::default();
    for (name, result) in results {
        match result {
            Ok(c) => {
                debug!(
                    "[portfolio] {name}: value={} pnl={} margin={} positions={}",
                    c.portfolio_value_usdt, c.unrealized_pnl, c.margin_used, c.open_positions
                );
                summary.add(name, c);
            }
            Err(e) => {
                error!("[portfolio] {name} excluded from summary: {e}");
                summary.add(name, ExchangeContribution::default());
                summary.failed.push(name.to_string());
            }
        }
    }
    summary
}
