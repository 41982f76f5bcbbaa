//! Binance USDT-margined futures capability.
//!
//! Implements the [`Exchange`](crate::Exchange) trait on top of the signed
//! REST [`FuturesClient`].
//!
//! # Architecture
//!
//! ```text
//! BinanceExchange
//! ├── FuturesClient   (signed REST, HMAC or Ed25519, throttled)
//! └── SymbolMapper    (BTC/USDT ↔ BTCUSDT)
//! ```
//!
//! `demo: true` targets the demo-trading futures endpoint, which accepts the
//! same API surface with paper balances.
//!
//! All methods take `&self` and are safe to call from multiple tasks
//! concurrently.

pub mod auth;
pub mod config;
pub mod futures;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::info;
use tx_core::config::ConnectionConfig;
use tx_core::numeric::{id_string, parse_f64_field, parse_nonzero_field, parse_str_u64};
use tx_core::{
    Balance, CancelConfirmation, CurrencyBalance, OrderAck, OrderType, PendingOrder, Position,
    PositionSide, Side,
};

use self::auth::RequestSigner;
use self::config::{BinanceConfig, DEFAULT_MIN_INTERVAL_MS};
use self::futures::FuturesClient;
use crate::error::{ExchangeError, ExchangeResult};
use crate::symbol_mapper::SymbolMapper;
use crate::throttle::Throttle;
use crate::{Exchange, new_client_order_id};

/// Registry name of this capability.
pub const NAME: &str = "binance";

/// Binance futures exchange capability.
pub struct BinanceExchange {
    client: FuturesClient,
    symbol_mapper: SymbolMapper,
}

impl BinanceExchange {
    /// Build the capability from a connection entry.
    ///
    /// Reads the Ed25519 key file if one is configured. No request is sent.
    pub fn from_connection(conn: &ConnectionConfig) -> Result<Self> {
        let config = BinanceConfig::from_connection(conn)?;
        let throttle = Throttle::from_config(&conn.rate_limit, DEFAULT_MIN_INTERVAL_MS);
        Self::new(config, throttle)
    }

    pub fn new(config: BinanceConfig, throttle: Throttle) -> Result<Self> {
        let signer = match &config.ed25519_key_path {
            Some(path) => {
                let pem = std::fs::read_to_string(path)
                    .with_context(|| format!("failed to read Ed25519 key file: {path}"))?;
                RequestSigner::ed25519_from_pem(&pem)?
            }
            None => RequestSigner::hmac(config.api_secret.clone()),
        };
        let http = crate::http::build_client(config.request_timeout_secs)?;

        info!(
            "[binance] futures client ready: url={} demo={} signing={} throttle={:?}",
            config.rest_url,
            config.demo,
            signer.label(),
            throttle.min_interval(),
        );

        let symbol_mapper = SymbolMapper::with_aliases(&config.symbol_aliases);
        let client = FuturesClient::new(
            http,
            config.api_key,
            signer,
            config.rest_url,
            config.recv_window,
            throttle,
        );
        Ok(Self {
            client,
            symbol_mapper,
        })
    }

    async fn submit(
        &self,
        symbol: &str,
        side: Side,
        order_type: OrderType,
        quantity: f64,
        price: Option<f64>,
    ) -> ExchangeResult<OrderAck> {
        let exchange_symbol = self.symbol_mapper.to_exchange(symbol);
        let side_str = match side {
            Side::Buy => "BUY",
            Side::Sell => "SELL",
        };
        let type_str = match order_type {
            OrderType::Market => "MARKET",
            OrderType::Limit => "LIMIT",
        };
        let qty_str = quantity.to_string();
        let price_str = price.map(|p| p.to_string());
        let coid = new_client_order_id();

        let resp = self
            .client
            .place_order(
                &exchange_symbol,
                side_str,
                type_str,
                &qty_str,
                price_str.as_deref(),
                Some(&coid),
            )
            .await?;

        let order_id = id_string(resp.get("orderId"))
            .ok_or_else(|| ExchangeError::Decode("orderId missing from order response".into()))?;

        info!(
            "[binance] order placed: {exchange_symbol} {side_str} {type_str} qty={qty_str} price={} → id={order_id}",
            price_str.as_deref().unwrap_or("-"),
        );

        Ok(OrderAck {
            order_id,
            client_order_id: id_string(resp.get("clientOrderId")).or(Some(coid)),
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            price,
            raw: resp,
        })
    }
}

#[async_trait]
impl Exchange for BinanceExchange {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_positions(&self) -> ExchangeResult<Vec<Position>> {
        let val = self.client.get_positions(None).await?;
        Ok(collect(&val, |v| parse_position(v, &self.symbol_mapper)))
    }

    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<PendingOrder>> {
        let val = self.client.get_open_orders(None).await?;
        Ok(collect(&val, |v| parse_order(v, &self.symbol_mapper)))
    }

    async fn fetch_balance(&self) -> ExchangeResult<Balance> {
        let val = self.client.get_account_info().await?;
        Ok(parse_balance(&val))
    }

    async fn create_market_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
    ) -> ExchangeResult<OrderAck> {
        self.submit(symbol, side, OrderType::Market, quantity, None).await
    }

    async fn create_limit_order(
        &self,
        symbol: &str,
        side: Side,
        quantity: f64,
        price: f64,
    ) -> ExchangeResult<OrderAck> {
        self.submit(symbol, side, OrderType::Limit, quantity, Some(price))
            .await
    }

    async fn cancel_order(
        &self,
        order_id: &str,
        symbol: &str,
    ) -> ExchangeResult<CancelConfirmation> {
        let exchange_symbol = self.symbol_mapper.to_exchange(symbol);
        let order_id = order_id.trim();
        // Numeric IDs are exchange IDs; anything else is a client order ID.
        let resp = match order_id.parse::<u64>() {
            Ok(oid) => self.client.cancel_order(&exchange_symbol, Some(oid), None).await?,
            Err(_) => {
                self.client
                    .cancel_order(&exchange_symbol, None, Some(order_id))
                    .await?
            }
        };

        info!("[binance] order cancelled: {exchange_symbol} id={order_id}");

        Ok(CancelConfirmation {
            order_id: id_string(resp.get("orderId")).unwrap_or_else(|| order_id.to_string()),
            symbol: symbol.to_string(),
            status: resp
                .get("status")
                .and_then(Value::as_str)
                .map(str::to_lowercase),
            raw: resp,
        })
    }
}

// ---------------------------------------------------------------------------
// JSON → typed helpers
// ---------------------------------------------------------------------------

fn collect<T>(val: &Value, parse: impl Fn(&Value) -> Option<T>) -> Vec<T> {
    val.as_array()
        .map(|arr| arr.iter().filter_map(parse).collect())
        .unwrap_or_default()
}

/// Parse a `/fapi/v3/positionRisk` entry. Flat entries yield `None`.
fn parse_position(v: &Value, mapper: &SymbolMapper) -> Option<Position> {
    let amt = parse_f64_field(v, "positionAmt").unwrap_or(0.0);
    if amt.abs() < 1e-12 {
        return None;
    }

    // Hedge mode reports LONG/SHORT explicitly; one-way mode reports BOTH.
    let side = match v.get("positionSide").and_then(Value::as_str) {
        Some("LONG") => PositionSide::Long,
        Some("SHORT") => PositionSide::Short,
        _ if amt > 0.0 => PositionSide::Long,
        _ => PositionSide::Short,
    };

    let entry_price = parse_f64_field(v, "entryPrice").unwrap_or(0.0);
    let notional = parse_f64_field(v, "notional")
        .map(f64::abs)
        .unwrap_or(amt.abs() * entry_price);
    let margin_ratio = parse_f64_field(v, "initialMargin")
        .filter(|im| *im > 0.0 && notional > 0.0)
        .map(|im| im / notional);

    Some(Position {
        exchange: NAME.to_string(),
        symbol: mapper.to_display(v.get("symbol")?.as_str()?),
        side,
        contracts: amt.abs(),
        notional,
        entry_price,
        liquidation_price: parse_nonzero_field(v, "liquidationPrice"),
        margin_ratio,
        leverage: parse_nonzero_field(v, "leverage"),
        unrealized_pnl: parse_f64_field(v, "unRealizedProfit").unwrap_or(0.0),
    })
}

/// Parse a `/fapi/v1/openOrders` entry.
fn parse_order(v: &Value, mapper: &SymbolMapper) -> Option<PendingOrder> {
    Some(PendingOrder {
        exchange: NAME.to_string(),
        order_id: id_string(v.get("orderId"))?,
        client_order_id: id_string(v.get("clientOrderId")),
        symbol: mapper.to_display(v.get("symbol")?.as_str()?),
        side: v.get("side").and_then(Value::as_str).and_then(Side::parse),
        order_type: v
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase(),
        price: parse_nonzero_field(v, "price"),
        quantity: parse_f64_field(v, "origQty").unwrap_or(0.0),
        filled: parse_f64_field(v, "executedQty").unwrap_or(0.0),
        status: v
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_lowercase(),
        timestamp: parse_str_u64(v.get("updateTime")).or_else(|| parse_str_u64(v.get("time"))),
        raw: v.clone(),
    })
}

/// Parse a `/fapi/v3/account` response into per-asset balances.
///
/// `total` is the margin balance (wallet + unrealized PnL) when reported,
/// otherwise the wallet balance.
fn parse_balance(v: &Value) -> Balance {
    let mut balance = Balance::default();
    let Some(assets) = v.get("assets").and_then(Value::as_array) else {
        return balance;
    };
    for a in assets {
        let Some(asset) = a.get("asset").and_then(Value::as_str) else {
            continue;
        };
        let total = parse_f64_field(a, "marginBalance")
            .or_else(|| parse_f64_field(a, "walletBalance"))
            .unwrap_or(0.0);
        let free = parse_f64_field(a, "availableBalance").unwrap_or(total);
        balance.insert(
            asset,
            CurrencyBalance {
                total,
                free,
                used: (total - free).max(0.0),
            },
        );
    }
    balance
}
