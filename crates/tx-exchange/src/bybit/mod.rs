//! Bybit v5 unified-account capability (`linear` USDT perpetuals).
//!
//! `demo: true` on the connection selects the Bybit testnet.

pub mod client;
pub mod config;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::info;
use tx_core::config::ConnectionConfig;
use tx_core::numeric::{parse_f64, parse_str_u64};
use tx_core::{
    Balance, CancelConfirmation, CurrencyBalance, OrderAck, OrderType, PendingOrder, Position,
    PositionSide, Side,
};

use self::client::BybitClient;
use self::config::{BybitConfig, CATEGORY, DEFAULT_MIN_INTERVAL_MS};
use crate::error::{ExchangeError, ExchangeResult};
use crate::symbol_mapper::SymbolMapper;
use crate::throttle::Throttle;
use crate::{CLIENT_ORDER_ID_PREFIX, Exchange, new_client_order_id};

/// Registry name of this capability.
pub const NAME: &str = "bybit";

/// Bybit exchange capability.
pub struct BybitExchange {
    client: BybitClient,
    symbol_mapper: SymbolMapper,
}

impl BybitExchange {
    /// Build the capability from a connection entry. No request is sent.
    pub fn from_connection(conn: &ConnectionConfig) -> Result<Self> {
        let config = BybitConfig::from_connection(conn)?;
        let throttle = Throttle::from_config(&conn.rate_limit, DEFAULT_MIN_INTERVAL_MS);
        Self::new(config, throttle)
    }

    pub fn new(config: BybitConfig, throttle: Throttle) -> Result<Self> {
        let http = crate::http::build_client(config.request_timeout_secs)?;
        info!(
            "[bybit] client ready: url={} testnet={} throttle={:?}",
            config.rest_url,
            config.testnet,
            throttle.min_interval(),
        );
        let symbol_mapper = SymbolMapper::with_aliases(&config.symbol_aliases);
        Ok(Self {
            client: BybitClient::new(
                http,
                config.api_key,
                config.api_secret,
                config.rest_url,
                config.recv_window,
                throttle,
            ),
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
        let coid = new_client_order_id();
        let mut body = json!({
            "category": CATEGORY,
            "symbol": exchange_symbol,
            "side": map_side(side),
            "orderType": map_order_type(order_type),
            "qty": quantity.to_string(),
            "orderLinkId": coid,
        });
        if let Some(p) = price {
            body["price"] = Value::String(p.to_string());
            body["timeInForce"] = Value::String("GTC".into());
        }

        let result = self.client.post("/v5/order/create", body).await?;
        let order_id = result
            .get("orderId")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| ExchangeError::Decode("orderId missing from order response".into()))?;

        info!(
            "[bybit] order placed: {exchange_symbol} {} {} qty={quantity} → id={order_id}",
            map_side(side),
            map_order_type(order_type),
        );

        Ok(OrderAck {
            order_id,
            client_order_id: Some(coid),
            symbol: symbol.to_string(),
            side,
            order_type,
            quantity,
            price,
            raw: result,
        })
    }
}

#[async_trait]
impl Exchange for BybitExchange {
    fn name(&self) -> &str {
        NAME
    }

    async fn fetch_positions(&self) -> ExchangeResult<Vec<Position>> {
        let items = self
            .client
            .get_list(
                "/v5/position/list",
                &[("category", CATEGORY), ("settleCoin", "USDT"), ("limit", "200")],
            )
            .await?;
        Ok(items
            .into_iter()
            .filter_map(|v| serde_json::from_value::<PositionItem>(v).ok())
            .filter_map(|item| item.into_position(&self.symbol_mapper))
            .collect())
    }

    async fn fetch_open_orders(&self) -> ExchangeResult<Vec<PendingOrder>> {
        let items = self
            .client
            .get_list(
                "/v5/order/realtime",
                &[("category", CATEGORY), ("settleCoin", "USDT"), ("limit", "50")],
            )
            .await?;
        Ok(items
            .into_iter()
            .filter_map(|v| parse_order(v, &self.symbol_mapper))
            .collect())
    }

    async fn fetch_balance(&self) -> ExchangeResult<Balance> {
        let result = self
            .client
            .get("/v5/account/wallet-balance", &[("accountType", "UNIFIED")])
            .await?;
        let wallet: WalletBalanceResult = serde_json::from_value(result)?;
        Ok(wallet.into_balance())
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
        let id_field = if order_id.starts_with(CLIENT_ORDER_ID_PREFIX) {
            "orderLinkId"
        } else {
            "orderId"
        };
        let mut body = json!({ "category": CATEGORY, "symbol": exchange_symbol });
        body[id_field] = Value::String(order_id.to_string());

        let result = self.client.post("/v5/order/cancel", body).await?;
        info!("[bybit] order cancelled: {exchange_symbol} {id_field}={order_id}");

        Ok(CancelConfirmation {
            order_id: result
                .get("orderId")
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())
                .unwrap_or(order_id)
                .to_string(),
            symbol: symbol.to_string(),
            status: None,
            raw: result,
        })
    }
}

// ---------------------------------------------------------------------------
// Wire shapes
// ---------------------------------------------------------------------------

fn map_side(side: Side) -> &'static str {
    match side {
        Side::Buy => "Buy",
        Side::Sell => "Sell",
    }
}

fn map_order_type(order_type: OrderType) -> &'static str {
    match order_type {
        OrderType::Market => "Market",
        OrderType::Limit => "Limit",
    }
}

/// Bybit sends every number as a string, with `""` meaning "not applicable".
fn num(s: &str) -> Option<f64> {
    parse_f64(s).filter(|x| x.is_finite())
}

fn nonzero(s: &str) -> Option<f64> {
    num(s).filter(|x| *x != 0.0)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PositionItem {
    symbol: String,
    #[serde(default)]
    side: String,
    #[serde(default)]
    size: String,
    #[serde(default)]
    avg_price: String,
    #[serde(default)]
    position_value: String,
    #[serde(default)]
    unrealised_pnl: String,
    #[serde(default)]
    liq_price: String,
    #[serde(default)]
    leverage: String,
    #[serde(rename = "positionIM", default)]
    position_im: String,
}

impl PositionItem {
    fn into_position(self, mapper: &SymbolMapper) -> Option<Position> {
        let size = num(&self.size).unwrap_or(0.0);
        if size.abs() < 1e-12 {
            return None;
        }
        let side = match self.side.as_str() {
            "Buy" => PositionSide::Long,
            "Sell" => PositionSide::Short,
            _ => return None,
        };
        let entry_price = num(&self.avg_price).unwrap_or(0.0);
        let notional = num(&self.position_value)
            .map(f64::abs)
            .unwrap_or(size.abs() * entry_price);
        let margin_ratio = nonzero(&self.position_im)
            .filter(|_| notional > 0.0)
            .map(|im| im / notional);

        Some(Position {
            exchange: NAME.to_string(),
            symbol: mapper.to_display(&self.symbol),
            side,
            contracts: size.abs(),
            notional,
            entry_price,
            liquidation_price: nonzero(&self.liq_price),
            margin_ratio,
            leverage: nonzero(&self.leverage),
            unrealized_pnl: num(&self.unrealised_pnl).unwrap_or(0.0),
        })
    }
}

/// Parse a `/v5/order/realtime` entry, keeping the raw record.
fn parse_order(v: Value, mapper: &SymbolMapper) -> Option<PendingOrder> {
    let text = |key: &str| v.get(key).and_then(Value::as_str).unwrap_or_default();
    let order_id = text("orderId");
    if order_id.is_empty() {
        return None;
    }
    let link_id = text("orderLinkId");
    Some(PendingOrder {
        exchange: NAME.to_string(),
        order_id: order_id.to_string(),
        client_order_id: (!link_id.is_empty()).then(|| link_id.to_string()),
        symbol: mapper.to_display(text("symbol")),
        side: Side::parse(text("side")),
        order_type: text("orderType").to_lowercase(),
        price: nonzero(text("price")),
        quantity: num(text("qty")).unwrap_or(0.0),
        filled: num(text("cumExecQty")).unwrap_or(0.0),
        status: text("orderStatus").to_lowercase(),
        timestamp: parse_str_u64(v.get("updatedTime")).or_else(|| parse_str_u64(v.get("createdTime"))),
        raw: v.clone(),
    })
}

#[derive(Debug, Deserialize)]
struct WalletBalanceResult {
    #[serde(default)]
    list: Vec<AccountEntry>,
}

#[derive(Debug, Deserialize)]
struct AccountEntry {
    #[serde(default)]
    coin: Vec<CoinBalance>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CoinBalance {
    coin: String,
    #[serde(default)]
    wallet_balance: String,
    #[serde(default)]
    available_to_withdraw: String,
    #[serde(default)]
    locked: String,
}

impl WalletBalanceResult {
    fn into_balance(self) -> Balance {
        let mut balance = Balance::default();
        for coin in self.list.into_iter().flat_map(|account| account.coin) {
            let total = num(&coin.wallet_balance).unwrap_or(0.0);
            let free = num(&coin.available_to_withdraw)
                .unwrap_or_else(|| total - num(&coin.locked).unwrap_or(0.0));
            balance.insert(
                &coin.coin,
                CurrencyBalance {
                    total,
                    free,
                    used: (total - free).max(0.0),
                },
            );
        }
        balance
    }
}
