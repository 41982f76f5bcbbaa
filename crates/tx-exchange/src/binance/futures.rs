//! Binance USDT-margined futures REST client.
//!
//! Every call is signed (`timestamp` + `recvWindow` + `signature` in the
//! query string, API key in `X-MBX-APIKEY`) and paced by the client's
//! [`Throttle`].
//!
//! # REST endpoints
//!
//! | Operation     | Method | Path                    |
//! |---------------|--------|-------------------------|
//! | Account info  | GET    | `/fapi/v3/account`      |
//! | Open orders   | GET    | `/fapi/v1/openOrders`   |
//! | Positions     | GET    | `/fapi/v3/positionRisk` |
//! | New order     | POST   | `/fapi/v1/order`        |
//! | Cancel order  | DELETE | `/fapi/v1/order`        |
//!
//! Failed requests carry `{"code": -2019, "msg": "..."}` bodies; those codes
//! are mapped onto [`ExchangeError`] kinds by [`classify`].

use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use super::auth::RequestSigner;
use crate::error::{ExchangeError, ExchangeResult};
use crate::http::{current_timestamp_ms, read_json, status_error};
use crate::throttle::Throttle;

/// Binance futures account client.
pub struct FuturesClient {
    http: reqwest::Client,
    api_key: String,
    signer: RequestSigner,
    /// REST base URL (e.g. `https://fapi.binance.com`).
    base_url: String,
    /// `recvWindow` for signed requests.
    recv_window: u64,
    throttle: Throttle,
}

impl FuturesClient {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        signer: RequestSigner,
        base_url: String,
        recv_window: u64,
        throttle: Throttle,
    ) -> Self {
        Self {
            http,
            api_key,
            signer,
            base_url,
            recv_window,
            throttle,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // -----------------------------------------------------------------------
    // REST queries
    // -----------------------------------------------------------------------

    /// Query futures account information (balances, assets).
    pub async fn get_account_info(&self) -> ExchangeResult<Value> {
        self.signed(Method::GET, "/fapi/v3/account", &[]).await
    }

    /// Query all open orders (optionally filtered by symbol).
    pub async fn get_open_orders(&self, symbol: Option<&str>) -> ExchangeResult<Value> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(sym) = symbol {
            params.push(("symbol", sym));
        }
        self.signed(Method::GET, "/fapi/v1/openOrders", &params).await
    }

    /// Query position risk for every symbol (including flat ones).
    pub async fn get_positions(&self, symbol: Option<&str>) -> ExchangeResult<Value> {
        let mut params: Vec<(&str, &str)> = Vec::new();
        if let Some(sym) = symbol {
            params.push(("symbol", sym));
        }
        self.signed(Method::GET, "/fapi/v3/positionRisk", &params).await
    }

    // -----------------------------------------------------------------------
    // Order operations
    // -----------------------------------------------------------------------

    /// Place a new order. `price` switches the request to a GTC limit order.
    ///
    /// Returns the full JSON response including the exchange order ID.
    pub async fn place_order(
        &self,
        symbol: &str,
        side: &str,
        order_type: &str,
        quantity: &str,
        price: Option<&str>,
        client_order_id: Option<&str>,
    ) -> ExchangeResult<Value> {
        let mut params: Vec<(&str, &str)> = vec![
            ("symbol", symbol),
            ("side", side),
            ("type", order_type),
            ("quantity", quantity),
        ];
        if let Some(p) = price {
            params.push(("price", p));
            params.push(("timeInForce", "GTC"));
        }
        if let Some(cid) = client_order_id {
            params.push(("newClientOrderId", cid));
        }
        params.push(("newOrderRespType", "RESULT"));
        self.signed(Method::POST, "/fapi/v1/order", &params).await
    }

    /// Cancel an order by exchange ID or, failing that, client ID.
    pub async fn cancel_order(
        &self,
        symbol: &str,
        order_id: Option<u64>,
        client_order_id: Option<&str>,
    ) -> ExchangeResult<Value> {
        let oid_str = order_id.map(|id| id.to_string());
        let mut params: Vec<(&str, &str)> = vec![("symbol", symbol)];
        if let Some(ref oid) = oid_str {
            params.push(("orderId", oid));
        }
        if let Some(cid) = client_order_id {
            params.push(("origClientOrderId", cid));
        }
        self.signed(Method::DELETE, "/fapi/v1/order", &params).await
    }

    // -----------------------------------------------------------------------
    // Transport
    // -----------------------------------------------------------------------

    async fn signed(&self, method: Method, path: &str, params: &[(&str, &str)]) -> ExchangeResult<Value> {
        let timestamp = current_timestamp_ms().to_string();
        let recv_str = self.recv_window.to_string();
        let mut all: Vec<(&str, &str)> = params.to_vec();
        if self.recv_window > 0 {
            all.push(("recvWindow", &recv_str));
        }
        all.push(("timestamp", &timestamp));

        let query = self.signer.signed_query(&all);
        let url = format!("{}{path}?{query}", self.base_url);

        self.throttle.acquire().await;
        debug!("[binance] {method} {path}");
        let resp = self
            .http
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.api_key)
            .send()
            .await?;
        let (status, body) = read_json(resp).await?;

        if let Some(err) = error_from_body(&body) {
            return Err(err);
        }
        if !status.is_success() {
            return Err(status_error(status, &body.to_string()));
        }
        Ok(body)
    }
}

/// Extract a Binance `{code, msg}` error from a response body, if present.
///
/// Successful responses never carry a negative `code`.
fn error_from_body(body: &Value) -> Option<ExchangeError> {
    let code = body.get("code")?.as_i64()?;
    if code >= 0 {
        return None;
    }
    let msg = body.get("msg").and_then(Value::as_str).unwrap_or_default();
    Some(classify(code, msg))
}

/// Map a Binance error code onto an [`ExchangeError`] kind.
pub fn classify(code: i64, msg: &str) -> ExchangeError {
    let message = format!("{code}: {msg}");
    match code {
        -1002 | -1022 | -2014 | -2015 => ExchangeError::Authentication(message),
        -1003 | -1015 => ExchangeError::RateLimited(message),
        -2018 | -2019 | -2027 | -2028 => ExchangeError::InsufficientFunds(message),
        -2011 | -2013 => ExchangeError::OrderNotFound(message),
        -1013 | -1100 | -1102 | -1111 | -1116 | -1121 | -2010 | -2021 | -2022 | -4003
        | -4014 | -4061 | -4164 => ExchangeError::InvalidOrder(message),
        _ => ExchangeError::Rejected {
            code,
            message: msg.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_codes_classified() {
        assert!(matches!(classify(-2015, "Invalid API-key"), ExchangeError::Authentication(_)));
        assert!(matches!(classify(-1003, "Too many requests"), ExchangeError::RateLimited(_)));
        assert!(matches!(classify(-2019, "Margin is insufficient."), ExchangeError::InsufficientFunds(_)));
        assert!(matches!(classify(-2011, "Unknown order sent."), ExchangeError::OrderNotFound(_)));
        assert!(matches!(classify(-4164, "notional too small"), ExchangeError::InvalidOrder(_)));
        assert_eq!(
            classify(-9999, "odd"),
            ExchangeError::Rejected { code: -9999, message: "odd".into() }
        );
    }

    #[test]
    fn body_errors_only_for_negative_codes() {
        assert!(error_from_body(&json!({ "code": -2013, "msg": "Order does not exist." })).is_some());
        assert!(error_from_body(&json!({ "code": 200, "msg": "success" })).is_none());
        assert!(error_from_body(&json!([{ "symbol": "BTCUSDT" }])).is_none());
        assert!(error_from_body(&Value::Null).is_none());
    }
}
