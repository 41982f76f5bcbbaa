//! Bybit v5 REST client.
//!
//! Signed requests carry the API key, timestamp, receive window, and an
//! HMAC-SHA256 hex signature in `X-BAPI-*` headers. The signed payload is
//! `timestamp + api_key + recv_window + (query string | JSON body)`.
//!
//! Every response is wrapped in `{"retCode", "retMsg", "result"}`; a
//! non-zero `retCode` is an error even on HTTP 200.
//!
//! | Operation     | Method | Path                         |
//! |---------------|--------|------------------------------|
//! | Positions     | GET    | `/v5/position/list`          |
//! | Open orders   | GET    | `/v5/order/realtime`         |
//! | Balance       | GET    | `/v5/account/wallet-balance` |
//! | New order     | POST   | `/v5/order/create`           |
//! | Cancel order  | POST   | `/v5/order/cancel`           |

use hmac::{Hmac, Mac};
use reqwest::Method;
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;
use tracing::debug;

use crate::error::{ExchangeError, ExchangeResult};
use crate::http::{current_timestamp_ms, encode_query, read_json, status_error};
use crate::throttle::Throttle;

type HmacSha256 = Hmac<Sha256>;

/// Upper bound on cursor pages followed per list query.
const MAX_PAGES: usize = 10;

/// Response envelope shared by every v5 endpoint.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(rename = "retCode")]
    ret_code: i64,
    #[serde(rename = "retMsg", default)]
    ret_msg: String,
    #[serde(default)]
    result: Value,
}

/// Bybit v5 REST client.
pub struct BybitClient {
    http: reqwest::Client,
    api_key: String,
    api_secret: String,
    base_url: String,
    recv_window: u64,
    throttle: Throttle,
}

impl BybitClient {
    pub fn new(
        http: reqwest::Client,
        api_key: String,
        api_secret: String,
        base_url: String,
        recv_window: u64,
        throttle: Throttle,
    ) -> Self {
        Self {
            http,
            api_key,
            api_secret,
            base_url,
            recv_window,
            throttle,
        }
    }

    /// Signed GET that follows `nextPageCursor` and concatenates every
    /// page's `result.list`.
    pub async fn get_list(&self, path: &str, params: &[(&str, &str)]) -> ExchangeResult<Vec<Value>> {
        let mut items = Vec::new();
        let mut cursor: Option<String> = None;
        for _ in 0..MAX_PAGES {
            let mut query: Vec<(&str, &str)> = params.to_vec();
            if let Some(ref c) = cursor {
                query.push(("cursor", c));
            }
            let result = self.signed(Method::GET, path, &query, None).await?;
            if let Some(list) = result.get("list").and_then(Value::as_array) {
                items.extend(list.iter().cloned());
            }
            cursor = result
                .get("nextPageCursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            if cursor.is_none() {
                break;
            }
        }
        Ok(items)
    }

    /// Signed GET returning `result`.
    pub async fn get(&self, path: &str, params: &[(&str, &str)]) -> ExchangeResult<Value> {
        self.signed(Method::GET, path, params, None).await
    }

    /// Signed POST with a JSON body, returning `result`.
    pub async fn post(&self, path: &str, body: Value) -> ExchangeResult<Value> {
        self.signed(Method::POST, path, &[], Some(body)).await
    }

    async fn signed(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, &str)],
        body: Option<Value>,
    ) -> ExchangeResult<Value> {
        let timestamp = current_timestamp_ms();
        let query = encode_query(params);
        let body_string = body.as_ref().map(Value::to_string).unwrap_or_default();
        let payload = if method == Method::GET { &query } else { &body_string };
        let signature = sign(&self.api_secret, timestamp, &self.api_key, self.recv_window, payload);

        let url = if query.is_empty() {
            format!("{}{path}", self.base_url)
        } else {
            format!("{}{path}?{query}", self.base_url)
        };
        let mut request = self
            .http
            .request(method.clone(), &url)
            .header("X-BAPI-API-KEY", &self.api_key)
            .header("X-BAPI-TIMESTAMP", timestamp.to_string())
            .header("X-BAPI-SIGN", signature)
            .header("X-BAPI-RECV-WINDOW", self.recv_window.to_string());
        if method != Method::GET {
            request = request
                .header("Content-Type", "application/json")
                .body(body_string);
        }

        self.throttle.acquire().await;
        debug!("[bybit] {method} {path}");
        let (status, raw) = read_json(request.send().await?).await?;

        let Ok(envelope) = serde_json::from_value::<ApiResponse>(raw.clone()) else {
            if !status.is_success() {
                return Err(status_error(status, &raw.to_string()));
            }
            return Err(ExchangeError::Decode(format!("unexpected response shape from {path}")));
        };
        if envelope.ret_code != 0 {
            return Err(classify(envelope.ret_code, &envelope.ret_msg));
        }
        if !status.is_success() {
            return Err(status_error(status, &raw.to_string()));
        }
        Ok(envelope.result)
    }
}

/// Compute the `X-BAPI-SIGN` value.
pub fn sign(secret: &str, timestamp: u64, api_key: &str, recv_window: u64, payload: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC accepts any key length");
    mac.update(format!("{timestamp}{api_key}{recv_window}{payload}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Map a Bybit `retCode` onto an [`ExchangeError`] kind.
pub fn classify(code: i64, msg: &str) -> ExchangeError {
    let message = format!("{code}: {msg}");
    match code {
        10003 | 10004 | 10005 | 10007 | 10009 | 33004 => ExchangeError::Authentication(message),
        10006 | 10018 => ExchangeError::RateLimited(message),
        110004 | 110006 | 110007 | 110012 | 110044 | 110045 => {
            ExchangeError::InsufficientFunds(message)
        }
        110001 | 110008 | 110010 => ExchangeError::OrderNotFound(message),
        10001 | 110003 | 110017 | 110094 | 170130 | 170136 => ExchangeError::InvalidOrder(message),
        _ => ExchangeError::Rejected {
            code,
            message: msg.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_matches_manual_hmac() {
        let payload = r#"{"category":"linear"}"#;
        let sig = sign("secret", 1_658_385_579_423, "KEY", 5_000, payload);
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(format!("1658385579423KEY5000{payload}").as_bytes());
        assert_eq!(sig, hex::encode(mac.finalize().into_bytes()));
        assert_eq!(sig.len(), 64);
    }

    #[test]
    fn ret_codes_classified() {
        assert!(matches!(classify(10003, "invalid api key"), ExchangeError::Authentication(_)));
        assert!(matches!(classify(10006, "too many visits"), ExchangeError::RateLimited(_)));
        assert!(matches!(classify(110007, "ab not enough"), ExchangeError::InsufficientFunds(_)));
        assert!(matches!(classify(110001, "order not exists"), ExchangeError::OrderNotFound(_)));
        assert!(matches!(classify(10001, "params error"), ExchangeError::InvalidOrder(_)));
        assert!(matches!(classify(12345, "?"), ExchangeError::Rejected { code: 12345, .. }));
    }
}
