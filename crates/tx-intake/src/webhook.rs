//! Webhook intake: `POST /webhook` with a JSON signal body.
//!
//! | Outcome                              | Status | Body                       |
//! |--------------------------------------|--------|----------------------------|
//! | empty / malformed / non-object body  | 400    | `{"error": ...}`           |
//! | PIN mismatch                         | 403    | `{"error":"Invalid pin"}`  |
//! | field validation failure             | 400    | `{"error": reason}`        |
//! | accepted (order outcome ignored)     | 200    | `{"status":"ok"}`          |
//! | execution task panicked              | 500    | `{"error": message}`       |
//!
//! Once a payload passes validation the response is 200 whether or not the
//! exchange accepts the order; execution results only show up in logs and
//! on the control API.

use anyhow::Context;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Map, Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tx_signal::{SignalError, SignalProcessor};

/// Build the webhook router.
pub fn router(processor: SignalProcessor) -> Router {
    Router::new()
        .route("/webhook", post(receive))
        .layer(TraceLayer::new_for_http())
        .with_state(processor)
}

/// Bind `addr` and serve until the task is aborted.
pub async fn serve(addr: &str, processor: SignalProcessor) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind webhook listener on {addr}"))?;
    info!("[webhook] listening on {}", listener.local_addr()?);
    axum::serve(listener, router(processor))
        .await
        .context("webhook server")
}

fn reply(status: StatusCode, body: Value) -> Response {
    (status, Json(body)).into_response()
}

fn parse_body(body: &[u8]) -> Result<Map<String, Value>, Response> {
    if body.iter().all(u8::is_ascii_whitespace) {
        warn!("[webhook] empty request body");
        return Err(reply(StatusCode::BAD_REQUEST, json!({ "error": "No JSON data" })));
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(Value::Null) => {
            warn!("[webhook] null JSON body");
            Err(reply(StatusCode::BAD_REQUEST, json!({ "error": "No JSON data" })))
        }
        Ok(_) => {
            warn!("[webhook] JSON body is not an object");
            Err(reply(StatusCode::BAD_REQUEST, json!({ "error": "Malformed JSON" })))
        }
        Err(e) => {
            error!("[webhook] malformed JSON body: {e}");
            Err(reply(StatusCode::BAD_REQUEST, json!({ "error": "Malformed JSON" })))
        }
    }
}

async fn receive(State(processor): State<SignalProcessor>, body: Bytes) -> Response {
    let raw = match parse_body(&body) {
        Ok(raw) => raw,
        Err(resp) => return resp,
    };

    match processor.process("webhook", &raw).await {
        Ok(_) => reply(StatusCode::OK, json!({ "status": "ok" })),
        Err(e) if e.is_pin_mismatch() => reply(StatusCode::FORBIDDEN, json!({ "error": "Invalid pin" })),
        Err(e) if e.is_rejection() => reply(StatusCode::BAD_REQUEST, json!({ "error": e.to_string() })),
        Err(SignalError::Aborted(reason)) => {
            reply(StatusCode::INTERNAL_SERVER_ERROR, json!({ "error": reason }))
        }
        // Unavailable exchange or order rejection: already logged by the pipeline.
        Err(_) => reply(StatusCode::OK, json!({ "status": "ok" })),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;
    use tx_core::Side;
    use tx_exchange::mock::{MockCall, MockExchange, MockOp};
    use tx_exchange::{Exchange, ExchangeError, ExchangeRegistry};
    use tx_signal::SignalValidator;

    use super::*;

    fn app(pin: Option<&str>, mock: &Arc<MockExchange>) -> Router {
        let registry = ExchangeRegistry::from_exchanges([mock.clone() as Arc<dyn Exchange>]);
        router(SignalProcessor::new(
            SignalValidator::new(pin.map(str::to_string)),
            Arc::new(registry),
        ))
    }

    async fn post(app: Router, body: &str) -> (StatusCode, Value) {
        let resp = app
            .oneshot(
                Request::post("/webhook")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    const MARKET_BUY: &str = r#"{"EXCHANGE":"binance","SYMBOL":"BTC/USDT","SIDE":"buy","ORDER_TYPE":"market","QUANTITY":"0.01","PIN":"1234"}"#;

    #[tokio::test]
    async fn accepted_signal_places_order() {
        let mock = Arc::new(MockExchange::new("binance"));
        let (status, body) = post(app(Some("1234"), &mock), MARKET_BUY).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
        assert_eq!(
            mock.orders_placed(),
            vec![MockCall::MarketOrder { symbol: "BTC/USDT".into(), side: Side::Buy, quantity: 0.01 }]
        );
    }

    #[tokio::test]
    async fn wrong_pin_is_forbidden() {
        let mock = Arc::new(MockExchange::new("binance"));
        let (status, body) = post(app(Some("9999"), &mock), MARKET_BUY).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body, json!({ "error": "Invalid pin" }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn malformed_and_empty_bodies_are_bad_requests() {
        let mock = Arc::new(MockExchange::new("binance"));

        let (status, body) = post(app(None, &mock), "{\"EXCHANGE\": ").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "Malformed JSON" }));

        let (status, body) = post(app(None, &mock), "").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "No JSON data" }));

        let (status, _) = post(app(None, &mock), "[1, 2]").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn validation_failure_is_bad_request() {
        let mock = Arc::new(MockExchange::new("binance"));
        let (status, body) = post(
            app(None, &mock),
            r#"{"EXCHANGE":"binance","SYMBOL":"BTC/USDT","SIDE":"buy","ORDER_TYPE":"limit","QUANTITY":1}"#,
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "error": "missing PRICE for limit order" }));
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn exchange_rejection_still_acknowledged() {
        let mock = Arc::new(MockExchange::new("binance").failing(
            MockOp::CreateOrder,
            ExchangeError::InsufficientFunds("-2019: Margin is insufficient.".into()),
        ));
        let (status, body) = post(app(Some("1234"), &mock), MARKET_BUY).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "status": "ok" }));
        assert_eq!(mock.order_count(), 0);
        assert_eq!(mock.orders_placed().len(), 1);
    }

    #[tokio::test]
    async fn unconfigured_exchange_still_acknowledged() {
        let mock = Arc::new(MockExchange::new("binance"));
        let (status, _) = post(
            app(None, &mock),
            r#"{"EXCHANGE":"bybit","SYMBOL":"BTC/USDT","SIDE":"buy","ORDER_TYPE":"market","QUANTITY":1}"#,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn panicking_exchange_is_internal_error() {
        let mock = Arc::new(MockExchange::new("binance").panicking(MockOp::CreateOrder));
        let app = app(Some("1234"), &mock);

        let (status, body) = post(app.clone(), MARKET_BUY).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("panicked"), "{body}");

        mock.clear_failure(MockOp::CreateOrder);
        let (status, _) = post(app, MARKET_BUY).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(mock.orders_placed().len(), 2);
    }
}
