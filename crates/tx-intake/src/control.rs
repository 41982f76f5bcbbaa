//! JSON monitoring/control API over a [`TradeDesk`].
//!
//! ```text
//! GET  /positions            open positions, all exchanges
//! GET  /pending_orders       resting orders, all exchanges
//! GET  /summary_stats        portfolio value / PnL / margin
//! POST /close_position       {"exchange","symbol"}
//! POST /close_all_positions
//! POST /cancel_order         {"exchange","order_id","symbol"}
//! ```
//!
//! Every response carries `"status": "success"` or `"status": "error"` with a
//! `"message"`. Reads always succeed; exchanges that could not be read are
//! listed under `"failed"`.

use anyhow::Context;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tx_core::error::ExecError;
use tx_signal::TradeDesk;

#[derive(Debug, Deserialize)]
struct ClosePositionReq {
    #[serde(alias = "EXCHANGE")]
    exchange: String,
    #[serde(alias = "SYMBOL")]
    symbol: String,
}

#[derive(Debug, Deserialize)]
struct CancelOrderReq {
    #[serde(alias = "EXCHANGE")]
    exchange: String,
    #[serde(alias = "ORDER_ID")]
    order_id: String,
    #[serde(alias = "SYMBOL")]
    symbol: String,
}

pub fn router(desk: TradeDesk) -> Router {
    Router::new()
        .route("/positions", get(positions))
        .route("/pending_orders", get(pending_orders))
        .route("/summary_stats", get(summary_stats))
        .route("/close_position", post(close_position))
        .route("/close_all_positions", post(close_all_positions))
        .route("/cancel_order", post(cancel_order))
        .layer(TraceLayer::new_for_http())
        .with_state(desk)
}

pub async fn serve(addr: &str, desk: TradeDesk) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("bind control listener on {addr}"))?;
    info!("[control] listening on {}", listener.local_addr()?);
    axum::serve(listener, router(desk)).await.context("control server")
}

fn bad_body(rejection: JsonRejection) -> Response {
    warn!("[control] rejected request body: {rejection}");
    let message = rejection.body_text();
    (rejection.status(), Json(json!({ "status": "error", "message": message }))).into_response()
}

fn exec_error(err: &ExecError) -> Response {
    let status = match err {
        ExecError::Unavailable(_) | ExecError::NoOpenPosition { .. } => StatusCode::NOT_FOUND,
        ExecError::ExchangeRejected(_) => StatusCode::BAD_GATEWAY,
    };
    (status, Json(json!({ "status": "error", "message": err.to_string() }))).into_response()
}

async fn positions(State(desk): State<TradeDesk>) -> Json<Value> {
    let fan = desk.positions().await;
    Json(json!({ "status": "success", "positions": fan.items, "failed": fan.failed }))
}

async fn pending_orders(State(desk): State<TradeDesk>) -> Json<Value> {
    let fan = desk.pending_orders().await;
    Json(json!({ "status": "success", "orders": fan.items, "failed": fan.failed }))
}

async fn summary_stats(State(desk): State<TradeDesk>) -> Json<Value> {
    Json(json!({ "status": "success", "summary": desk.summarize().await }))
}

async fn close_position(
    State(desk): State<TradeDesk>,
    body: Result<Json<ClosePositionReq>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(req) => req,
        Err(rejection) => return bad_body(rejection),
    };
    match desk.close_position(&req.exchange, &req.symbol).await {
        Ok(ack) => Json(json!({ "status": "success", "order": ack })).into_response(),
        Err(e) => exec_error(&e),
    }
}

async fn close_all_positions(State(desk): State<TradeDesk>) -> Json<Value> {
    let report = desk.close_all_positions().await;
    let results: Vec<Value> = report
        .outcomes
        .iter()
        .map(|o| match &o.result {
            Ok(ack) => json!({
                "exchange": o.exchange, "symbol": o.symbol,
                "status": "success", "order_id": ack.order_id,
            }),
            Err(e) => json!({
                "exchange": o.exchange, "symbol": o.symbol,
                "status": "error", "message": e.to_string(),
            }),
        })
        .collect();
    Json(json!({
        "status": "success",
        "closed": report.closed(),
        "attempted": report.outcomes.len(),
        "results": results,
        "failed": report.failed,
    }))
}

async fn cancel_order(
    State(desk): State<TradeDesk>,
    body: Result<Json<CancelOrderReq>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(req) => req,
        Err(rejection) => return bad_body(rejection),
    };
    match desk.cancel_order(&req.exchange, &req.order_id, &req.symbol).await {
        Ok(confirmation) => Json(json!({ "status": "success", "cancelled": confirmation })).into_response(),
        Err(e) => exec_error(&e),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;
    use tx_core::PositionSide;
    use tx_exchange::mock::{MockExchange, MockOp, pending_order, position};
    use tx_exchange::{Exchange, ExchangeError, ExchangeRegistry};

    use super::*;

    fn app(mocks: &[Arc<MockExchange>]) -> Router {
        let registry =
            ExchangeRegistry::from_exchanges(mocks.iter().map(|m| m.clone() as Arc<dyn Exchange>));
        router(TradeDesk::new(Arc::new(registry)))
    }

    async fn call(app: Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let resp = app.oneshot(req.body(body).unwrap()).await.unwrap();
        let status = resp.status();
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn positions_list_failed_exchanges() {
        let binance = Arc::new(
            MockExchange::new("binance")
                .with_positions(vec![position("binance", "BTC/USDT", PositionSide::Long, 1.0)]),
        );
        let bybit = Arc::new(
            MockExchange::new("bybit")
                .failing(MockOp::FetchPositions, ExchangeError::Transport("reset".into())),
        );

        let (status, body) = call(app(&[binance, bybit]), "GET", "/positions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "success");
        assert_eq!(body["positions"][0]["symbol"], "BTC/USDT");
        assert_eq!(body["failed"]["bybit"], "transport error: reset");
    }

    #[tokio::test]
    async fn pending_orders_and_summary() {
        let binance = Arc::new(
            MockExchange::new("binance")
                .with_orders(vec![pending_order("binance", "77", "ETH/USDT")])
                .with_usdt(1200.0),
        );

        let (_, body) = call(app(&[binance.clone()]), "GET", "/pending_orders", None).await;
        assert_eq!(body["orders"][0]["order_id"], "77");

        let (_, body) = call(app(&[binance]), "GET", "/summary_stats", None).await;
        assert_eq!(body["summary"]["portfolio_value_usdt"], 1200.0);
        assert_eq!(body["summary"]["failed"], json!([]));
    }

    #[tokio::test]
    async fn close_position_without_position_is_error() {
        let binance = Arc::new(MockExchange::new("binance"));
        let (status, body) = call(
            app(&[binance.clone()]),
            "POST",
            "/close_position",
            Some(json!({ "exchange": "binance", "symbol": "BTC/USDT" })),
        )
        .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "no open position for BTC/USDT on binance");
        assert!(binance.orders_placed().is_empty());
    }

    #[tokio::test]
    async fn close_all_reports_each_position() {
        let binance = Arc::new(MockExchange::new("binance").with_positions(vec![
            position("binance", "BTC/USDT", PositionSide::Long, 1.0),
            position("binance", "ETH/USDT", PositionSide::Short, 2.0),
        ]));

        let (status, body) = call(app(&[binance.clone()]), "POST", "/close_all_positions", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["attempted"], 2);
        assert_eq!(body["closed"], 2);
        assert_eq!(binance.orders_placed().len(), 2);
    }

    #[tokio::test]
    async fn cancel_order_accepts_uppercase_fields() {
        let bybit = Arc::new(MockExchange::new("bybit"));
        let (status, body) = call(
            app(&[bybit]),
            "POST",
            "/cancel_order",
            Some(json!({ "EXCHANGE": "bybit", "ORDER_ID": "tx-1", "SYMBOL": "SOL/USDT" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["cancelled"]["order_id"], "tx-1");
    }

    #[tokio::test]
    async fn cancel_on_unknown_exchange_is_not_found() {
        let (status, body) = call(
            app(&[]),
            "POST",
            "/cancel_order",
            Some(json!({ "exchange": "okx", "order_id": "1", "symbol": "BTC/USDT" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "exchange 'okx' is not configured or unavailable");
    }

    #[tokio::test]
    async fn bad_bodies_get_the_error_envelope() {
        let binance = Arc::new(MockExchange::new("binance"));

        let (status, body) = call(
            app(&[binance.clone()]),
            "POST",
            "/close_position",
            Some(json!({ "exchange": "binance" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["status"], "error");
        assert!(body["message"].as_str().unwrap().contains("symbol"), "{body}");

        let req = Request::post("/cancel_order")
            .header("content-type", "application/json")
            .body(Body::from("{\"exchange\": "))
            .unwrap();
        let resp = app(&[binance.clone()]).oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["status"], "error");

        assert!(binance.calls().is_empty());
    }
}
