//! Webhook and control API over real sockets, sharing one registry.

use std::sync::Arc;

use axum::Router;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tx_core::{PositionSide, Side};
use tx_exchange::mock::{MockCall, MockExchange, position};
use tx_exchange::{Exchange, ExchangeRegistry};
use tx_intake::{control, webhook};
use tx_signal::{SignalProcessor, SignalValidator, TradeDesk};

async fn spawn(app: Router) -> String {
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

#[tokio::test]
async fn webhook_order_then_close_via_control() {
    let binance = Arc::new(
        MockExchange::new("binance")
            .with_positions(vec![position("binance", "ETH/USDT", PositionSide::Long, 4.0)])
            .with_usdt(10_000.0),
    );
    let registry = Arc::new(ExchangeRegistry::from_exchanges([
        binance.clone() as Arc<dyn Exchange>
    ]));

    let processor = SignalProcessor::new(SignalValidator::new(Some("4821".into())), registry.clone());
    let hook = spawn(webhook::router(processor)).await;
    let ctl = spawn(control::router(TradeDesk::new(registry))).await;
    let http = reqwest::Client::new();

    let resp = http
        .post(format!("{hook}/webhook"))
        .json(&json!({
            "EXCHANGE": "binance", "SYMBOL": "ETH/USDT", "SIDE": "BUY",
            "ORDER_TYPE": "limit", "QUANTITY": 2, "PRICE": "2500.5", "PIN": 4821
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.json::<Value>().await.unwrap(), json!({ "status": "ok" }));

    let resp = http
        .post(format!("{ctl}/close_position"))
        .json(&json!({ "exchange": "binance", "symbol": "ETH/USDT" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["status"], "success");
    assert_eq!(body["order"]["side"], json!(Side::Sell));

    assert_eq!(
        binance.orders_placed(),
        vec![
            MockCall::LimitOrder { symbol: "ETH/USDT".into(), side: Side::Buy, quantity: 2.0, price: 2500.5 },
            MockCall::MarketOrder { symbol: "ETH/USDT".into(), side: Side::Sell, quantity: 4.0 },
        ]
    );

    let summary: Value = http
        .get(format!("{ctl}/summary_stats"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(summary["summary"]["portfolio_value_usdt"], 10_000.0);
    assert_eq!(summary["summary"]["exchanges"]["binance"]["open_positions"], 1);
}

#[tokio::test]
async fn webhook_rejects_wrong_pin_over_http() {
    let binance = Arc::new(MockExchange::new("binance"));
    let registry = Arc::new(ExchangeRegistry::from_exchanges([
        binance.clone() as Arc<dyn Exchange>
    ]));
    let processor = SignalProcessor::new(SignalValidator::new(Some("4821".into())), registry);
    let hook = spawn(webhook::router(processor)).await;

    let resp = reqwest::Client::new()
        .post(format!("{hook}/webhook"))
        .body(r#"{"EXCHANGE":"binance","PIN":"1111"}"#)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);
    assert!(binance.calls().is_empty());
}
