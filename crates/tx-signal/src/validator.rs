//! Signal validation: raw key/value payload → [`OrderIntent`].
//!
//! Signals arrive as flat JSON objects from untrusted senders (TradingView
//! alerts, mail rules). Recognized keys:
//!
//! | Key          | Required        | Accepted values                         |
//! |--------------|-----------------|-----------------------------------------|
//! | `PIN`        | if configured   | must equal the configured secret        |
//! | `EXCHANGE`   | yes             | non-empty, case-insensitive             |
//! | `SYMBOL`     | yes             | non-empty, passed through trimmed       |
//! | `SIDE`       | yes             | exactly `buy` / `sell`, any case        |
//! | `ORDER_TYPE` | yes             | exactly `market` / `limit`, any case    |
//! | `QUANTITY`   | yes             | finite number > 0 (string or number)    |
//! | `PRICE`      | for `limit`     | finite number > 0 (string or number)    |
//!
//! Checks run in a fixed order and stop at the first failure: PIN, presence
//! of every required key, SIDE, ORDER_TYPE, QUANTITY, PRICE. A `null` value
//! counts as absent. Arrays and objects are [`ValidationError::InvalidField`].

use std::borrow::Cow;

use serde_json::{Map, Value};
use tx_core::error::ValidationError;
use tx_core::numeric::parse_f64;
use tx_core::{OrderType, Side};

/// Required keys, in the order they are checked.
pub const REQUIRED_FIELDS: [&str; 5] = ["EXCHANGE", "SYMBOL", "SIDE", "ORDER_TYPE", "QUANTITY"];

/// A validated order request.
///
/// Only [`SignalValidator::validate`] constructs one, so holding an
/// `OrderIntent` means every field passed validation.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    exchange: String,
    symbol: String,
    side: Side,
    order_type: OrderType,
    quantity: f64,
    price: Option<f64>,
}

impl OrderIntent {
    /// Lower-cased exchange name.
    pub fn exchange(&self) -> &str {
        &self.exchange
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Limit price. Always `Some` for limit orders, always `None` for market.
    pub fn price(&self) -> Option<f64> {
        self.price
    }
}

impl std::fmt::Display for OrderIntent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {} {} qty={}",
            self.exchange, self.symbol, self.order_type, self.side, self.quantity
        )?;
        if let Some(price) = self.price {
            write!(f, " price={price}")?;
        }
        Ok(())
    }
}

/// Stateless validator holding the optional shared PIN.
#[derive(Clone, Default)]
pub struct SignalValidator {
    pin: Option<String>,
}

impl SignalValidator {
    /// `pin` of `None` or `""` disables the PIN check.
    pub fn new(pin: Option<String>) -> Self {
        Self {
            pin: pin.filter(|p| !p.is_empty()),
        }
    }

    pub fn requires_pin(&self) -> bool {
        self.pin.is_some()
    }

    /// Compare the payload's `PIN` against the configured secret.
    ///
    /// Numeric PINs are compared by their text form (`1234` == `"1234"`).
    pub fn check_pin(&self, raw: &Map<String, Value>) -> Result<(), ValidationError> {
        let Some(expected) = &self.pin else {
            return Ok(());
        };
        match raw.get("PIN").and_then(scalar_text) {
            Some(given) if given == expected.as_str() => Ok(()),
            _ => Err(ValidationError::PinMismatch),
        }
    }

    /// Validate a raw payload into an [`OrderIntent`].
    pub fn validate(&self, raw: &Map<String, Value>) -> Result<OrderIntent, ValidationError> {
        self.check_pin(raw)?;

        let mut values: [Cow<'_, str>; 5] = Default::default();
        for (slot, key) in values.iter_mut().zip(REQUIRED_FIELDS) {
            *slot = required(raw, key)?;
        }
        let [exchange, symbol, side, order_type, quantity] = values;

        let exchange = exchange.trim().to_lowercase();
        if exchange.is_empty() {
            return Err(ValidationError::InvalidField("EXCHANGE"));
        }
        let symbol = symbol.trim().to_string();
        if symbol.is_empty() {
            return Err(ValidationError::InvalidField("SYMBOL"));
        }

        let side = Side::parse(&side).ok_or_else(|| ValidationError::InvalidSide(side.to_string()))?;
        let order_type = OrderType::parse(&order_type)
            .ok_or_else(|| ValidationError::UnsupportedOrderType(order_type.to_string()))?;
        let quantity = positive(&quantity)
            .ok_or_else(|| ValidationError::InvalidQuantity(quantity.to_string()))?;

        let price = match order_type {
            OrderType::Market => None,
            OrderType::Limit => {
                let text = optional(raw, "PRICE")?.ok_or(ValidationError::MissingPrice)?;
                Some(positive(&text).ok_or_else(|| ValidationError::InvalidPrice(text.to_string()))?)
            }
        };

        Ok(OrderIntent {
            exchange,
            symbol,
            side,
            order_type,
            quantity,
            price,
        })
    }
}

impl std::fmt::Debug for SignalValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignalValidator")
            .field("requires_pin", &self.requires_pin())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Field access
// ---------------------------------------------------------------------------

/// Text form of a string or number value.
fn scalar_text(v: &Value) -> Option<Cow<'_, str>> {
    match v {
        Value::String(s) => Some(Cow::Borrowed(s)),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        _ => None,
    }
}

fn optional<'a>(raw: &'a Map<String, Value>, key: &'static str) -> Result<Option<Cow<'a, str>>, ValidationError> {
    match raw.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => scalar_text(v).map(Some).ok_or(ValidationError::InvalidField(key)),
    }
}

fn required<'a>(raw: &'a Map<String, Value>, key: &'static str) -> Result<Cow<'a, str>, ValidationError> {
    optional(raw, key)?.ok_or(ValidationError::MissingField(key))
}

fn positive(text: &str) -> Option<f64> {
    parse_f64(text).filter(|x| tx_core::numeric::is_positive(*x))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(map) => map,
            _ => unreachable!("test payloads are objects"),
        }
    }

    fn market_buy() -> Value {
        json!({
            "EXCHANGE": "binance", "SYMBOL": "BTC/USDT", "SIDE": "buy",
            "ORDER_TYPE": "market", "QUANTITY": "0.01"
        })
    }

    #[test]
    fn market_order_ignores_price() {
        let mut raw = payload(market_buy());
        raw.insert("PRICE".into(), json!("not even a number"));
        let intent = SignalValidator::default().validate(&raw).unwrap();
        assert_eq!(intent.exchange(), "binance");
        assert_eq!(intent.symbol(), "BTC/USDT");
        assert_eq!(intent.side(), Side::Buy);
        assert_eq!(intent.order_type(), OrderType::Market);
        assert_eq!(intent.quantity(), 0.01);
        assert_eq!(intent.price(), None);
    }

    #[test]
    fn limit_order_with_numeric_values() {
        let raw = payload(json!({
            "EXCHANGE": "BYBIT", "SYMBOL": "ETH/USDT", "SIDE": "SELL",
            "ORDER_TYPE": "Limit", "QUANTITY": 1, "PRICE": 3000
        }));
        let intent = SignalValidator::default().validate(&raw).unwrap();
        assert_eq!(intent.exchange(), "bybit");
        assert_eq!(intent.side(), Side::Sell);
        assert_eq!(intent.order_type(), OrderType::Limit);
        assert_eq!(intent.quantity(), 1.0);
        assert_eq!(intent.price(), Some(3000.0));
        assert_eq!(intent.to_string(), "bybit ETH/USDT limit sell qty=1 price=3000");
    }

    #[test]
    fn every_required_field_is_reported() {
        let validator = SignalValidator::default();
        for field in REQUIRED_FIELDS {
            let mut raw = payload(market_buy());
            raw.remove(field);
            assert_eq!(validator.validate(&raw), Err(ValidationError::MissingField(field)));

            let mut raw = payload(market_buy());
            raw.insert(field.into(), Value::Null);
            assert_eq!(validator.validate(&raw), Err(ValidationError::MissingField(field)));
        }
    }

    #[test]
    fn missing_fields_reported_in_order() {
        let raw = payload(json!({ "QUANTITY": "1", "SIDE": "buy" }));
        assert_eq!(
            SignalValidator::default().validate(&raw),
            Err(ValidationError::MissingField("EXCHANGE"))
        );
    }

    #[test]
    fn side_must_be_buy_or_sell() {
        for bad in ["long", "", "b", "buy ", " sell"] {
            let mut raw = payload(market_buy());
            raw.insert("SIDE".into(), json!(bad));
            assert_eq!(
                SignalValidator::default().validate(&raw),
                Err(ValidationError::InvalidSide(bad.into()))
            );
        }
    }

    #[test]
    fn order_type_checked_before_quantity() {
        let mut raw = payload(market_buy());
        raw.insert("ORDER_TYPE".into(), json!("stop"));
        raw.insert("QUANTITY".into(), json!("abc"));
        assert_eq!(
            SignalValidator::default().validate(&raw),
            Err(ValidationError::UnsupportedOrderType("stop".into()))
        );
    }

    #[test]
    fn quantity_must_be_positive_and_finite() {
        for bad in [json!("abc"), json!("0"), json!(-1), json!("NaN"), json!("inf"), json!("")] {
            let mut raw = payload(market_buy());
            raw.insert("QUANTITY".into(), bad);
            assert!(matches!(
                SignalValidator::default().validate(&raw),
                Err(ValidationError::InvalidQuantity(_))
            ));
        }
    }

    #[test]
    fn limit_price_rules() {
        let mut raw = payload(market_buy());
        raw.insert("ORDER_TYPE".into(), json!("limit"));
        assert_eq!(SignalValidator::default().validate(&raw), Err(ValidationError::MissingPrice));

        raw.insert("PRICE".into(), json!("abc"));
        assert_eq!(
            SignalValidator::default().validate(&raw),
            Err(ValidationError::InvalidPrice("abc".into()))
        );

        raw.insert("PRICE".into(), json!(0));
        assert_eq!(
            SignalValidator::default().validate(&raw),
            Err(ValidationError::InvalidPrice("0".into()))
        );
    }

    #[test]
    fn structured_values_rejected() {
        let mut raw = payload(market_buy());
        raw.insert("SYMBOL".into(), json!(["BTC/USDT"]));
        assert_eq!(
            SignalValidator::default().validate(&raw),
            Err(ValidationError::InvalidField("SYMBOL"))
        );

        let mut raw = payload(market_buy());
        raw.insert("EXCHANGE".into(), json!("  "));
        assert_eq!(
            SignalValidator::default().validate(&raw),
            Err(ValidationError::InvalidField("EXCHANGE"))
        );
    }

    #[test]
    fn pin_checked_before_anything_else() {
        let validator = SignalValidator::new(Some("4821".into()));
        assert!(validator.requires_pin());

        // Wrong, missing, and structured PINs all fail the same way, even
        // when the rest of the payload is garbage.
        for pin in [Some(json!("0000")), None, Some(json!({ "pin": "4821" }))] {
            for body in [market_buy(), json!({}), json!({ "SIDE": "sideways" })] {
                let mut raw = payload(body);
                if let Some(ref pin) = pin {
                    raw.insert("PIN".into(), pin.clone());
                }
                assert_eq!(validator.validate(&raw), Err(ValidationError::PinMismatch));
            }
        }

        let mut raw = payload(market_buy());
        raw.insert("PIN".into(), json!(4821));
        assert!(validator.validate(&raw).is_ok());
    }

    #[test]
    fn empty_pin_disables_check() {
        let validator = SignalValidator::new(Some(String::new()));
        assert!(!validator.requires_pin());
        assert!(validator.validate(&payload(market_buy())).is_ok());
        assert_eq!(format!("{validator:?}"), "SignalValidator { requires_pin: false }");
    }
}
