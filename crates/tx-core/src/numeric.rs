//! Lenient numeric parsing shared by signal validation and exchange
//! response normalization.
//!
//! Exchanges and signal senders alike encode numbers as either JSON strings
//! (`"30000.5"`) or native numbers (`30000.5`).

use serde_json::Value;

/// Parse a string as `f64`, ignoring surrounding whitespace.
///
/// The whole string must be consumed; `"1.5abc"` is rejected.
#[inline]
pub fn parse_f64(s: &str) -> Option<f64> {
    fast_float2::parse(s.trim()).ok()
}

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        parse_f64(s)
    } else {
        v.as_f64()
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// Like [`parse_f64_field`], but treats an empty string or `0` as absent.
///
/// Exchanges report "no liquidation price" or "no leverage" as `"0"` or `""`.
#[inline]
pub fn parse_nonzero_field(v: &Value, key: &str) -> Option<f64> {
    parse_f64_field(v, key).filter(|x| x.is_finite() && *x != 0.0)
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.trim().parse().ok()
    } else {
        v.as_u64()
    }
}

/// Render a JSON scalar as an id string (`12345` and `"12345"` both give `"12345"`).
#[inline]
pub fn id_string(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Returns `true` if `x` is finite and strictly positive.
#[inline]
pub fn is_positive(x: f64) -> bool {
    x.is_finite() && x > 0.0
}
