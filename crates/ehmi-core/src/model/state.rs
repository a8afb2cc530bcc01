// ── Remote item state ──
//
// The projection of an `ItemState` the binding engine works with, plus
// the value comparisons the dashboard rules are written in terms of.

use serde_json::Value;

use crate::model::oid::Oid;

/// Largest integer an IEEE double represents exactly.
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

/// Snapshot of one remote item, as delivered by a state notification.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteState {
    pub oid: Oid,
    pub status: i64,
    pub value: Value,
    /// Outstanding action count (`0` for classes without actions).
    pub act: u64,
}

impl RemoteState {
    pub fn new(oid: impl Into<Oid>, status: i64, value: Value, act: u64) -> Self {
        Self {
            oid: oid.into(),
            status,
            value,
            act,
        }
    }

    /// `value` is exactly the number 1 (strict equality).
    #[allow(clippy::float_cmp)]
    pub fn value_is_one(&self) -> bool {
        self.value.as_f64() == Some(1.0)
    }

    /// `value` loosely equals 1: the number 1, a string that reads as 1,
    /// or `true`.
    #[allow(clippy::float_cmp)]
    pub fn value_loosely_one(&self) -> bool {
        match &self.value {
            Value::Number(n) => n.as_f64() == Some(1.0),
            Value::Bool(b) => *b,
            Value::String(s) => {
                let s = s.trim();
                !s.is_empty() && s.parse::<f64>().is_ok_and(|n| n == 1.0)
            }
            Value::Null | Value::Array(_) | Value::Object(_) => false,
        }
    }

    /// The text a value field shows for this state.
    pub fn value_text(&self) -> String {
        display_value(&self.value)
    }

    pub fn is_acting(&self) -> bool {
        self.act > 0
    }
}

/// Render a JSON value the way a text field assignment would: `null`
/// becomes empty, integral numbers lose their fraction, strings are
/// shown verbatim.
pub fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => {
            if n.is_i64() || n.is_u64() {
                n.to_string()
            } else {
                n.as_f64().map_or_else(|| n.to_string(), format_float)
            }
        }
        Value::Array(_) | Value::Object(_) => value.to_string(),
    }
}

#[allow(clippy::cast_possible_truncation, clippy::as_conversions, clippy::float_cmp)]
fn format_float(f: f64) -> String {
    let abs = f.abs();
    if abs != 0.0 && !(1e-6..1e21).contains(&abs) {
        // exponent form, positive exponents signed: 1e+21, 1.5e-7
        let text = format!("{f:e}");
        return match text.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => format!("{mantissa}e+{exp}"),
            _ => text,
        };
    }
    if f.fract() == 0.0 && abs <= MAX_SAFE_INTEGER {
        // -0 prints as 0
        (f as i64).to_string()
    } else {
        f.to_string()
    }
}
