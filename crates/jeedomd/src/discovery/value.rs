//! Lenient scalar coercion, shared by the whole discovery pipeline.
//!
//! Jeedom payloads are loosely typed: ids arrive as integers or strings,
//! numeric configuration fields as numbers, digit strings, or empty strings.
//! Every call site uses this one policy instead of re-deriving its own:
//! garbage coerces to `None`, never to an error.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Lenient boolean: bools pass through, numbers are true when positive,
/// strings match 1/true/on vs 0/false/off (case-insensitive) or parse as a
/// number compared against zero.
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f > 0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("on") {
                Some(true)
            } else if s.eq_ignore_ascii_case("false") || s.eq_ignore_ascii_case("off") {
                Some(false)
            } else {
                s.parse::<f64>().ok().map(|f| f > 0.0)
            }
        }
        _ => None,
    }
}

/// Lenient float: numbers pass through, non-empty strings parse.
pub fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    }
}

/// Lenient integer: truncates through [`as_f64`], so `"20.0"` parses as 20.
pub fn as_i64(value: &Value) -> Option<i64> {
    as_f64(value).map(|f| f as i64)
}

/// Lenient string: strings pass through, scalars render to text.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Coerce a command-value event into on/off against the entity's configured
/// payload tokens: bool passthrough, numeric > 0, case-insensitive token
/// match, then digit-string comparison.
pub fn coerce_on_off(value: &Value, payload_on: &str, payload_off: &str) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_f64().map(|f| f > 0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.eq_ignore_ascii_case(payload_on) {
                Some(true)
            } else if s.eq_ignore_ascii_case(payload_off) {
                Some(false)
            } else {
                s.parse::<f64>().ok().map(|f| f > 0.0)
            }
        }
        _ => None,
    }
}

/// Inclusive numeric range of a device command, used to rescale between the
/// device's native values and a normalized 0-100 scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

impl Range {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        let min = min.unwrap_or(0.0);
        let max = max.unwrap_or(99.0);
        if max > min {
            Self { min, max }
        } else {
            Self { min: 0.0, max: 99.0 }
        }
    }

    /// Device-native value to 0-100 percent, clamped.
    pub fn to_percent(&self, device_value: f64) -> u8 {
        let pct = (device_value - self.min) / (self.max - self.min) * 100.0;
        pct.round().clamp(0.0, 100.0) as u8
    }

    /// 0-100 percent to the nearest device-native value.
    pub fn from_percent(&self, percent: u8) -> f64 {
        let pct = f64::from(percent.min(100));
        (self.min + pct / 100.0 * (self.max - self.min)).round()
    }
}

// serde helpers for the lenient model fields below.

pub(crate) fn de_opt_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_i64))
}

pub(crate) fn de_opt_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_f64))
}

pub(crate) fn de_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_string).unwrap_or_default())
}

pub(crate) fn de_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_string))
}

pub(crate) fn de_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.as_ref().and_then(as_bool).unwrap_or(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn bool_coercion() {
        assert_eq!(as_bool(&json!(true)), Some(true));
        assert_eq!(as_bool(&json!(0)), Some(false));
        assert_eq!(as_bool(&json!(2)), Some(true));
        assert_eq!(as_bool(&json!("1")), Some(true));
        assert_eq!(as_bool(&json!("OFF")), Some(false));
        assert_eq!(as_bool(&json!("junk")), None);
        assert_eq!(as_bool(&json!(null)), None);
    }

    #[test]
    fn float_coercion() {
        assert_eq!(as_f64(&json!(21.5)), Some(21.5));
        assert_eq!(as_f64(&json!(" 42 ")), Some(42.0));
        assert_eq!(as_f64(&json!("")), None);
        assert_eq!(as_f64(&json!(true)), None);
    }

    #[test]
    fn int_truncates_through_float() {
        assert_eq!(as_i64(&json!("20.0")), Some(20));
        assert_eq!(as_i64(&json!(99.7)), Some(99));
    }

    #[test]
    fn on_off_event_coercion() {
        assert_eq!(coerce_on_off(&json!(true), "1", "0"), Some(true));
        assert_eq!(coerce_on_off(&json!(3), "1", "0"), Some(true));
        assert_eq!(coerce_on_off(&json!("ON"), "on", "off"), Some(true));
        assert_eq!(coerce_on_off(&json!("42"), "on", "off"), Some(true));
        assert_eq!(coerce_on_off(&json!("0"), "on", "off"), Some(false));
        assert_eq!(coerce_on_off(&json!("weird"), "on", "off"), None);
    }

    #[test]
    fn percent_round_trip_within_tolerance() {
        let range = Range::new(Some(10.0), Some(90.0));
        let device = range.from_percent(50);
        let back = range.to_percent(device);
        assert!((i16::from(back) - 50).abs() <= 1, "got {back}");
    }

    #[test]
    fn degenerate_range_falls_back() {
        let range = Range::new(Some(5.0), Some(5.0));
        assert_eq!(range.min, 0.0);
        assert_eq!(range.max, 99.0);
    }

    #[test]
    fn percent_clamps() {
        let range = Range::new(Some(0.0), Some(99.0));
        assert_eq!(range.to_percent(150.0), 100);
        assert_eq!(range.from_percent(100), 99.0);
    }
}
