//! OHLC record formatting.
//!
//! Upstream price buckets carry `price_usd_token_{open,max,min,close}`,
//! `timestamp` and `date_time`. Each price is independently optional and is
//! rounded to 6 significant figures before it reaches the sink.

use super::provider::{DataError, RawRecord};
use super::sink::{render_value, SinkRecord};
use serde_json::Value;

/// Significant figures kept for every price.
pub const PRICE_SIG_FIGS: u32 = 6;

/// Column order of OHLC sink files.
pub const OHLC_HEADER: [&str; 6] = [
    "price_open",
    "price_high",
    "price_low",
    "price_close",
    "timestamp",
    "date",
];

/// One formatted OHLC bucket, ready for the sink.
#[derive(Debug, Clone, PartialEq)]
pub struct OhlcRecord {
    pub price_open: Option<f64>,
    pub price_high: Option<f64>,
    pub price_low: Option<f64>,
    pub price_close: Option<f64>,
    pub timestamp: String,
    pub date: String,
}

impl SinkRecord for OhlcRecord {
    fn header(&self) -> Vec<String> {
        OHLC_HEADER.iter().map(|h| h.to_string()).collect()
    }

    fn values(&self) -> Vec<String> {
        let price = |p: Option<f64>| p.map(|v| v.to_string()).unwrap_or_default();
        vec![
            price(self.price_open),
            price(self.price_high),
            price(self.price_low),
            price(self.price_close),
            self.timestamp.clone(),
            self.date.clone(),
        ]
    }
}

/// Round `x` to `sig_figs` significant figures.
///
/// Magnitude-aware: 0.000123456 keeps all six digits, 123456789 becomes
/// 123457000. Zero and non-finite values are returned unchanged.
pub fn round_significant(x: f64, sig_figs: u32) -> f64 {
    if x == 0.0 || !x.is_finite() || sig_figs == 0 {
        return x;
    }
    // Scientific formatting rounds the exact binary value to the requested
    // number of digits; parsing back yields the nearest double.
    let precision = (sig_figs - 1) as usize;
    format!("{x:.precision$e}").parse().unwrap_or(x)
}

/// Format raw upstream buckets into sink records.
pub fn format_records(raw: &[RawRecord]) -> Result<Vec<OhlcRecord>, DataError> {
    raw.iter().map(format_record).collect()
}

fn format_record(raw: &RawRecord) -> Result<OhlcRecord, DataError> {
    let price = |key: &str| {
        raw.get(key)
            .and_then(numeric)
            .map(|v| round_significant(v, PRICE_SIG_FIGS))
    };
    let required = |key: &str| {
        raw.get(key)
            .map(render_value)
            .ok_or_else(|| DataError::Upstream(format!("price bucket missing `{key}`")))
    };

    Ok(OhlcRecord {
        price_open: price("price_usd_token_open"),
        price_high: price("price_usd_token_max"),
        price_low: price("price_usd_token_min"),
        price_close: price("price_usd_token_close"),
        timestamp: required("timestamp")?,
        date: required("date_time")?,
    })
}

/// Numbers, and strings that parse as numbers. Null counts as absent.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawRecord {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn small_values_keep_significant_digits() {
        assert_eq!(round_significant(0.000123456, 6), 0.000123456);
        assert_eq!(round_significant(0.0001234567, 6), 0.000123457);
        assert_eq!(round_significant(0.000123456, 6).to_string(), "0.000123456");
    }

    #[test]
    fn large_values_round_to_magnitude() {
        assert_eq!(round_significant(123456789.0, 6), 123457000.0);
        assert_eq!(round_significant(123456789.0, 6).to_string(), "123457000");
    }

    #[test]
    fn negative_and_degenerate_values() {
        assert_eq!(round_significant(-1.23456789, 6), -1.23457);
        assert_eq!(round_significant(0.0, 6), 0.0);
        assert!(round_significant(f64::NAN, 6).is_nan());
        assert_eq!(round_significant(f64::INFINITY, 6), f64::INFINITY);
    }

    #[test]
    fn rounding_is_idempotent_on_samples() {
        for x in [1.0e-12, 3.14159265, 2718.281828, 9.999995, 1.0e15 / 7.0] {
            let once = round_significant(x, 6);
            assert_eq!(round_significant(once, 6), once, "x = {x}");
        }
    }

    #[test]
    fn formats_full_bucket() {
        let records = format_records(&[raw(json!({
            "timestamp": 1700000000,
            "date_time": "2023-11-14 22:13:20",
            "price_usd_token_open": 1.23456789,
            "price_usd_token_max": 2.0,
            "price_usd_token_min": "0.5",
            "price_usd_token_close": 1.5
        }))])
        .unwrap();

        let r = &records[0];
        assert_eq!(r.price_open, Some(1.23457));
        assert_eq!(r.price_low, Some(0.5));
        assert_eq!(
            r.values(),
            vec!["1.23457", "2", "0.5", "1.5", "1700000000", "2023-11-14 22:13:20"]
        );
        assert_eq!(r.header(), OHLC_HEADER.to_vec());
    }

    #[test]
    fn missing_prices_render_empty() {
        let records = format_records(&[raw(json!({
            "timestamp": 1,
            "date_time": "1970-01-01 00:00:01",
            "price_usd_token_close": null
        }))])
        .unwrap();

        let r = &records[0];
        assert_eq!(r.price_open, None);
        assert_eq!(r.price_close, None);
        assert_eq!(r.values(), vec!["", "", "", "", "1", "1970-01-01 00:00:01"]);
    }

    #[test]
    fn missing_timestamp_is_upstream_error() {
        let err = format_records(&[raw(json!({"date_time": "x"}))]).unwrap_err();
        assert!(matches!(err, DataError::Upstream(msg) if msg.contains("timestamp")));
    }
}
