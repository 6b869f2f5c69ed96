//! Numeric coercion for snapshot values.
//!
//! Snapshot `values` hold a mix of JSON numbers and strings formatted for
//! whatever locale the scanner ran in ("1.234,56", "1,234.56", "12 345").
//! Everything that cannot be read as a finite number becomes 0.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

static COMMA_GROUPED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?\d{1,3}(?:,\d{3})+$").expect("grouping pattern is valid")
});

/// Coerce a JSON value to a finite `f64`, falling back to 0.
pub fn coerce_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_number_str(s),
        _ => 0.0,
    }
}

/// Serde helper for whole-second timestamps written as numbers or strings.
pub fn lenient_timestamp<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(coerce_number(&value).trunc() as i64)
}

/// Parse a locale-ambiguous number string.
pub fn parse_number_str(raw: &str) -> f64 {
    let cleaned: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '\u{a0}' | '\u{202f}' | '\'' | '_'))
        .collect();

    if cleaned.is_empty() || cleaned == "-" {
        return 0.0;
    }

    let normalized = match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) => {
            if comma > dot {
                cleaned.replace('.', "").replace(',', ".")
            } else {
                cleaned.replace(',', "")
            }
        }
        (None, Some(_)) => {
            if COMMA_GROUPED.is_match(&cleaned) {
                cleaned.replace(',', "")
            } else {
                cleaned.replace(',', ".")
            }
        }
        (Some(_), None) => {
            if cleaned.matches('.').count() > 1 {
                cleaned.replace('.', "")
            } else {
                cleaned
            }
        }
        (None, None) => cleaned,
    };

    normalized
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .unwrap_or(0.0)
}
