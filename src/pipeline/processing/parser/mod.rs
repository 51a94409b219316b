//! Cell-level coercion from raw text into typed values.
//!
//! Nothing here fails: a cell is either a value, blank, or invalid. The quality
//! gate turns blank and invalid cells into missing values and counts the
//! invalid ones.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Outcome of coercing one raw cell
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Coerced<T> {
    Value(T),
    /// Empty (after trimming) or an explicit not-a-number marker
    Blank,
    /// Non-empty text that could not be parsed
    Invalid,
}

impl<T> Coerced<T> {
    pub fn into_option(self) -> Option<T> {
        match self {
            Coerced::Value(v) => Some(v),
            Coerced::Blank | Coerced::Invalid => None,
        }
    }

    pub fn is_invalid(&self) -> bool {
        matches!(self, Coerced::Invalid)
    }
}

const DATE_FORMATS: [&str; 5] = ["%Y-%m-%d", "%Y%m%d", "%d-%b-%Y", "%m/%d/%Y", "%Y/%m/%d"];
const DATE_TIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Parse a currency cell as a float
pub fn coerce_amount(raw: &str) -> Coerced<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return Coerced::Blank;
    }
    match s.parse::<f64>() {
        Ok(v) if v.is_nan() => Coerced::Blank,
        Ok(v) => Coerced::Value(v),
        Err(_) => Coerced::Invalid,
    }
}

/// Parse a date cell; date-times keep only their date part
pub fn coerce_date(raw: &str) -> Coerced<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return Coerced::Blank;
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Coerced::Value(d);
        }
    }
    for fmt in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Coerced::Value(dt.date());
        }
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Coerced::Value(dt.date_naive());
    }
    Coerced::Invalid
}

/// Key columns: blank means missing, anything else is kept verbatim
pub fn non_blank(raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        None
    } else {
        Some(raw.to_string())
    }
}
