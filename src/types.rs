use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A currency amount that may be missing.
///
/// Missing values never compare: every ordering check with a missing side is
/// false. Arithmetic with a missing side yields a missing result. Sums over a
/// column skip missing values.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Option<f64>);

impl Amount {
    pub const MISSING: Amount = Amount(None);

    /// NaN is folded into "missing" so a present amount is always comparable
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self(None)
        } else {
            Self(Some(value))
        }
    }

    pub fn value(self) -> Option<f64> {
        self.0
    }

    pub fn is_missing(self) -> bool {
        self.0.is_none()
    }

    pub fn lt(self, other: Amount) -> bool {
        match (self.0, other.0) {
            (Some(a), Some(b)) => a < b,
            _ => false,
        }
    }

    pub fn gt(self, other: Amount) -> bool {
        other.lt(self)
    }

    pub fn equals(self, value: f64) -> bool {
        self.0.map_or(false, |v| v == value)
    }

    pub fn minus(self, other: Amount) -> Amount {
        match (self.0, other.0) {
            (Some(a), Some(b)) => Amount::new(a - b),
            _ => Amount::MISSING,
        }
    }

    /// `self / denominator`; undefined when either side is missing or the
    /// denominator is zero
    pub fn ratio(self, denominator: Amount) -> Option<f64> {
        match (self.0, denominator.0) {
            (Some(_), Some(d)) if d == 0.0 => None,
            (Some(n), Some(d)) => Some(n / d),
            _ => None,
        }
    }

    /// Sum of the present values; an all-missing column sums to zero
    pub fn sum_present<I>(amounts: I) -> f64
    where
        I: IntoIterator<Item = Amount>,
    {
        amounts.into_iter().filter_map(Amount::value).sum()
    }
}

impl From<Option<f64>> for Amount {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Amount::MISSING, Amount::new)
    }
}

/// `later < earlier`, false whenever either date is missing
pub fn date_precedes(later: Option<NaiveDate>, earlier: Option<NaiveDate>) -> bool {
    match (later, earlier) {
        (Some(l), Some(e)) => l < e,
        _ => false,
    }
}

/// Ratio of two sums. Undefined when the denominator is zero.
pub fn ratio_of_sums(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        None
    } else {
        Some(numerator / denominator)
    }
}

/// One claim line after type coercion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClaimLine {
    pub claim_id: String,
    pub line_num: Option<String>,
    pub submitted: Amount,
    pub allowed: Amount,
    pub paid_to_plan: Amount,
    pub paid_to_provider: Amount,
    pub first_expense_date: Option<NaiveDate>,
    pub processing_date: Option<NaiveDate>,
    pub procedure_code: Option<String>,
    pub specialty_code: Option<String>,
}

impl ClaimLine {
    /// Service year is taken from the first-expense date
    pub fn service_year(&self) -> Option<i32> {
        use chrono::Datelike;
        self.first_expense_date.map(|d| d.year())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_amount_never_compares() {
        let present = Amount::new(10.0);
        assert!(!Amount::MISSING.lt(present));
        assert!(!present.lt(Amount::MISSING));
        assert!(!Amount::MISSING.gt(present));
        assert!(!Amount::MISSING.equals(0.0));
    }

    #[test]
    fn test_missing_amount_poisons_arithmetic() {
        assert!(Amount::new(5.0).minus(Amount::MISSING).is_missing());
        assert_eq!(Amount::new(5.0).minus(Amount::new(2.0)), Amount::new(3.0));
        assert_eq!(Amount::new(1.0).ratio(Amount::MISSING), None);
    }

    #[test]
    fn test_ratio_with_zero_denominator_is_undefined() {
        assert_eq!(Amount::new(0.0).ratio(Amount::new(0.0)), None);
        assert_eq!(Amount::new(5.0).ratio(Amount::new(0.0)), None);
        assert_eq!(Amount::new(50.0).ratio(Amount::new(100.0)), Some(0.5));
        assert_eq!(ratio_of_sums(1.0, 0.0), None);
    }

    #[test]
    fn test_nan_is_folded_into_missing() {
        assert!(Amount::new(f64::NAN).is_missing());
        assert!(Amount::from(Some(f64::NAN)).is_missing());
    }

    #[test]
    fn test_sum_skips_missing_values() {
        let amounts = vec![Amount::new(1.5), Amount::MISSING, Amount::new(2.5)];
        assert_eq!(Amount::sum_present(amounts), 4.0);
        assert_eq!(Amount::sum_present(vec![Amount::MISSING]), 0.0);
    }

    #[test]
    fn test_date_precedes_ignores_missing() {
        let jan = NaiveDate::from_ymd_opt(2022, 1, 10);
        let feb = NaiveDate::from_ymd_opt(2022, 2, 10);
        assert!(date_precedes(jan, feb));
        assert!(!date_precedes(feb, jan));
        assert!(!date_precedes(None, feb));
        assert!(!date_precedes(jan, None));
    }
}
