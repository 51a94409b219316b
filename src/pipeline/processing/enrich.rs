use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::constants::FULLY_PAID_TOLERANCE;
use crate::observability::metrics;
use crate::pipeline::processing::quality_gate::CleanDataset;
use crate::types::{ratio_of_sums, Amount, ClaimLine};

/// Payment outcome flags for one claim line.
///
/// The three flags are computed independently. `partial_paid` and
/// `fully_paid` are both set when the plan payment is below the allowed
/// amount but within the tolerance of it; that overlap is reported, not
/// resolved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentStatus {
    pub zero_paid: bool,
    pub partial_paid: bool,
    pub fully_paid: bool,
}

impl PaymentStatus {
    pub fn classify(allowed: Amount, paid_to_plan: Amount, tolerance: f64) -> Self {
        let zero_paid = paid_to_plan.equals(0.0);
        let partial_paid = paid_to_plan.gt(Amount::new(0.0)) && paid_to_plan.lt(allowed);
        let fully_paid = match (paid_to_plan.value(), allowed.value()) {
            (Some(paid), Some(allowed)) => (paid - allowed).abs() <= tolerance,
            _ => false,
        };
        Self {
            zero_paid,
            partial_paid,
            fully_paid,
        }
    }

    pub fn flag_count(&self) -> usize {
        [self.zero_paid, self.partial_paid, self.fully_paid]
            .iter()
            .filter(|f| **f)
            .count()
    }

    /// Partial and fully paid at once
    pub fn is_boundary_overlap(&self) -> bool {
        self.partial_paid && self.fully_paid
    }
}

/// Per-line fields derived from the clean record
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    /// Processing date minus first-expense date, in whole days
    pub processing_delay_days: Option<i64>,
    /// Allowed minus paid-to-plan
    pub underpayment: Amount,
    /// Paid-to-plan over allowed; undefined when allowed is zero or missing
    pub realization_rate: Option<f64>,
    pub payment_status: PaymentStatus,
}

impl DerivedMetrics {
    pub fn derive(line: &ClaimLine, tolerance: f64) -> Self {
        let processing_delay_days = match (line.processing_date, line.first_expense_date) {
            (Some(processed), Some(first)) => Some((processed - first).num_days()),
            _ => None,
        };
        Self {
            processing_delay_days,
            underpayment: line.allowed.minus(line.paid_to_plan),
            realization_rate: line.paid_to_plan.ratio(line.allowed),
            payment_status: PaymentStatus::classify(line.allowed, line.paid_to_plan, tolerance),
        }
    }
}

/// A clean claim line with its derived metrics attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedClaimLine {
    pub line: ClaimLine,
    pub date_violation: bool,
    pub metrics: DerivedMetrics,
}

/// Whole-dataset summary over the clean, enriched records
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverallSummary {
    pub total_claims: usize,
    pub total_submitted: f64,
    /// Allowed amount sum, reported as revenue processed
    pub total_allowed: f64,
    pub total_paid: f64,
    /// Sum of per-line underpayment, reported as leakage
    pub total_underpayment: f64,
    /// total_paid / total_allowed
    pub realization_rate: Option<f64>,
    /// total_underpayment / total_allowed
    pub leakage_share: Option<f64>,
    pub zero_paid_pct: Option<f64>,
    pub partial_paid_pct: Option<f64>,
    pub fully_paid_pct: Option<f64>,
    pub payment_status_overlaps: usize,
    /// Underpayment on zero-paid lines
    pub zero_paid_leakage: f64,
    /// Underpayment on partial-paid lines
    pub partial_paid_leakage: f64,
    /// Mean over lines with a known delay
    pub avg_processing_delay_days: Option<f64>,
}

impl OverallSummary {
    pub fn from_records(records: &[EnrichedClaimLine]) -> Self {
        let total_claims = records.len();
        let total_submitted = Amount::sum_present(records.iter().map(|r| r.line.submitted));
        let total_allowed = Amount::sum_present(records.iter().map(|r| r.line.allowed));
        let total_paid = Amount::sum_present(records.iter().map(|r| r.line.paid_to_plan));
        let total_underpayment = Amount::sum_present(records.iter().map(|r| r.metrics.underpayment));

        let pct_where = |pred: fn(&PaymentStatus) -> bool| {
            if total_claims == 0 {
                return None;
            }
            let hits = records.iter().filter(|r| pred(&r.metrics.payment_status)).count();
            Some(100.0 * hits as f64 / total_claims as f64)
        };
        let leakage_where = |pred: fn(&PaymentStatus) -> bool| {
            Amount::sum_present(
                records
                    .iter()
                    .filter(|r| pred(&r.metrics.payment_status))
                    .map(|r| r.metrics.underpayment),
            )
        };

        let delays: Vec<i64> = records
            .iter()
            .filter_map(|r| r.metrics.processing_delay_days)
            .collect();
        let avg_processing_delay_days = if delays.is_empty() {
            None
        } else {
            Some(delays.iter().sum::<i64>() as f64 / delays.len() as f64)
        };

        Self {
            total_claims,
            total_submitted,
            total_allowed,
            total_paid,
            total_underpayment,
            realization_rate: ratio_of_sums(total_paid, total_allowed),
            leakage_share: ratio_of_sums(total_underpayment, total_allowed),
            zero_paid_pct: pct_where(|s| s.zero_paid),
            partial_paid_pct: pct_where(|s| s.partial_paid),
            fully_paid_pct: pct_where(|s| s.fully_paid),
            payment_status_overlaps: records
                .iter()
                .filter(|r| r.metrics.payment_status.is_boundary_overlap())
                .count(),
            zero_paid_leakage: leakage_where(|s| s.zero_paid),
            partial_paid_leakage: leakage_where(|s| s.partial_paid),
            avg_processing_delay_days,
        }
    }
}

/// The enriched dataset handed to the aggregator
#[derive(Debug, Clone)]
pub struct EnrichedDataset {
    pub records: Vec<EnrichedClaimLine>,
    pub summary: OverallSummary,
}

/// Trait for attaching derived metrics to a clean dataset
pub trait Enricher {
    fn enrich(&self, clean: &CleanDataset) -> EnrichedDataset;
}

/// Default enricher using the fixed fully-paid tolerance
pub struct DefaultEnricher {
    /// Absolute currency tolerance for the fully-paid flag
    pub fully_paid_tolerance: f64,
}

impl Default for DefaultEnricher {
    fn default() -> Self {
        Self {
            fully_paid_tolerance: FULLY_PAID_TOLERANCE,
        }
    }
}

impl DefaultEnricher {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Enricher for DefaultEnricher {
    #[instrument(skip_all, fields(records = clean.records.len()))]
    fn enrich(&self, clean: &CleanDataset) -> EnrichedDataset {
        let records: Vec<EnrichedClaimLine> = clean
            .records
            .iter()
            .map(|v| EnrichedClaimLine {
                metrics: DerivedMetrics::derive(&v.line, self.fully_paid_tolerance),
                date_violation: v.date_violation,
                line: v.line.clone(),
            })
            .collect();
        let summary = OverallSummary::from_records(&records);

        let count = |pred: fn(&PaymentStatus) -> bool| {
            records.iter().filter(|r| pred(&r.metrics.payment_status)).count()
        };
        metrics::enrich::payment_status(
            count(|s| s.zero_paid),
            count(|s| s.partial_paid),
            count(|s| s.fully_paid),
            summary.payment_status_overlaps,
        );
        info!(
            total_claims = summary.total_claims,
            overlaps = summary.payment_status_overlaps,
            "Metrics calculated"
        );

        EnrichedDataset { records, summary }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::quality_gate::{ValidatedClaimLine, ValidationReport};
    use chrono::NaiveDate;

    fn claim(allowed: f64, paid: f64) -> ClaimLine {
        ClaimLine {
            claim_id: "c".to_string(),
            line_num: Some("1".to_string()),
            submitted: Amount::new(allowed.max(paid) + 10.0),
            allowed: Amount::new(allowed),
            paid_to_plan: Amount::new(paid),
            paid_to_provider: Amount::new(paid),
            first_expense_date: NaiveDate::from_ymd_opt(2022, 1, 1),
            processing_date: NaiveDate::from_ymd_opt(2022, 1, 11),
            procedure_code: Some("99213".to_string()),
            specialty_code: Some("01".to_string()),
        }
    }

    fn clean_of(lines: Vec<ClaimLine>) -> CleanDataset {
        let n = lines.len();
        CleanDataset {
            records: lines
                .into_iter()
                .map(|line| ValidatedClaimLine {
                    line,
                    financial_violation: false,
                    date_violation: false,
                })
                .collect(),
            report: ValidationReport {
                analysis_year: 2022,
                records_loaded: n,
                duplicate_count: 0,
                coercion: Default::default(),
                financial_violations: 0,
                date_violations: 0,
                records_in_analysis_year: n,
                records_clean: n,
            },
        }
    }

    #[test]
    fn test_three_line_scenario() {
        let clean = clean_of(vec![claim(100.0, 100.0), claim(100.0, 0.0), claim(100.0, 50.0)]);
        let enriched = DefaultEnricher::new().enrich(&clean);
        let s = &enriched.summary;

        assert_eq!(s.total_claims, 3);
        assert!((s.zero_paid_pct.unwrap() - 100.0 / 3.0).abs() < 1e-9);
        assert!((s.partial_paid_pct.unwrap() - 100.0 / 3.0).abs() < 1e-9);
        assert_eq!(s.realization_rate, Some(0.5));
        assert_eq!(s.total_underpayment, 150.0);
        assert_eq!(s.zero_paid_leakage, 100.0);
        assert_eq!(s.partial_paid_leakage, 50.0);
        assert_eq!(s.avg_processing_delay_days, Some(10.0));
    }

    #[test]
    fn test_realization_is_ratio_of_sums_not_mean_of_ratios() {
        // One large fully paid line, one small zero paid line
        let clean = clean_of(vec![claim(1000.0, 1000.0), claim(10.0, 0.0)]);
        let enriched = DefaultEnricher::new().enrich(&clean);

        let ratio_of_sums = enriched.summary.realization_rate.unwrap();
        let per_line: Vec<f64> = enriched
            .records
            .iter()
            .filter_map(|r| r.metrics.realization_rate)
            .collect();
        let mean_of_ratios = per_line.iter().sum::<f64>() / per_line.len() as f64;

        assert!((ratio_of_sums - 1000.0 / 1010.0).abs() < 1e-12);
        assert!((mean_of_ratios - 0.5).abs() < 1e-12);
        assert!((ratio_of_sums - mean_of_ratios).abs() > 0.1);
    }

    #[test]
    fn test_zero_allowed_makes_realization_undefined() {
        let clean = clean_of(vec![claim(0.0, 0.0)]);
        let enriched = DefaultEnricher::new().enrich(&clean);
        assert_eq!(enriched.records[0].metrics.realization_rate, None);
        assert_eq!(enriched.summary.realization_rate, None);
        assert_eq!(enriched.summary.leakage_share, None);
    }

    #[test]
    fn test_classification_boundary_overlap() {
        let status = PaymentStatus::classify(Amount::new(100.0), Amount::new(99.5), 1.0);
        assert!(status.partial_paid && status.fully_paid);
        assert!(status.is_boundary_overlap());

        let exact = PaymentStatus::classify(Amount::new(100.0), Amount::new(100.0), 1.0);
        assert_eq!(exact.flag_count(), 1);
        assert!(exact.fully_paid);

        let zero = PaymentStatus::classify(Amount::new(100.0), Amount::new(0.0), 1.0);
        assert_eq!(zero.flag_count(), 1);
        assert!(zero.zero_paid);
    }

    #[test]
    fn test_zero_allowed_zero_paid_is_zero_and_fully_paid() {
        // |0 - 0| <= 1 also sets fully_paid: a second overlap the flags allow
        let status = PaymentStatus::classify(Amount::new(0.0), Amount::new(0.0), 1.0);
        assert!(status.zero_paid && status.fully_paid);
        assert!(!status.is_boundary_overlap());
    }

    #[test]
    fn test_missing_amounts_yield_no_flags() {
        let status = PaymentStatus::classify(Amount::new(100.0), Amount::MISSING, 1.0);
        assert_eq!(status.flag_count(), 0);
        let mut line = claim(100.0, 50.0);
        line.paid_to_plan = Amount::MISSING;
        let m = DerivedMetrics::derive(&line, 1.0);
        assert!(m.underpayment.is_missing());
        assert_eq!(m.realization_rate, None);
    }

    #[test]
    fn test_missing_date_gives_no_delay() {
        let mut line = claim(100.0, 50.0);
        line.processing_date = None;
        let m = DerivedMetrics::derive(&line, 1.0);
        assert_eq!(m.processing_delay_days, None);
    }
}
