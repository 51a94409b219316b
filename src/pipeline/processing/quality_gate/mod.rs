use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use tracing::{info, instrument, warn};

use crate::constants::{self, REQUIRED_COLUMNS};
use crate::error::{RcmError, Result};
use crate::observability::metrics;
use crate::pipeline::ingestion::RawTable;
use crate::pipeline::processing::parser::{coerce_amount, coerce_date, non_blank, Coerced};
use crate::types::{date_precedes, Amount, ClaimLine};

/// A claim line that has passed through type coercion and the logic checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatedClaimLine {
    pub line: ClaimLine,
    /// submitted < allowed, allowed < paid-to-plan, or paid-to-plan < paid-to-provider
    pub financial_violation: bool,
    /// processing date earlier than first-expense date
    pub date_violation: bool,
}

/// Per-column counts of cells that became missing during coercion
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CoercionReport {
    /// Non-empty cells that failed to parse
    pub invalid: BTreeMap<String, usize>,
    /// Empty cells
    pub blank: BTreeMap<String, usize>,
}

impl CoercionReport {
    fn note<T>(&mut self, column: &str, outcome: &Coerced<T>) {
        let bucket = match outcome {
            Coerced::Value(_) => return,
            Coerced::Blank => &mut self.blank,
            Coerced::Invalid => &mut self.invalid,
        };
        *bucket.entry(column.to_string()).or_insert(0) += 1;
    }

    pub fn total_invalid(&self) -> usize {
        self.invalid.values().sum()
    }
}

/// Counts gathered while validating one input table.
///
/// Rates are kept as unrounded fractions; rounding only happens on display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub analysis_year: i32,
    pub records_loaded: usize,
    pub duplicate_count: usize,
    pub coercion: CoercionReport,
    pub financial_violations: usize,
    pub date_violations: usize,
    pub records_in_analysis_year: usize,
    pub records_clean: usize,
}

impl ValidationReport {
    /// Financial violations as a fraction of all loaded records
    pub fn financial_violation_rate(&self) -> Option<f64> {
        fraction(self.financial_violations, self.records_loaded)
    }

    /// Date violations as a fraction of all loaded records
    pub fn date_violation_rate(&self) -> Option<f64> {
        fraction(self.date_violations, self.records_loaded)
    }

    /// Share of analysis-year records dropped by the financial-logic exclusion
    pub fn excluded_fraction(&self) -> Option<f64> {
        fraction(self.records_clean, self.records_in_analysis_year).map(|kept| 1.0 - kept)
    }
}

fn fraction(part: usize, whole: usize) -> Option<f64> {
    if whole == 0 {
        None
    } else {
        Some(part as f64 / whole as f64)
    }
}

/// The clean dataset: analysis-year records without financial-logic violations
#[derive(Debug, Clone)]
pub struct CleanDataset {
    pub records: Vec<ValidatedClaimLine>,
    pub report: ValidationReport,
}

impl CleanDataset {
    /// Fail when a filtering step left nothing to analyze
    pub fn ensure_non_empty(&self) -> Result<()> {
        let report = &self.report;
        if report.records_in_analysis_year == 0 {
            return Err(RcmError::EmptyDataset {
                stage: "temporal_filter",
                records_loaded: report.records_loaded,
                records_in: report.records_loaded,
            });
        }
        if report.records_clean == 0 {
            return Err(RcmError::EmptyDataset {
                stage: "violation_exclusion",
                records_loaded: report.records_loaded,
                records_in: report.records_in_analysis_year,
            });
        }
        Ok(())
    }
}

/// Trait for implementing the claim-line validation and cleaning rules
pub trait QualityGate {
    /// Validate a raw table and derive the clean dataset
    fn assess(&self, table: &RawTable) -> Result<CleanDataset>;
}

/// Configuration for the quality gate
#[derive(Debug, Clone)]
pub struct QualityGateConfig {
    /// Only records whose first-expense year equals this are retained
    pub analysis_year: i32,
}

impl Default for QualityGateConfig {
    fn default() -> Self {
        Self {
            analysis_year: constants::DEFAULT_ANALYSIS_YEAR,
        }
    }
}

/// Default quality gate implementing the carrier claim-line rules
pub struct DefaultQualityGate {
    pub config: QualityGateConfig,
}

impl DefaultQualityGate {
    pub fn new() -> Self {
        Self {
            config: QualityGateConfig::default(),
        }
    }

    pub fn with_config(config: QualityGateConfig) -> Self {
        Self { config }
    }
}

impl Default for DefaultQualityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl QualityGate for DefaultQualityGate {
    #[instrument(skip_all, fields(analysis_year = self.config.analysis_year))]
    fn assess(&self, table: &RawTable) -> Result<CleanDataset> {
        let columns = table.require_columns(&REQUIRED_COLUMNS)?;
        let records_loaded = table.len();

        // 1. Duplicates are measured, not dropped
        let duplicate_count = count_duplicates(table, columns[0], columns[1]);
        info!("Duplicates found: {}", duplicate_count);
        metrics::quality_gate::duplicates_detected(duplicate_count);

        // 2-3. Numeric and date coercion
        let (lines, coercion) = coerce_rows(table, &columns);
        for (column, count) in &coercion.invalid {
            warn!(column = %column, count, "Unparseable values coerced to missing");
            metrics::quality_gate::coercion_failures(column, *count);
        }

        // 4-5. Logic checks
        let validated: Vec<ValidatedClaimLine> = lines
            .into_iter()
            .map(|line| ValidatedClaimLine {
                financial_violation: has_financial_violation(&line),
                date_violation: has_date_violation(&line),
                line,
            })
            .collect();
        let financial_violations = validated.iter().filter(|v| v.financial_violation).count();
        let date_violations = validated.iter().filter(|v| v.date_violation).count();
        metrics::quality_gate::violations(financial_violations, date_violations);

        // 6. Temporal filter
        let year = self.config.analysis_year;
        let in_year: Vec<ValidatedClaimLine> = validated
            .into_iter()
            .filter(|v| v.line.service_year() == Some(year))
            .collect();
        let records_in_analysis_year = in_year.len();

        // 7. Financial violations are exclusionary, date violations are not
        let records: Vec<ValidatedClaimLine> =
            in_year.into_iter().filter(|v| !v.financial_violation).collect();

        let report = ValidationReport {
            analysis_year: year,
            records_loaded,
            duplicate_count,
            coercion,
            financial_violations,
            date_violations,
            records_in_analysis_year,
            records_clean: records.len(),
        };
        metrics::quality_gate::retained(report.records_in_analysis_year, report.records_clean);

        info!(
            "Financial logic violations: {} ({:.2}%)",
            report.financial_violations,
            100.0 * report.financial_violation_rate().unwrap_or(0.0)
        );
        info!(
            "Date logic violations: {} ({:.2}%)",
            report.date_violations,
            100.0 * report.date_violation_rate().unwrap_or(0.0)
        );
        info!("{} records: {}", year, report.records_in_analysis_year);
        info!(
            "Clean dataset: {} records ({:.2}% excluded)",
            report.records_clean,
            100.0 * report.excluded_fraction().unwrap_or(0.0)
        );

        Ok(CleanDataset { records, report })
    }
}

/// Rows beyond the first sharing the same (claim id, line number) text
pub fn count_duplicates(table: &RawTable, claim_idx: usize, line_idx: usize) -> usize {
    let mut seen = HashSet::with_capacity(table.len());
    table
        .rows()
        .filter(|row| !seen.insert((row[claim_idx].as_str(), row[line_idx].as_str())))
        .count()
}

/// Coerce every row of the table into a typed claim line.
///
/// `columns` follows the order of [`REQUIRED_COLUMNS`].
pub fn coerce_rows(table: &RawTable, columns: &[usize; 10]) -> (Vec<ClaimLine>, CoercionReport) {
    let mut report = CoercionReport::default();
    let mut lines = Vec::with_capacity(table.len());

    for row in table.rows() {
        let mut amount = |slot: usize| {
            let outcome = coerce_amount(&row[columns[slot]]);
            report.note(REQUIRED_COLUMNS[slot], &outcome);
            Amount::from(outcome.into_option())
        };
        let submitted = amount(2);
        let allowed = amount(3);
        let paid_to_plan = amount(4);
        let paid_to_provider = amount(5);

        let mut date = |slot: usize| {
            let outcome = coerce_date(&row[columns[slot]]);
            report.note(REQUIRED_COLUMNS[slot], &outcome);
            outcome.into_option()
        };
        let first_expense_date = date(6);
        let processing_date = date(7);

        lines.push(ClaimLine {
            claim_id: row[columns[0]].clone(),
            line_num: non_blank(&row[columns[1]]),
            submitted,
            allowed,
            paid_to_plan,
            paid_to_provider,
            first_expense_date,
            processing_date,
            procedure_code: non_blank(&row[columns[8]]),
            specialty_code: non_blank(&row[columns[9]]),
        });
    }

    (lines, report)
}

/// Each clause with a missing operand counts as not violated
pub fn has_financial_violation(line: &ClaimLine) -> bool {
    line.submitted.lt(line.allowed)
        || line.allowed.lt(line.paid_to_plan)
        || line.paid_to_plan.lt(line.paid_to_provider)
}

pub fn has_date_violation(line: &ClaimLine) -> bool {
    date_precedes(line.processing_date, line.first_expense_date)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REQUIRED_COLUMNS;

    fn headers() -> Vec<String> {
        REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect()
    }

    fn row(
        claim: &str,
        line: &str,
        amounts: [&str; 4],
        first: &str,
        processed: &str,
        hcpcs: &str,
    ) -> Vec<String> {
        let mut r = vec![claim.to_string(), line.to_string()];
        r.extend(amounts.iter().map(|a| a.to_string()));
        r.push(first.to_string());
        r.push(processed.to_string());
        r.push(hcpcs.to_string());
        r.push("01".to_string());
        r
    }

    fn table(rows: Vec<Vec<String>>) -> RawTable {
        RawTable::new(headers(), rows)
    }

    #[test]
    fn test_submitted_below_allowed_is_excluded() {
        let t = table(vec![
            row("c1", "1", ["80", "100", "50", "40"], "2022-01-03", "2022-01-20", "99213"),
            row("c2", "1", ["150", "100", "50", "40"], "2022-01-03", "2022-01-20", "99213"),
        ]);
        let clean = DefaultQualityGate::new().assess(&t).unwrap();

        assert_eq!(clean.report.financial_violations, 1);
        assert_eq!(clean.records.len(), 1);
        assert_eq!(clean.records[0].line.claim_id, "c2");
    }

    #[test]
    fn test_date_violations_are_kept() {
        let t = table(vec![row(
            "c1",
            "1",
            ["100", "100", "80", "80"],
            "2022-03-10",
            "2022-03-01",
            "99213",
        )]);
        let clean = DefaultQualityGate::new().assess(&t).unwrap();

        assert_eq!(clean.report.date_violations, 1);
        assert_eq!(clean.records.len(), 1);
        assert!(clean.records[0].date_violation);
    }

    #[test]
    fn test_missing_operands_do_not_violate() {
        let t = table(vec![row("c1", "1", ["", "100", "abc", "150"], "2022-05-01", "", "A")]);
        let clean = DefaultQualityGate::new().assess(&t).unwrap();

        assert_eq!(clean.report.financial_violations, 0);
        assert_eq!(clean.report.date_violations, 0);
        assert_eq!(clean.report.coercion.invalid.get(constants::PAID_TO_PLAN_AMT), Some(&1));
        assert_eq!(clean.report.coercion.blank.get(constants::SUBMITTED_AMT), Some(&1));
        assert_eq!(clean.report.coercion.blank.get(constants::WEEKLY_PROCESSING_DT), Some(&1));
    }

    #[test]
    fn test_duplicates_are_counted_not_dropped() {
        let r = row("c1", "1", ["100", "100", "80", "80"], "2022-01-01", "2022-01-08", "A");
        let t = table(vec![r.clone(), r.clone(), r]);
        let clean = DefaultQualityGate::new().assess(&t).unwrap();

        assert_eq!(clean.report.duplicate_count, 2);
        assert_eq!(clean.records.len(), 3);
    }

    #[test]
    fn test_temporal_filter_uses_configured_year() {
        let t = table(vec![
            row("c1", "1", ["100", "100", "80", "80"], "2021-12-31", "2022-01-08", "A"),
            row("c2", "1", ["100", "100", "80", "80"], "2022-01-01", "2022-01-08", "A"),
            row("c3", "1", ["100", "100", "80", "80"], "", "2022-01-08", "A"),
        ]);
        let gate = DefaultQualityGate::with_config(QualityGateConfig { analysis_year: 2021 });
        let clean = gate.assess(&t).unwrap();

        assert_eq!(clean.report.records_in_analysis_year, 1);
        assert_eq!(clean.records[0].line.claim_id, "c1");
    }

    #[test]
    fn test_empty_after_temporal_filter() {
        let t = table(vec![row("c1", "1", ["100", "100", "80", "80"], "2019-01-01", "", "A")]);
        let clean = DefaultQualityGate::new().assess(&t).unwrap();
        let err = clean.ensure_non_empty().unwrap_err();
        assert!(matches!(err, RcmError::EmptyDataset { stage: "temporal_filter", .. }));
    }

    #[test]
    fn test_empty_after_violation_exclusion() {
        let t = table(vec![row("c1", "1", ["10", "100", "80", "80"], "2022-01-01", "", "A")]);
        let clean = DefaultQualityGate::new().assess(&t).unwrap();
        let err = clean.ensure_non_empty().unwrap_err();
        match err {
            RcmError::EmptyDataset { stage, records_in, .. } => {
                assert_eq!(stage, "violation_exclusion");
                assert_eq!(records_in, 1);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_column_is_schema_error() {
        let mut h = headers();
        h.retain(|c| c != constants::PROCEDURE_CODE);
        let t = RawTable::new(h, Vec::new());
        let err = DefaultQualityGate::new().assess(&t).unwrap_err();
        assert!(matches!(err, RcmError::Schema { .. }));
    }

    #[test]
    fn test_rates_stay_unrounded() {
        let t = table(vec![
            row("c1", "1", ["10", "100", "80", "80"], "2022-01-01", "", "A"),
            row("c2", "1", ["100", "100", "80", "80"], "2022-01-01", "", "A"),
            row("c3", "1", ["100", "100", "80", "80"], "2022-01-01", "", "A"),
        ]);
        let clean = DefaultQualityGate::new().assess(&t).unwrap();
        assert_eq!(clean.report.financial_violation_rate(), Some(1.0 / 3.0));
        assert_eq!(clean.report.excluded_fraction(), Some(1.0 - 2.0 / 3.0));
    }
}
