use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{info, instrument};

use crate::observability::metrics;
use crate::pipeline::processing::enrich::{EnrichedClaimLine, EnrichedDataset};
use crate::types::ratio_of_sums;

/// One row of the procedure-code (HCPCS) rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcedureSummary {
    pub procedure_code: String,
    pub services: usize,
    pub allowed_amt: f64,
    pub paid_amt: f64,
    pub underpayment_amt: f64,
    pub total_delays: i64,
    /// paid_amt / allowed_amt
    pub realization_rate: Option<f64>,
    /// Running underpayment share in table order; undefined when the grand
    /// total underpayment is zero
    pub cum_underpayment_pct: Option<f64>,
}

/// One row of the provider specialty rollup
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialtySummary {
    pub specialty_code: String,
    pub services: usize,
    pub allowed_amt: f64,
    pub paid_amt: f64,
    pub underpayment_amt: f64,
    pub realization_rate: Option<f64>,
}

/// Both rollups of one run
#[derive(Debug, Clone)]
pub struct AggregatedTables {
    /// Sorted by underpayment, largest first, with the Pareto column filled
    pub procedures: Vec<ProcedureSummary>,
    /// Ordered by specialty code
    pub specialties: Vec<SpecialtySummary>,
}

#[derive(Debug, Default)]
struct GroupTotals {
    services: usize,
    allowed: f64,
    paid: f64,
    underpayment: f64,
    delays: i64,
}

impl GroupTotals {
    fn add(&mut self, record: &EnrichedClaimLine) {
        if record.line.line_num.is_some() {
            self.services += 1;
        }
        self.allowed += record.line.allowed.value().unwrap_or(0.0);
        self.paid += record.line.paid_to_plan.value().unwrap_or(0.0);
        self.underpayment += record.metrics.underpayment.value().unwrap_or(0.0);
        self.delays += record.metrics.processing_delay_days.unwrap_or(0);
    }
}

/// Group records by a key; records without a key are left out. Groups come
/// back in ascending key order.
fn group_by<F>(records: &[EnrichedClaimLine], key: F) -> BTreeMap<String, GroupTotals>
where
    F: Fn(&EnrichedClaimLine) -> Option<&String>,
{
    let mut groups: BTreeMap<String, GroupTotals> = BTreeMap::new();
    for record in records {
        if let Some(k) = key(record) {
            groups.entry(k.clone()).or_default().add(record);
        }
    }
    groups
}

/// Roll up by procedure code and attach the cumulative underpayment share.
pub fn aggregate_by_procedure(records: &[EnrichedClaimLine]) -> Vec<ProcedureSummary> {
    let mut table: Vec<ProcedureSummary> = group_by(records, |r| r.line.procedure_code.as_ref())
        .into_iter()
        .map(|(procedure_code, t)| ProcedureSummary {
            procedure_code,
            services: t.services,
            allowed_amt: t.allowed,
            paid_amt: t.paid,
            underpayment_amt: t.underpayment,
            total_delays: t.delays,
            realization_rate: ratio_of_sums(t.paid, t.allowed),
            cum_underpayment_pct: None,
        })
        .collect();

    sort_by_underpayment(&mut table);
    fill_cumulative_share(&mut table);
    table
}

/// Largest underpayment first; equal amounts keep ascending code order
pub fn sort_by_underpayment(table: &mut [ProcedureSummary]) {
    table.sort_by(|a, b| {
        b.underpayment_amt
            .partial_cmp(&a.underpayment_amt)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.procedure_code.cmp(&b.procedure_code))
    });
}

/// Running sum of underpayment over the grand total, in table order
pub fn fill_cumulative_share(table: &mut [ProcedureSummary]) {
    let grand_total: f64 = table.iter().map(|row| row.underpayment_amt).sum();
    let mut running = 0.0;
    for row in table.iter_mut() {
        running += row.underpayment_amt;
        row.cum_underpayment_pct = ratio_of_sums(running, grand_total);
    }
}

/// Roll up by provider specialty
pub fn aggregate_by_specialty(records: &[EnrichedClaimLine]) -> Vec<SpecialtySummary> {
    group_by(records, |r| r.line.specialty_code.as_ref())
        .into_iter()
        .map(|(specialty_code, t)| SpecialtySummary {
            specialty_code,
            services: t.services,
            allowed_amt: t.allowed,
            paid_amt: t.paid,
            underpayment_amt: t.underpayment,
            realization_rate: ratio_of_sums(t.paid, t.allowed),
        })
        .collect()
}

#[instrument(skip_all, fields(records = dataset.records.len()))]
pub fn aggregate(dataset: &EnrichedDataset) -> AggregatedTables {
    let procedures = aggregate_by_procedure(&dataset.records);
    let specialties = aggregate_by_specialty(&dataset.records);
    metrics::aggregate::groups(procedures.len(), specialties.len());

    let top_five: f64 = procedures.iter().take(5).map(|p| p.underpayment_amt).sum();
    let top_two: f64 = procedures.iter().take(2).map(|p| p.underpayment_amt).sum();
    let total: f64 = procedures.iter().map(|p| p.underpayment_amt).sum();
    info!(
        "Top 5 codes account for ${:.2}M leakage",
        top_five / 1e6
    );
    if let Some(share) = ratio_of_sums(top_two, total) {
        info!("Top 2 codes account for {:.1}% of total", 100.0 * share);
    }
    info!(
        procedure_groups = procedures.len(),
        specialty_groups = specialties.len(),
        "Aggregation complete"
    );

    AggregatedTables {
        procedures,
        specialties,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::processing::enrich::DerivedMetrics;
    use crate::types::{Amount, ClaimLine};
    use chrono::NaiveDate;

    fn record(code: &str, specialty: &str, allowed: f64, paid: f64) -> EnrichedClaimLine {
        let line = ClaimLine {
            claim_id: format!("{code}-{allowed}-{paid}"),
            line_num: Some("1".to_string()),
            submitted: Amount::new(allowed),
            allowed: Amount::new(allowed),
            paid_to_plan: Amount::new(paid),
            paid_to_provider: Amount::new(paid),
            first_expense_date: NaiveDate::from_ymd_opt(2022, 2, 1),
            processing_date: NaiveDate::from_ymd_opt(2022, 2, 8),
            procedure_code: Some(code.to_string()),
            specialty_code: Some(specialty.to_string()),
        };
        EnrichedClaimLine {
            metrics: DerivedMetrics::derive(&line, 1.0),
            date_violation: false,
            line,
        }
    }

    #[test]
    fn test_procedure_rollup_sorted_with_pareto() {
        let records = vec![
            record("A", "01", 100.0, 90.0),  // 10
            record("B", "01", 100.0, 40.0),  // 60
            record("B", "02", 100.0, 70.0),  // 30
            record("C", "02", 100.0, 100.0), // 0
        ];
        let table = aggregate_by_procedure(&records);

        let codes: Vec<&str> = table.iter().map(|r| r.procedure_code.as_str()).collect();
        assert_eq!(codes, vec!["B", "A", "C"]);
        assert_eq!(table[0].services, 2);
        assert_eq!(table[0].underpayment_amt, 90.0);
        assert_eq!(table[0].total_delays, 14);
        assert_eq!(table[0].realization_rate, Some(110.0 / 200.0));
        assert_eq!(table[0].cum_underpayment_pct, Some(0.9));
        assert_eq!(table[2].cum_underpayment_pct, Some(1.0));
    }

    #[test]
    fn test_ties_break_on_code() {
        let records = vec![
            record("Z", "01", 100.0, 50.0),
            record("M", "01", 100.0, 50.0),
            record("A", "01", 100.0, 50.0),
        ];
        let table = aggregate_by_procedure(&records);
        let codes: Vec<&str> = table.iter().map(|r| r.procedure_code.as_str()).collect();
        assert_eq!(codes, vec!["A", "M", "Z"]);
    }

    #[test]
    fn test_zero_total_leaves_pareto_undefined() {
        let records = vec![record("A", "01", 100.0, 100.0)];
        let table = aggregate_by_procedure(&records);
        assert_eq!(table[0].cum_underpayment_pct, None);
    }

    #[test]
    fn test_blank_keys_are_not_grouped() {
        let mut orphan = record("A", "01", 100.0, 10.0);
        orphan.line.procedure_code = None;
        orphan.line.specialty_code = None;
        let records = vec![orphan, record("B", "02", 100.0, 50.0)];

        assert_eq!(aggregate_by_procedure(&records).len(), 1);
        assert_eq!(aggregate_by_specialty(&records).len(), 1);
    }

    #[test]
    fn test_missing_amounts_are_skipped_in_sums() {
        let mut partial = record("A", "01", 100.0, 10.0);
        partial.line.paid_to_plan = Amount::MISSING;
        partial.metrics = DerivedMetrics::derive(&partial.line, 1.0);
        let records = vec![partial, record("A", "01", 50.0, 25.0)];

        let table = aggregate_by_procedure(&records);
        assert_eq!(table[0].allowed_amt, 150.0);
        assert_eq!(table[0].paid_amt, 25.0);
        assert_eq!(table[0].underpayment_amt, 25.0);
    }

    #[test]
    fn test_specialty_rollup_uses_ratio_of_sums() {
        let records = vec![
            record("A", "01", 1000.0, 1000.0),
            record("B", "01", 10.0, 0.0),
            record("C", "02", 0.0, 0.0),
        ];
        let table = aggregate_by_specialty(&records);

        assert_eq!(table[0].specialty_code, "01");
        assert_eq!(table[0].realization_rate, Some(1000.0 / 1010.0));
        assert_eq!(table[1].realization_rate, None);
    }
}
