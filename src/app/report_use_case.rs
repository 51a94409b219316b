use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::{info, instrument};

use crate::app::ports::ReportOutputPort;
use crate::config::AnalysisConfig;
use crate::constants::{
    CONCENTRATION_COUNT, PARETO_CHART_COUNT, PROCEDURE_EXTRACT_COUNT, TOP_OPPORTUNITY_COUNT,
    TOP_OPPORTUNITY_RECOVERY_RATE,
};
use crate::error::Result;
use crate::pipeline::processing::{
    HighRiskService, OverallSummary, ProcedureSummary, SpecialtySummary, ValidationReport,
};
use crate::pipeline::{AnalysisOutcome, RunManifest};
use crate::types::ratio_of_sums;

/// Label/value pair of the executive summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryRow {
    pub metric: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopOpportunity {
    pub procedure_code: String,
    pub services: usize,
    pub underpayment_amt: f64,
    pub realization_rate: Option<f64>,
    pub potential_recovery: f64,
}

/// Leakage held by the largest few procedure codes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Concentration {
    pub procedure_codes: Vec<String>,
    pub combined_leakage: f64,
    pub share_of_total: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryEstimate {
    pub scenario: String,
    pub rate: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartBar {
    pub label: String,
    pub value_millions: f64,
}

/// Data behind one chart; rendering happens elsewhere
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartSeries {
    /// File stem under the figures directory
    pub name: String,
    pub title: String,
    pub value_label: String,
    pub bars: Vec<ChartBar>,
}

/// Everything the output adapters publish for one run
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub executive_summary: Vec<SummaryRow>,
    pub top_opportunities: Vec<TopOpportunity>,
    pub procedure_extract: Vec<ProcedureSummary>,
    pub procedures: Vec<ProcedureSummary>,
    pub specialties: Vec<SpecialtySummary>,
    pub high_risk: Vec<HighRiskService>,
    pub underpayment_threshold: Option<f64>,
    pub concentration: Concentration,
    pub recovery: Vec<RecoveryEstimate>,
    pub charts: Vec<ChartSeries>,
    pub overall: OverallSummary,
    pub validation: ValidationReport,
    pub manifest: RunManifest,
    pub output_dir: PathBuf,
    pub figures_dir: PathBuf,
}

/// Shape the analysis outcome into report tables.
pub fn build_report(outcome: &AnalysisOutcome, config: &AnalysisConfig) -> AnalysisReport {
    let overall = &outcome.dataset.summary;
    let procedures = &outcome.tables.procedures;

    AnalysisReport {
        executive_summary: executive_summary(overall, outcome.risk.high_risk.len()),
        top_opportunities: top_opportunities(procedures),
        procedure_extract: procedures.iter().take(PROCEDURE_EXTRACT_COUNT).cloned().collect(),
        procedures: procedures.clone(),
        specialties: outcome.tables.specialties.clone(),
        high_risk: outcome.risk.high_risk.clone(),
        underpayment_threshold: outcome.risk.underpayment_threshold,
        concentration: concentration(procedures, CONCENTRATION_COUNT),
        recovery: recovery_estimates(overall.total_underpayment, config),
        charts: chart_series(overall, procedures),
        overall: overall.clone(),
        validation: outcome.validation.clone(),
        manifest: outcome.manifest.clone(),
        output_dir: config.output_dir.clone(),
        figures_dir: config.figures_dir(),
    }
}

fn row(metric: &str, value: String) -> SummaryRow {
    SummaryRow {
        metric: metric.to_string(),
        value,
    }
}

pub fn executive_summary(overall: &OverallSummary, high_risk_count: usize) -> Vec<SummaryRow> {
    vec![
        row("Total Claims Analyzed", format_count(overall.total_claims)),
        row("Total Revenue Processed", format_millions(overall.total_allowed)),
        row("Revenue Realization Rate", format_ratio_pct(overall.realization_rate)),
        row("Total Revenue Leakage", format_millions(overall.total_underpayment)),
        row("Zero-Paid Rate", format_pct(overall.zero_paid_pct)),
        row("Partial-Paid Rate", format_pct(overall.partial_paid_pct)),
        row("Avg Processing Time", format_days(overall.avg_processing_delay_days)),
        row("High-Risk Services", format_count(high_risk_count)),
    ]
}

pub fn top_opportunities(procedures: &[ProcedureSummary]) -> Vec<TopOpportunity> {
    procedures
        .iter()
        .take(TOP_OPPORTUNITY_COUNT)
        .map(|p| TopOpportunity {
            procedure_code: p.procedure_code.clone(),
            services: p.services,
            underpayment_amt: p.underpayment_amt,
            realization_rate: p.realization_rate,
            potential_recovery: p.underpayment_amt * TOP_OPPORTUNITY_RECOVERY_RATE,
        })
        .collect()
}

pub fn concentration(procedures: &[ProcedureSummary], count: usize) -> Concentration {
    let head = &procedures[..count.min(procedures.len())];
    let combined_leakage: f64 = head.iter().map(|p| p.underpayment_amt).sum();
    let total: f64 = procedures.iter().map(|p| p.underpayment_amt).sum();
    Concentration {
        procedure_codes: head.iter().map(|p| p.procedure_code.clone()).collect(),
        combined_leakage,
        share_of_total: ratio_of_sums(combined_leakage, total),
    }
}

pub fn recovery_estimates(total_underpayment: f64, config: &AnalysisConfig) -> Vec<RecoveryEstimate> {
    let r = &config.recovery;
    [
        ("Conservative", r.conservative),
        ("Target", r.target),
        ("Optimistic", r.optimistic),
    ]
    .into_iter()
    .map(|(scenario, rate)| RecoveryEstimate {
        scenario: scenario.to_string(),
        rate,
        amount: total_underpayment * rate,
    })
    .collect()
}

fn bar(label: &str, amount: f64) -> ChartBar {
    ChartBar {
        label: label.to_string(),
        value_millions: amount / 1e6,
    }
}

pub fn chart_series(overall: &OverallSummary, procedures: &[ProcedureSummary]) -> Vec<ChartSeries> {
    vec![
        ChartSeries {
            name: "revenue_waterfall".to_string(),
            title: "Revenue Flow".to_string(),
            value_label: "Amount ($M)".to_string(),
            bars: vec![
                bar("Submitted", overall.total_submitted),
                bar("Allowed", overall.total_allowed),
                bar("Paid", overall.total_paid),
            ],
        },
        ChartSeries {
            name: "pareto_hcpcs".to_string(),
            title: format!("Top {} HCPCS Codes by Revenue Leakage", PARETO_CHART_COUNT),
            value_label: "Revenue Leakage ($M)".to_string(),
            bars: procedures
                .iter()
                .take(PARETO_CHART_COUNT)
                .map(|p| bar(&p.procedure_code, p.underpayment_amt))
                .collect(),
        },
        ChartSeries {
            name: "payment_distribution".to_string(),
            title: "Revenue Leakage by Payment Status".to_string(),
            value_label: "Revenue Leakage ($M)".to_string(),
            bars: vec![
                bar("Zero-Paid", overall.zero_paid_leakage),
                bar("Partial-Paid", overall.partial_paid_leakage),
            ],
        },
    ]
}

const NOT_AVAILABLE: &str = "n/a";

/// `12345` -> `12,345`
pub fn format_count(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// `1_234_567.0` -> `$1.23M`
pub fn format_millions(amount: f64) -> String {
    format!("${:.2}M", amount / 1e6)
}

/// Already a percentage: `50.0` -> `50.0%`
pub fn format_pct(pct: Option<f64>) -> String {
    pct.map_or_else(|| NOT_AVAILABLE.to_string(), |p| format!("{:.1}%", p))
}

/// A ratio in [0, 1] shown as a percentage
pub fn format_ratio_pct(ratio: Option<f64>) -> String {
    format_pct(ratio.map(|r| r * 100.0))
}

pub fn format_days(days: Option<f64>) -> String {
    days.map_or_else(|| NOT_AVAILABLE.to_string(), |d| format!("{:.1} days", d))
}

/// Use case for publishing a finished report to every configured output
pub struct ReportUseCase {
    outputs: Vec<Box<dyn ReportOutputPort>>,
}

impl ReportUseCase {
    pub fn new(outputs: Vec<Box<dyn ReportOutputPort>>) -> Self {
        Self { outputs }
    }

    /// Hand the report to each output in order; the first failure stops the export
    #[instrument(skip_all, fields(outputs = self.outputs.len()))]
    pub fn publish(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        let mut written = Vec::new();
        for output in &self.outputs {
            let files = output.write_report(report)?;
            info!(output = output.name(), files = files.len(), "Report output complete");
            written.extend(files);
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::REQUIRED_COLUMNS;
    use crate::pipeline::ingestion::RawTable;
    use crate::pipeline::Pipeline;
    use std::cell::RefCell;

    fn outcome() -> AnalysisOutcome {
        let rows = vec![
            ["1", "1", "2000000", "1000000", "1000000", "0", "2022-01-01", "2022-01-11", "A", "01"],
            ["2", "1", "2000000", "1000000", "0", "0", "2022-01-01", "2022-01-21", "B", "01"],
            ["3", "1", "2000000", "1000000", "500000", "0", "2022-01-01", "2022-01-31", "C", "02"],
        ];
        let table = RawTable::new(
            REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        );
        Pipeline::analyze_table(table, 2022).unwrap()
    }

    #[test]
    fn test_number_formatting() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(12_345), "12,345");
        assert_eq!(format_count(1_234_567), "1,234,567");
        assert_eq!(format_millions(1_234_567.0), "$1.23M");
        assert_eq!(format_pct(Some(50.0)), "50.0%");
        assert_eq!(format_ratio_pct(Some(0.5)), "50.0%");
        assert_eq!(format_days(Some(12.34)), "12.3 days");
        assert_eq!(format_pct(None), "n/a");
        assert_eq!(format_days(None), "n/a");
    }

    #[test]
    fn test_executive_summary_labels_and_values() {
        let report = build_report(&outcome(), &AnalysisConfig::default());
        let labels: Vec<&str> = report
            .executive_summary
            .iter()
            .map(|r| r.metric.as_str())
            .collect();
        assert_eq!(
            labels,
            vec![
                "Total Claims Analyzed",
                "Total Revenue Processed",
                "Revenue Realization Rate",
                "Total Revenue Leakage",
                "Zero-Paid Rate",
                "Partial-Paid Rate",
                "Avg Processing Time",
                "High-Risk Services",
            ]
        );
        assert_eq!(report.executive_summary[0].value, "3");
        assert_eq!(report.executive_summary[1].value, "$3.00M");
        assert_eq!(report.executive_summary[2].value, "50.0%");
        assert_eq!(report.executive_summary[3].value, "$1.50M");
        assert_eq!(report.executive_summary[6].value, "20.0 days");
    }

    #[test]
    fn test_opportunities_concentration_and_recovery() {
        let report = build_report(&outcome(), &AnalysisConfig::default());

        assert_eq!(report.top_opportunities[0].procedure_code, "B");
        assert!((report.top_opportunities[0].potential_recovery - 200_000.0).abs() < 1e-6);

        assert_eq!(report.concentration.procedure_codes, vec!["B", "C"]);
        assert_eq!(report.concentration.combined_leakage, 1_500_000.0);
        assert_eq!(report.concentration.share_of_total, Some(1.0));

        let amounts: Vec<f64> = report.recovery.iter().map(|r| r.amount).collect();
        assert!((amounts[0] - 225_000.0).abs() < 1e-6);
        assert!((amounts[1] - 262_500.0).abs() < 1e-6);
        assert!((amounts[2] - 300_000.0).abs() < 1e-6);
    }

    #[test]
    fn test_chart_series_in_millions() {
        let report = build_report(&outcome(), &AnalysisConfig::default());
        let names: Vec<&str> = report.charts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["revenue_waterfall", "pareto_hcpcs", "payment_distribution"]);

        let flow = &report.charts[0].bars;
        assert_eq!(flow[0].value_millions, 6.0);
        assert_eq!(flow[2].value_millions, 1.5);

        let status = &report.charts[2].bars;
        assert_eq!(status[0].value_millions, 1.0);
        assert_eq!(status[1].value_millions, 0.5);
    }

    #[test]
    fn test_concentration_with_no_leakage_is_undefined() {
        let c = concentration(&[], CONCENTRATION_COUNT);
        assert!(c.procedure_codes.is_empty());
        assert_eq!(c.share_of_total, None);
    }

    struct RecordingOutput {
        seen: RefCell<Vec<usize>>,
    }

    impl ReportOutputPort for RecordingOutput {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn write_report(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
            self.seen.borrow_mut().push(report.procedures.len());
            Ok(vec![PathBuf::from("recorded.csv")])
        }
    }

    #[test]
    fn test_publish_collects_written_files() {
        let report = build_report(&outcome(), &AnalysisConfig::default());
        let use_case = ReportUseCase::new(vec![
            Box::new(RecordingOutput { seen: RefCell::new(Vec::new()) }),
            Box::new(RecordingOutput { seen: RefCell::new(Vec::new()) }),
        ]);
        let written = use_case.publish(&report).unwrap();
        assert_eq!(written.len(), 2);
    }
}
