use csv::Writer;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::app::ports::ReportOutputPort;
use crate::app::report_use_case::{AnalysisReport, ChartSeries, SummaryRow, TopOpportunity};
use crate::constants::{PROCEDURE_CODE, SPECIALTY_CODE};
use crate::error::Result;
use crate::infra::atomic_file::write_atomically;
use crate::observability::metrics;
use crate::pipeline::processing::{HighRiskService, ProcedureSummary, SpecialtySummary};

const PROCEDURE_COLUMNS: [&str; 8] = [
    PROCEDURE_CODE,
    "services",
    "allowed_amt",
    "paid_amt",
    "underpayment_amt",
    "total_delays",
    "realization_rate",
    "cum_underpayment_pct",
];

/// Writes the report tables and chart series as CSV files
pub struct CsvReportAdapter;

impl CsvReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CsvReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn opt(value: Option<f64>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn procedure_fields(p: &ProcedureSummary) -> Vec<String> {
    vec![
        p.procedure_code.clone(),
        p.services.to_string(),
        p.allowed_amt.to_string(),
        p.paid_amt.to_string(),
        p.underpayment_amt.to_string(),
        p.total_delays.to_string(),
        opt(p.realization_rate),
        opt(p.cum_underpayment_pct),
    ]
}

/// Write a header and rows to `path` through a temp file
fn write_table<I>(path: &Path, header: &[&str], rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    write_atomically(path, |tmp| {
        let mut writer = Writer::from_path(tmp)?;
        writer.write_record(header)?;
        for row in rows {
            writer.write_record(&row)?;
        }
        writer.flush()?;
        Ok(())
    })
}

pub fn write_procedures(path: &Path, procedures: &[ProcedureSummary]) -> Result<()> {
    write_table(path, &PROCEDURE_COLUMNS, procedures.iter().map(procedure_fields))
}

pub fn write_specialties(path: &Path, specialties: &[SpecialtySummary]) -> Result<()> {
    write_table(
        path,
        &[
            SPECIALTY_CODE,
            "services",
            "allowed_amt",
            "paid_amt",
            "underpayment_amt",
            "realization_rate",
        ],
        specialties.iter().map(|s| {
            vec![
                s.specialty_code.clone(),
                s.services.to_string(),
                s.allowed_amt.to_string(),
                s.paid_amt.to_string(),
                s.underpayment_amt.to_string(),
                opt(s.realization_rate),
            ]
        }),
    )
}

pub fn write_high_risk(path: &Path, high_risk: &[HighRiskService]) -> Result<()> {
    let mut header = PROCEDURE_COLUMNS.to_vec();
    header.extend(["above_underpayment_threshold", "below_realization_cutoff"]);
    write_table(
        path,
        &header,
        high_risk.iter().map(|h| {
            let mut fields = procedure_fields(&h.summary);
            fields.push(h.above_underpayment_threshold.to_string());
            fields.push(h.below_realization_cutoff.to_string());
            fields
        }),
    )
}

pub fn write_executive_summary(path: &Path, rows: &[SummaryRow]) -> Result<()> {
    write_table(
        path,
        &["Metric", "Value"],
        rows.iter().map(|r| vec![r.metric.clone(), r.value.clone()]),
    )
}

pub fn write_top_opportunities(path: &Path, rows: &[TopOpportunity]) -> Result<()> {
    write_table(
        path,
        &[
            PROCEDURE_CODE,
            "services",
            "underpayment_amt",
            "realization_rate",
            "potential_recovery",
        ],
        rows.iter().map(|t| {
            vec![
                t.procedure_code.clone(),
                t.services.to_string(),
                t.underpayment_amt.to_string(),
                opt(t.realization_rate),
                t.potential_recovery.to_string(),
            ]
        }),
    )
}

pub fn write_chart(path: &Path, chart: &ChartSeries) -> Result<()> {
    write_table(
        path,
        &["label", chart.value_label.as_str()],
        chart
            .bars
            .iter()
            .map(|b| vec![b.label.clone(), b.value_millions.to_string()]),
    )
}

impl ReportOutputPort for CsvReportAdapter {
    fn name(&self) -> &'static str {
        "csv"
    }

    fn write_report(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        let out = &report.output_dir;
        let mut written = Vec::new();

        let tables = [
            out.join("hcpcs_summary.csv"),
            out.join("specialty_summary.csv"),
            out.join("high_risk_services.csv"),
            out.join("executive_summary.csv"),
            out.join("top_opportunities.csv"),
        ];
        write_procedures(&tables[0], &report.procedures)?;
        write_specialties(&tables[1], &report.specialties)?;
        write_high_risk(&tables[2], &report.high_risk)?;
        write_executive_summary(&tables[3], &report.executive_summary)?;
        write_top_opportunities(&tables[4], &report.top_opportunities)?;
        for path in tables {
            metrics::export::artifact_written("csv");
            written.push(path);
        }
        info!("CSV files saved to {}", out.display());

        for chart in &report.charts {
            let path = report.figures_dir.join(format!("{}.csv", chart.name));
            write_chart(&path, chart)?;
            metrics::export::artifact_written("chart_series");
            written.push(path);
        }
        info!("Chart series saved to {}", report.figures_dir.display());

        Ok(written)
    }
}
