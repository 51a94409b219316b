use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

use crate::app::ports::ReportOutputPort;
use crate::app::report_use_case::{
    AnalysisReport, Concentration, RecoveryEstimate, SummaryRow, TopOpportunity,
};
use crate::error::Result;
use crate::infra::atomic_file::write_string;
use crate::observability::metrics;
use crate::pipeline::processing::{
    HighRiskService, OverallSummary, ProcedureSummary, SpecialtySummary, ValidationReport,
};

pub const ANALYSIS_FILE: &str = "rcm_analysis.json";
pub const MANIFEST_FILE: &str = "run_manifest.json";

/// Workbook-shaped document: one section per sheet
#[derive(Serialize)]
struct AnalysisDocument<'a> {
    executive_summary: &'a [SummaryRow],
    top_opportunities: &'a [TopOpportunity],
    hcpcs_analysis: &'a [ProcedureSummary],
    specialty_analysis: &'a [SpecialtySummary],
    high_risk_services: &'a [HighRiskService],
    underpayment_threshold: Option<f64>,
    concentration: &'a Concentration,
    recovery_scenarios: &'a [RecoveryEstimate],
    overall: &'a OverallSummary,
    validation: &'a ValidationReport,
}

/// Writes `rcm_analysis.json` and `run_manifest.json`
#[derive(Default)]
pub struct JsonReportAdapter;

impl JsonReportAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl ReportOutputPort for JsonReportAdapter {
    fn name(&self) -> &'static str {
        "json"
    }

    fn write_report(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        let document = AnalysisDocument {
            executive_summary: &report.executive_summary,
            top_opportunities: &report.top_opportunities,
            hcpcs_analysis: &report.procedure_extract,
            specialty_analysis: &report.specialties,
            high_risk_services: &report.high_risk,
            underpayment_threshold: report.underpayment_threshold,
            concentration: &report.concentration,
            recovery_scenarios: &report.recovery,
            overall: &report.overall,
            validation: &report.validation,
        };

        let analysis_path = report.output_dir.join(ANALYSIS_FILE);
        write_string(&analysis_path, &serde_json::to_string_pretty(&document)?)?;
        metrics::export::artifact_written("json");
        info!("Analysis document saved to {}", analysis_path.display());

        let manifest_path = report.output_dir.join(MANIFEST_FILE);
        write_string(&manifest_path, &serde_json::to_string_pretty(&report.manifest)?)?;
        metrics::export::artifact_written("manifest");

        Ok(vec![analysis_path, manifest_path])
    }
}
