use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use crate::app::ports::ReportOutputPort;
use crate::app::report_use_case::{
    format_count, format_days, format_millions, format_pct, format_ratio_pct, AnalysisReport,
};
use crate::error::Result;

/// Prints the executive summary block to a writer (stdout by default)
pub struct ConsoleReportAdapter {
    out: Mutex<Box<dyn Write + Send>>,
}

impl ConsoleReportAdapter {
    pub fn new() -> Self {
        Self::with_writer(Box::new(io::stdout()))
    }

    pub fn with_writer(out: Box<dyn Write + Send>) -> Self {
        Self {
            out: Mutex::new(out),
        }
    }
}

impl Default for ConsoleReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

/// Render the summary block as text
pub fn render_summary(report: &AnalysisReport) -> String {
    let o = &report.overall;
    let rule = "=".repeat(60);
    let mut s = String::new();

    s.push_str(&format!("\n{rule}\nEXECUTIVE SUMMARY\n{rule}\n"));

    s.push_str("\n📊 Dataset Overview:\n");
    s.push_str(&format!(
        "   Total Claims: {}\n",
        format_count(o.total_claims)
    ));
    s.push_str(&format!(
        "   Analysis Period: {}\n",
        report.validation.analysis_year
    ));

    s.push_str("\n💰 Revenue Performance:\n");
    s.push_str(&format!("   Total Allowed: {}\n", format_millions(o.total_allowed)));
    s.push_str(&format!("   Total Paid: {}\n", format_millions(o.total_paid)));
    s.push_str(&format!(
        "   Realization Rate: {}\n",
        format_ratio_pct(o.realization_rate)
    ));
    s.push_str(&format!(
        "   Revenue Leakage: {} ({} of allowed)\n",
        format_millions(o.total_underpayment),
        format_ratio_pct(o.leakage_share)
    ));

    s.push_str("\n⏱️  Process Efficiency:\n");
    s.push_str(&format!(
        "   Avg Processing Time: {}\n",
        format_days(o.avg_processing_delay_days)
    ));
    s.push_str(&format!("   Zero-Paid Claims: {}\n", format_pct(o.zero_paid_pct)));
    s.push_str(&format!("   Partial-Paid Claims: {}\n", format_pct(o.partial_paid_pct)));

    s.push_str("\n🎯 Top Opportunities:\n");
    for (i, t) in report.top_opportunities.iter().enumerate() {
        s.push_str(&format!(
            "   {}. {}: {} leakage ({} realization)\n",
            i + 1,
            t.procedure_code,
            format_millions(t.underpayment_amt),
            format_ratio_pct(t.realization_rate)
        ));
    }
    if !report.concentration.procedure_codes.is_empty() {
        s.push_str(&format!(
            "   Top {} codes hold {} of total leakage\n",
            report.concentration.procedure_codes.len(),
            format_ratio_pct(report.concentration.share_of_total)
        ));
    }
    s.push_str(&format!(
        "   High-Risk Services: {}\n",
        format_count(report.high_risk.len())
    ));

    s.push_str("\n💡 Recovery Potential:\n");
    for r in &report.recovery {
        s.push_str(&format!(
            "   {} ({:.1}%): {}\n",
            r.scenario,
            r.rate * 100.0,
            format_millions(r.amount)
        ));
    }
    s.push_str(&format!("\n{rule}\n"));
    s
}

impl ReportOutputPort for ConsoleReportAdapter {
    fn name(&self) -> &'static str {
        "console"
    }

    fn write_report(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>> {
        let text = render_summary(report);
        let mut out = self
            .out
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        out.write_all(text.as_bytes())?;
        out.flush()?;
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_report;
    use crate::config::AnalysisConfig;
    use crate::constants::REQUIRED_COLUMNS;
    use crate::pipeline::ingestion::RawTable;
    use crate::pipeline::Pipeline;

    fn report() -> AnalysisReport {
        let rows = [
            ["1", "1", "300", "200", "100", "100", "2022-05-01", "2022-05-05", "99213", "11"],
            ["2", "1", "300", "200", "0", "0", "2022-05-01", "2022-05-09", "99214", "11"],
        ];
        let table = RawTable::new(
            REQUIRED_COLUMNS.iter().map(|c| c.to_string()).collect(),
            rows.iter()
                .map(|r| r.iter().map(|c| c.to_string()).collect())
                .collect(),
        );
        let outcome = Pipeline::analyze_table(table, 2022).unwrap();
        build_report(&outcome, &AnalysisConfig::default())
    }

    #[test]
    fn test_summary_block_sections() {
        let text = render_summary(&report());
        assert!(text.contains("EXECUTIVE SUMMARY"));
        assert!(text.contains("Total Claims: 2"));
        assert!(text.contains("Realization Rate: 25.0%"));
        assert!(text.contains("Avg Processing Time: 6.0 days"));
        assert!(text.contains("1. 99214"));
        assert!(text.contains("Target (17.5%)"));
    }

    #[test]
    fn test_console_output_writes_no_files() {
        let adapter = ConsoleReportAdapter::with_writer(Box::new(io::sink()));
        assert!(adapter.write_report(&report()).unwrap().is_empty());
    }
}
