use std::path::PathBuf;

use crate::app::report_use_case::AnalysisReport;
use crate::error::Result;

/// A sink for the finished analysis report
pub trait ReportOutputPort {
    /// Short name used in logs
    fn name(&self) -> &'static str;

    /// Publish the report; returns the files written, if any
    fn write_report(&self, report: &AnalysisReport) -> Result<Vec<PathBuf>>;
}
