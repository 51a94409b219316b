pub mod ports;
pub mod report_use_case;

pub use ports::ReportOutputPort;
pub use report_use_case::{build_report, AnalysisReport, ReportUseCase};
