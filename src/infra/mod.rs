pub mod atomic_file;
pub mod console_report_adapter;
pub mod csv_report_adapter;
pub mod json_report_adapter;

pub use console_report_adapter::ConsoleReportAdapter;
pub use csv_report_adapter::CsvReportAdapter;
pub use json_report_adapter::JsonReportAdapter;
