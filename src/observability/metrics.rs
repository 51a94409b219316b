//! Metrics for the claim analysis pipeline
//!
//! Library code records through the `metrics` facade only. The binary decides
//! whether a recorder is installed (see [`install_prometheus_recorder`]); when
//! none is, every call here is a no-op.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::fmt;
use std::time::Instant;

/// Enum representing all metric names used in the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricName {
    // Loader
    RecordsLoaded,
    InputBytes,

    // Quality gate
    DuplicatesDetected,
    CoercionFailures,
    FinancialViolations,
    DateViolations,
    RecordsInAnalysisYear,
    RecordsClean,
    RecordsExcluded,

    // Enrich
    ZeroPaidRecords,
    PartialPaidRecords,
    FullyPaidRecords,
    PaymentStatusOverlaps,

    // Aggregate and risk
    ProcedureGroups,
    SpecialtyGroups,
    HighRiskServices,
    HighRiskThreshold,

    // Export
    ArtifactsWritten,

    // Run
    StageDuration,
    RunFailures,
}

impl MetricName {
    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::RecordsLoaded => "rcm_records_loaded_total",
            MetricName::InputBytes => "rcm_input_bytes",
            MetricName::DuplicatesDetected => "rcm_duplicates_detected_total",
            MetricName::CoercionFailures => "rcm_coercion_failures_total",
            MetricName::FinancialViolations => "rcm_financial_violations_total",
            MetricName::DateViolations => "rcm_date_violations_total",
            MetricName::RecordsInAnalysisYear => "rcm_records_in_analysis_year_total",
            MetricName::RecordsClean => "rcm_records_clean_total",
            MetricName::RecordsExcluded => "rcm_records_excluded_total",
            MetricName::ZeroPaidRecords => "rcm_zero_paid_records_total",
            MetricName::PartialPaidRecords => "rcm_partial_paid_records_total",
            MetricName::FullyPaidRecords => "rcm_fully_paid_records_total",
            MetricName::PaymentStatusOverlaps => "rcm_payment_status_overlaps_total",
            MetricName::ProcedureGroups => "rcm_procedure_groups",
            MetricName::SpecialtyGroups => "rcm_specialty_groups",
            MetricName::HighRiskServices => "rcm_high_risk_services",
            MetricName::HighRiskThreshold => "rcm_high_risk_underpayment_threshold",
            MetricName::ArtifactsWritten => "rcm_artifacts_written_total",
            MetricName::StageDuration => "rcm_stage_duration_seconds",
            MetricName::RunFailures => "rcm_run_failures_total",
        }
    }
}

impl fmt::Display for MetricName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Install the Prometheus recorder as the global metrics recorder.
///
/// Returns `None` when a recorder is already installed (e.g. a second run in
/// the same process), in which case metrics keep flowing to the first one.
pub fn install_prometheus_recorder() -> Option<PrometheusHandle> {
    PrometheusBuilder::new().install_recorder().ok()
}

/// A timing guard that records the elapsed stage time when dropped
pub struct StageTimer {
    start: Instant,
    stage: &'static str,
}

impl StageTimer {
    pub fn new(stage: &'static str) -> Self {
        Self {
            start: Instant::now(),
            stage,
        }
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start.elapsed().as_secs_f64()
    }

    /// Stop the timer and return the recorded duration in seconds
    pub fn finish(self) -> f64 {
        self.elapsed_secs()
    }
}

impl Drop for StageTimer {
    fn drop(&mut self) {
        ::metrics::histogram!(MetricName::StageDuration.as_str(), "stage" => self.stage)
            .record(self.start.elapsed().as_secs_f64());
    }
}

pub fn time_stage(stage: &'static str) -> StageTimer {
    StageTimer::new(stage)
}

pub mod loader {
    use super::MetricName;

    pub fn records_loaded(count: usize, bytes: u64) {
        ::metrics::counter!(MetricName::RecordsLoaded.as_str()).increment(count as u64);
        ::metrics::gauge!(MetricName::InputBytes.as_str()).set(bytes as f64);
    }
}

pub mod quality_gate {
    use super::MetricName;

    pub fn duplicates_detected(count: usize) {
        ::metrics::counter!(MetricName::DuplicatesDetected.as_str()).increment(count as u64);
    }

    pub fn coercion_failures(column: &str, count: usize) {
        ::metrics::counter!(MetricName::CoercionFailures.as_str(), "column" => column.to_string())
            .increment(count as u64);
    }

    pub fn violations(financial: usize, date: usize) {
        ::metrics::counter!(MetricName::FinancialViolations.as_str()).increment(financial as u64);
        ::metrics::counter!(MetricName::DateViolations.as_str()).increment(date as u64);
    }

    pub fn retained(in_year: usize, clean: usize) {
        ::metrics::counter!(MetricName::RecordsInAnalysisYear.as_str()).increment(in_year as u64);
        ::metrics::counter!(MetricName::RecordsClean.as_str()).increment(clean as u64);
        ::metrics::counter!(MetricName::RecordsExcluded.as_str())
            .increment(in_year.saturating_sub(clean) as u64);
    }
}

pub mod enrich {
    use super::MetricName;

    pub fn payment_status(zero: usize, partial: usize, fully: usize, overlaps: usize) {
        ::metrics::counter!(MetricName::ZeroPaidRecords.as_str()).increment(zero as u64);
        ::metrics::counter!(MetricName::PartialPaidRecords.as_str()).increment(partial as u64);
        ::metrics::counter!(MetricName::FullyPaidRecords.as_str()).increment(fully as u64);
        ::metrics::counter!(MetricName::PaymentStatusOverlaps.as_str()).increment(overlaps as u64);
    }
}

pub mod aggregate {
    use super::MetricName;

    pub fn groups(procedures: usize, specialties: usize) {
        ::metrics::gauge!(MetricName::ProcedureGroups.as_str()).set(procedures as f64);
        ::metrics::gauge!(MetricName::SpecialtyGroups.as_str()).set(specialties as f64);
    }
}

pub mod risk {
    use super::MetricName;

    pub fn high_risk(count: usize, threshold: f64) {
        ::metrics::gauge!(MetricName::HighRiskServices.as_str()).set(count as f64);
        ::metrics::gauge!(MetricName::HighRiskThreshold.as_str()).set(threshold);
    }
}

pub mod export {
    use super::MetricName;

    pub fn artifact_written(kind: &'static str) {
        ::metrics::counter!(MetricName::ArtifactsWritten.as_str(), "kind" => kind).increment(1);
    }
}

pub mod run {
    use super::MetricName;

    pub fn failed(kind: &'static str) {
        ::metrics::counter!(MetricName::RunFailures.as_str(), "kind" => kind).increment(1);
    }
}
