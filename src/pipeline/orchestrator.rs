use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::observability::metrics::{self, time_stage};
use crate::pipeline::ingestion::{load_raw_table, InputFingerprint, RawTable};
use crate::pipeline::processing::aggregate::{self, AggregatedTables};
use crate::pipeline::processing::enrich::{DefaultEnricher, EnrichedDataset, Enricher};
use crate::pipeline::processing::quality_gate::{
    CleanDataset, DefaultQualityGate, QualityGate, QualityGateConfig, ValidationReport,
};
use crate::pipeline::processing::risk::{DefaultRiskClassifier, RiskAssessment, RiskClassifier};

/// Wall time spent in one stage
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageTiming {
    pub stage: String,
    pub seconds: f64,
}

/// Provenance of one analysis run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub input: Option<InputFingerprint>,
    pub analysis_year: i32,
    pub records_loaded: usize,
    pub records_clean: usize,
    pub procedure_groups: usize,
    pub specialty_groups: usize,
    pub high_risk_services: usize,
    pub stages: Vec<StageTiming>,
}

/// Everything the core stages produce, handed to the reporting layer
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub validation: ValidationReport,
    pub dataset: EnrichedDataset,
    pub tables: AggregatedTables,
    pub risk: RiskAssessment,
    pub manifest: RunManifest,
}

#[derive(Default)]
struct StageClock {
    stages: Vec<StageTiming>,
}

impl StageClock {
    fn time<T>(&mut self, stage: &'static str, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let timer = time_stage(stage);
        let out = f();
        self.stages.push(StageTiming {
            stage: stage.to_string(),
            seconds: timer.finish(),
        });
        out
    }
}

pub struct Pipeline;

impl Pipeline {
    /// Load the configured input and run every core stage.
    #[instrument(skip_all, fields(input = %config.input_path.display(), year = config.analysis_year))]
    pub fn run(config: &AnalysisConfig) -> Result<AnalysisOutcome> {
        let started_at = Utc::now();
        let mut clock = StageClock::default();
        let result = clock
            .time("load", || load_raw_table(&config.input_path))
            .and_then(|table| Self::analyze_with_clock(table, config.analysis_year, started_at, clock));
        Self::note_failure(result)
    }

    /// Run loader and validator only; emptiness is left for the caller to judge
    pub fn validate_only(config: &AnalysisConfig) -> Result<CleanDataset> {
        let result = load_raw_table(&config.input_path)
            .and_then(|table| Self::quality_gate(config.analysis_year).assess(&table));
        Self::note_failure(result)
    }

    /// Run the stages after loading on an in-memory table
    pub fn analyze_table(table: RawTable, analysis_year: i32) -> Result<AnalysisOutcome> {
        let result = Self::analyze_with_clock(table, analysis_year, Utc::now(), StageClock::default());
        Self::note_failure(result)
    }

    fn quality_gate(analysis_year: i32) -> DefaultQualityGate {
        DefaultQualityGate::with_config(QualityGateConfig { analysis_year })
    }

    fn analyze_with_clock(
        table: RawTable,
        analysis_year: i32,
        started_at: DateTime<Utc>,
        mut clock: StageClock,
    ) -> Result<AnalysisOutcome> {
        info!("Cleaning and validating {} records", table.len());
        let clean = clock.time("quality_gate", || {
            let clean = Self::quality_gate(analysis_year).assess(&table)?;
            clean.ensure_non_empty()?;
            Ok(clean)
        })?;

        info!("Calculating revenue metrics");
        let dataset = clock.time("enrich", || Ok(DefaultEnricher::new().enrich(&clean)))?;

        info!("Aggregating by procedure code and specialty");
        let tables = clock.time("aggregate", || Ok(aggregate::aggregate(&dataset)))?;

        info!("Identifying high-risk services");
        let risk = clock.time("risk", || {
            Ok(DefaultRiskClassifier::new().classify(&tables.procedures))
        })?;

        let manifest = RunManifest {
            run_id: Uuid::new_v4(),
            started_at,
            finished_at: Utc::now(),
            input: table.source().cloned(),
            analysis_year,
            records_loaded: clean.report.records_loaded,
            records_clean: clean.report.records_clean,
            procedure_groups: tables.procedures.len(),
            specialty_groups: tables.specialties.len(),
            high_risk_services: risk.high_risk.len(),
            stages: clock.stages,
        };
        info!(run_id = %manifest.run_id, "Core analysis complete");

        Ok(AnalysisOutcome {
            validation: clean.report,
            dataset,
            tables,
            risk,
            manifest,
        })
    }

    fn note_failure<T>(result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            error!(kind = e.kind(), "Pipeline failed: {}", e);
            metrics::run::failed(e.kind());
        }
        result
    }
}
