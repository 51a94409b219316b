// Claim analysis pipeline: ingestion, processing, and the stage orchestrator

pub mod ingestion;
pub mod orchestrator;
pub mod processing;

pub use orchestrator::{AnalysisOutcome, Pipeline, RunManifest, StageTiming};
