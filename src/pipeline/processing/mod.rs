// Pipeline processing: coercion, validation, metric derivation, rollups and risk

pub mod parser;
pub mod quality_gate;
pub mod enrich;
pub mod aggregate;
pub mod risk;

pub use aggregate::{AggregatedTables, ProcedureSummary, SpecialtySummary};
pub use enrich::{EnrichedClaimLine, EnrichedDataset, OverallSummary, PaymentStatus};
pub use quality_gate::{CleanDataset, ValidationReport};
pub use risk::{HighRiskService, RiskAssessment};
