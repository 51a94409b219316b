pub mod config;
pub mod constants;
pub mod error;
pub mod observability;
pub mod pipeline;
pub mod types;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;

pub use config::{AnalysisConfig, ConfigOverrides};
pub use error::{RcmError, Result};
pub use pipeline::{AnalysisOutcome, Pipeline, RunManifest};
