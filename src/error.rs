use thiserror::Error;

#[derive(Error, Debug)]
pub enum RcmError {
    #[error("Failed to load input '{path}': {reason}")]
    Load { path: String, reason: String },

    #[error("Missing required column(s): {}", missing.join(", "))]
    Schema { missing: Vec<String> },

    #[error(
        "Empty dataset after {stage}: {records_in} record(s) entered the stage, none remained \
         ({records_loaded} loaded in total)"
    )]
    EmptyDataset {
        stage: &'static str,
        records_loaded: usize,
        records_in: usize,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Export failed for '{path}': {reason}")]
    Export { path: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),
}

impl RcmError {
    /// Short stable name used in logs and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            RcmError::Load { .. } => "load",
            RcmError::Schema { .. } => "schema",
            RcmError::EmptyDataset { .. } => "empty_dataset",
            RcmError::Config(_) => "config",
            RcmError::Export { .. } => "export",
            RcmError::Io(_) => "io",
            RcmError::Csv(_) => "csv",
            RcmError::Json(_) => "json",
            RcmError::Toml(_) => "toml",
        }
    }
}

pub type Result<T> = std::result::Result<T, RcmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_lists_every_missing_column() {
        let err = RcmError::Schema {
            missing: vec!["HCPCS_CD".to_string(), "PRVDR_SPCLTY".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Missing required column(s): HCPCS_CD, PRVDR_SPCLTY"
        );
        assert_eq!(err.kind(), "schema");
    }

    #[test]
    fn test_empty_dataset_error_carries_stage_context() {
        let err = RcmError::EmptyDataset {
            stage: "temporal_filter",
            records_loaded: 12,
            records_in: 12,
        };
        let msg = err.to_string();
        assert!(msg.contains("temporal_filter"));
        assert!(msg.contains("12 loaded"));
    }
}
