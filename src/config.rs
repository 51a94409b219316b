use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::constants;
use crate::error::{RcmError, Result};

pub const ENV_INPUT_PATH: &str = "RCM_INPUT_PATH";
pub const ENV_OUTPUT_DIR: &str = "RCM_OUTPUT_DIR";
pub const ENV_ANALYSIS_YEAR: &str = "RCM_ANALYSIS_YEAR";

/// Run configuration: where to read, where to write, which year to analyze
/// and which recovery scenarios to price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub input_path: PathBuf,
    pub output_dir: PathBuf,
    /// Defaults to `<output_dir>/figures`
    pub figures_dir: Option<PathBuf>,
    pub analysis_year: i32,
    pub recovery: RecoveryScenarios,
}

/// Recovery rates applied to total underpayment
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecoveryScenarios {
    pub conservative: f64,
    pub target: f64,
    pub optimistic: f64,
}

impl Default for RecoveryScenarios {
    fn default() -> Self {
        Self {
            conservative: constants::DEFAULT_CONSERVATIVE_RECOVERY,
            target: constants::DEFAULT_TARGET_RECOVERY,
            optimistic: constants::DEFAULT_OPTIMISTIC_RECOVERY,
        }
    }
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            input_path: PathBuf::from(constants::DEFAULT_INPUT_PATH),
            output_dir: PathBuf::from(constants::DEFAULT_OUTPUT_DIR),
            figures_dir: None,
            analysis_year: constants::DEFAULT_ANALYSIS_YEAR,
            recovery: RecoveryScenarios::default(),
        }
    }
}

/// Values given on the command line; each one wins over file and environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub input_path: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub analysis_year: Option<i32>,
}

impl AnalysisConfig {
    /// Load from an explicit TOML file, or from `rcm.toml` in the working
    /// directory when present, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default_path = Path::new(constants::DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    Self::from_file(default_path)
                } else {
                    debug!("No config file found, using defaults");
                    Ok(Self::default())
                }
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            RcmError::Config(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply environment overrides read through `lookup`
    pub fn apply_env_with<F>(mut self, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_INPUT_PATH) {
            self.input_path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_OUTPUT_DIR) {
            self.output_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_ANALYSIS_YEAR) {
            self.analysis_year = v.trim().parse().map_err(|_| {
                RcmError::Config(format!("{} must be a year, got '{}'", ENV_ANALYSIS_YEAR, v))
            })?;
        }
        Ok(self)
    }

    pub fn apply_env(self) -> Result<Self> {
        self.apply_env_with(|key| std::env::var(key).ok())
    }

    pub fn apply_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(p) = overrides.input_path {
            self.input_path = p;
        }
        if let Some(p) = overrides.output_dir {
            self.output_dir = p;
        }
        if let Some(y) = overrides.analysis_year {
            self.analysis_year = y;
        }
        self
    }

    pub fn figures_dir(&self) -> PathBuf {
        self.figures_dir
            .clone()
            .unwrap_or_else(|| self.output_dir.join(constants::DEFAULT_FIGURES_SUBDIR))
    }

    pub fn validate(&self) -> Result<()> {
        if !(1900..=2100).contains(&self.analysis_year) {
            return Err(RcmError::Config(format!(
                "analysis_year {} is outside 1900..=2100",
                self.analysis_year
            )));
        }
        let r = &self.recovery;
        for (name, rate) in [
            ("conservative", r.conservative),
            ("target", r.target),
            ("optimistic", r.optimistic),
        ] {
            if !(0.0..=1.0).contains(&rate) {
                return Err(RcmError::Config(format!(
                    "recovery.{} must be within [0, 1], got {}",
                    name, rate
                )));
            }
        }
        if !(r.conservative <= r.target && r.target <= r.optimistic) {
            return Err(RcmError::Config(
                "recovery rates must satisfy conservative <= target <= optimistic".to_string(),
            ));
        }
        Ok(())
    }
}
