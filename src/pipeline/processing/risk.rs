use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::constants::{HIGH_RISK_QUANTILE, HIGH_RISK_REALIZATION_CUTOFF};
use crate::observability::metrics;
use crate::pipeline::processing::aggregate::ProcedureSummary;

/// A procedure code flagged as high risk, with the clause(s) that fired
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighRiskService {
    #[serde(flatten)]
    pub summary: ProcedureSummary,
    pub above_underpayment_threshold: bool,
    pub below_realization_cutoff: bool,
}

/// Output of the risk classifier
#[derive(Debug, Clone)]
pub struct RiskAssessment {
    /// Underpayment quantile of the procedure table; None for an empty table
    pub underpayment_threshold: Option<f64>,
    /// Flagged rows in the order of the input table
    pub high_risk: Vec<HighRiskService>,
}

/// Configuration for the risk thresholds
#[derive(Debug, Clone)]
pub struct RiskClassifierConfig {
    pub quantile: f64,
    pub realization_cutoff: f64,
}

impl Default for RiskClassifierConfig {
    fn default() -> Self {
        Self {
            quantile: HIGH_RISK_QUANTILE,
            realization_cutoff: HIGH_RISK_REALIZATION_CUTOFF,
        }
    }
}

/// Trait for flagging high-risk procedure codes
pub trait RiskClassifier {
    fn classify(&self, procedures: &[ProcedureSummary]) -> RiskAssessment;
}

#[derive(Default)]
pub struct DefaultRiskClassifier {
    pub config: RiskClassifierConfig,
}

impl DefaultRiskClassifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RiskClassifier for DefaultRiskClassifier {
    #[instrument(skip_all, fields(groups = procedures.len()))]
    fn classify(&self, procedures: &[ProcedureSummary]) -> RiskAssessment {
        let amounts: Vec<f64> = procedures.iter().map(|p| p.underpayment_amt).collect();
        let threshold = percentile_linear(&amounts, self.config.quantile);

        let high_risk: Vec<HighRiskService> = procedures
            .iter()
            .filter_map(|p| {
                let above = threshold.map_or(false, |t| p.underpayment_amt > t);
                let below = p
                    .realization_rate
                    .map_or(false, |r| r < self.config.realization_cutoff);
                (above || below).then(|| HighRiskService {
                    summary: p.clone(),
                    above_underpayment_threshold: above,
                    below_realization_cutoff: below,
                })
            })
            .collect();

        metrics::risk::high_risk(high_risk.len(), threshold.unwrap_or(0.0));
        info!(
            threshold = threshold.unwrap_or(f64::NAN),
            "{} high-risk services identified",
            high_risk.len()
        );

        RiskAssessment {
            underpayment_threshold: threshold,
            high_risk,
        }
    }
}

/// Quantile with linear interpolation between the closest ranks.
///
/// `q` is in [0, 1]. For sorted values `v` of length `n`, the position is
/// `q * (n - 1)` and the result interpolates between the neighbouring values.
pub fn percentile_linear(values: &[f64], q: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let position = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = position.floor() as usize;
    let upper = position.ceil() as usize;
    let weight = position - lower as f64;
    Some(sorted[lower] + weight * (sorted[upper] - sorted[lower]))
}
