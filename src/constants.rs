/// Column name constants for the carrier claim-line extract.
/// These are the exact header names found on row 1 of the raw file.

pub const CLAIM_ID: &str = "CLM_ID";
pub const LINE_NUM: &str = "LINE_NUM";
pub const SUBMITTED_AMT: &str = "LINE_SBMTD_CHRG_AMT";
pub const ALLOWED_AMT: &str = "LINE_ALOWD_CHRG_AMT";
pub const PAID_TO_PLAN_AMT: &str = "LINE_NCH_PMT_AMT";
pub const PAID_TO_PROVIDER_AMT: &str = "LINE_PRVDR_PMT_AMT";
pub const FIRST_EXPENSE_DT: &str = "LINE_1ST_EXPNS_DT";
pub const WEEKLY_PROCESSING_DT: &str = "NCH_WKLY_PROC_DT";
pub const PROCEDURE_CODE: &str = "HCPCS_CD";
pub const SPECIALTY_CODE: &str = "PRVDR_SPCLTY";

/// Every column the validator needs, in file-independent order
pub const REQUIRED_COLUMNS: [&str; 10] = [
    CLAIM_ID,
    LINE_NUM,
    SUBMITTED_AMT,
    ALLOWED_AMT,
    PAID_TO_PLAN_AMT,
    PAID_TO_PROVIDER_AMT,
    FIRST_EXPENSE_DT,
    WEEKLY_PROCESSING_DT,
    PROCEDURE_CODE,
    SPECIALTY_CODE,
];

/// The four currency columns, in submitted -> allowed -> plan -> provider order
pub const AMOUNT_COLUMNS: [&str; 4] = [
    SUBMITTED_AMT,
    ALLOWED_AMT,
    PAID_TO_PLAN_AMT,
    PAID_TO_PROVIDER_AMT,
];

pub const DATE_COLUMNS: [&str; 2] = [FIRST_EXPENSE_DT, WEEKLY_PROCESSING_DT];

// Fixed policy thresholds
pub const HIGH_RISK_QUANTILE: f64 = 0.9;
pub const HIGH_RISK_REALIZATION_CUTOFF: f64 = 0.9;
pub const FULLY_PAID_TOLERANCE: f64 = 1.0;

// Report shaping
pub const TOP_OPPORTUNITY_COUNT: usize = 5;
pub const TOP_OPPORTUNITY_RECOVERY_RATE: f64 = 0.20;
pub const PROCEDURE_EXTRACT_COUNT: usize = 20;
pub const PARETO_CHART_COUNT: usize = 10;
pub const CONCENTRATION_COUNT: usize = 2;

// Configuration defaults
pub const DEFAULT_INPUT_PATH: &str = "data/raw/carrier01.csv";
pub const DEFAULT_OUTPUT_DIR: &str = "results";
pub const DEFAULT_FIGURES_SUBDIR: &str = "figures";
pub const DEFAULT_ANALYSIS_YEAR: i32 = 2022;
pub const DEFAULT_CONSERVATIVE_RECOVERY: f64 = 0.15;
pub const DEFAULT_TARGET_RECOVERY: f64 = 0.175;
pub const DEFAULT_OPTIMISTIC_RECOVERY: f64 = 0.20;
pub const DEFAULT_CONFIG_FILE: &str = "rcm.toml";
