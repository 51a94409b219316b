use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{info, warn};

use rcm_analyzer::app::{build_report, ReportUseCase};
use rcm_analyzer::config::{AnalysisConfig, ConfigOverrides};
use rcm_analyzer::infra::atomic_file::write_string;
use rcm_analyzer::infra::{ConsoleReportAdapter, CsvReportAdapter, JsonReportAdapter};
use rcm_analyzer::observability::{init_logging, metrics};
use rcm_analyzer::pipeline::Pipeline;

#[derive(Parser)]
#[command(name = "rcm_analyzer")]
#[command(about = "Revenue cycle leakage analysis for Medicare carrier claim lines")]
#[command(version)]
struct Cli {
    /// TOML config file (defaults to ./rcm.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Input claim-line CSV
    #[arg(long, global = true)]
    input: Option<PathBuf>,

    /// Directory for exported tables and documents
    #[arg(long = "output-dir", global = true)]
    output_dir: Option<PathBuf>,

    /// Service year to analyze
    #[arg(long, global = true)]
    year: Option<i32>,

    #[arg(long = "log-dir", global = true, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full analysis and export every artifact
    Run,
    /// Load and validate the input only; writes nothing
    Validate,
    /// Print the top procedure codes by leakage with their cumulative share
    Pareto {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

fn resolve_config(cli: &Cli) -> Result<AnalysisConfig> {
    let config = AnalysisConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .apply_env()
        .context("Invalid environment override")?
        .apply_overrides(ConfigOverrides {
            input_path: cli.input.clone(),
            output_dir: cli.output_dir.clone(),
            analysis_year: cli.year,
        });
    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let _log_guard = init_logging(&cli.log_dir);
    let prometheus = metrics::install_prometheus_recorder();
    if prometheus.is_none() {
        warn!("Prometheus recorder not installed; metrics.prom will not be written");
    }

    let config = resolve_config(&cli)?;
    info!(?config, "Configuration resolved");

    match cli.command {
        Commands::Run => {
            println!("🚀 Running revenue cycle analysis for {}...", config.analysis_year);
            println!("📥 Loading {}", config.input_path.display());

            let outcome = Pipeline::run(&config).with_context(|| {
                format!("Analysis of {} failed", config.input_path.display())
            })?;
            println!(
                "✅ {} clean records, {} procedure codes, {} high-risk services",
                outcome.manifest.records_clean,
                outcome.manifest.procedure_groups,
                outcome.manifest.high_risk_services
            );

            println!("\n📤 Exporting results...");
            let report = build_report(&outcome, &config);
            let publisher = ReportUseCase::new(vec![
                Box::new(CsvReportAdapter::new()),
                Box::new(JsonReportAdapter::new()),
                Box::new(ConsoleReportAdapter::new()),
            ]);
            let written = publisher.publish(&report).context("Export failed")?;

            if let Some(handle) = prometheus {
                let path = config.output_dir.join("metrics.prom");
                write_string(&path, &handle.render()).context("Failed to write metrics.prom")?;
            }

            println!("✅ Analysis complete: {} files written to {}", written.len(), config.output_dir.display());
            for path in &written {
                println!("   - {}", path.display());
            }
        }
        Commands::Validate => {
            println!("🔍 Validating {}", config.input_path.display());
            let clean = Pipeline::validate_only(&config).with_context(|| {
                format!("Validation of {} failed", config.input_path.display())
            })?;
            let r = &clean.report;

            println!("\n📊 Validation Report:");
            println!("   Records loaded: {}", r.records_loaded);
            println!("   Duplicate claim lines: {}", r.duplicate_count);
            println!("   Unparseable values: {}", r.coercion.total_invalid());
            for (column, count) in r.coercion.invalid.iter().filter(|(_, c)| **c > 0) {
                println!("     {}: {}", column, count);
            }
            println!(
                "   Financial violations: {} ({:.2}%)",
                r.financial_violations,
                100.0 * r.financial_violation_rate().unwrap_or(0.0)
            );
            println!(
                "   Date violations: {} ({:.2}%)",
                r.date_violations,
                100.0 * r.date_violation_rate().unwrap_or(0.0)
            );
            println!("   Records in {}: {}", r.analysis_year, r.records_in_analysis_year);
            println!("   Clean records: {}", r.records_clean);

            clean.ensure_non_empty()?;
            println!("\n✅ Input is usable for analysis");
        }
        Commands::Pareto { limit } => {
            let outcome = Pipeline::run(&config).with_context(|| {
                format!("Analysis of {} failed", config.input_path.display())
            })?;

            println!("\n🎯 Top {} procedure codes by revenue leakage:", limit);
            println!("   {:<10} {:>16} {:>12} {:>10}", "HCPCS", "Leakage ($)", "Realization", "Cum. %");
            for p in outcome.tables.procedures.iter().take(limit) {
                println!(
                    "   {:<10} {:>16.2} {:>12} {:>10}",
                    p.procedure_code,
                    p.underpayment_amt,
                    p.realization_rate
                        .map_or_else(|| "n/a".to_string(), |r| format!("{:.1}%", 100.0 * r)),
                    p.cum_underpayment_pct
                        .map_or_else(|| "n/a".to_string(), |c| format!("{:.1}%", 100.0 * c))
                );
            }
        }
    }

    Ok(())
}
