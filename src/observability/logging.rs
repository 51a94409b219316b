use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initializes the logging system with both console and file output.
///
/// Console output is human readable; the file under `log_dir` is JSON, one
/// event per line, rotated daily. The returned guard flushes the file writer
/// when dropped, so the caller keeps it alive for the whole run.
pub fn init_logging(log_dir: &Path) -> Option<WorkerGuard> {
    let file_layer = match fs::create_dir_all(log_dir) {
        Ok(()) => {
            let file_appender = tracing_appender::rolling::daily(log_dir, "rcm_analyzer.log");
            let (non_blocking_writer, guard) = tracing_appender::non_blocking(file_appender);
            Some((fmt::layer().json().with_writer(non_blocking_writer), guard))
        }
        Err(e) => {
            eprintln!("⚠️  Could not create log directory {}: {}", log_dir.display(), e);
            None
        }
    };

    let console_layer = fmt::layer().with_target(false).with_writer(std::io::stderr);

    // Respect RUST_LOG if set; otherwise info for our crate
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("rcm_analyzer=info,warn"));

    let (file_layer, guard) = match file_layer {
        Some((layer, guard)) => (Some(layer), Some(guard)),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(console_layer)
        .try_init();

    guard
}
