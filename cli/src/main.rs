//! Binary entrypoint: parses flags, loads settings, initializes the wrapper
//! log and tracing, and dispatches to single, parallel or cleanup mode.

use clap::Parser;

use codeagent_core::api::{cleanup_old_logs, Logger, RealCleanupEnv, WrapperLogLayer};
use codeagent_cli::app;
use codeagent_cli::cli::Args;
use codeagent_cli::settings;

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() {
    let args = Args::parse();
    let raw_argv: Vec<String> = std::env::args().skip(1).collect();

    // Leading command words mirror the flag forms.
    let leading = args.args.first().map(String::as_str);
    if args.version || leading == Some("version") {
        println!("codeagent version {VERSION}");
        return;
    }
    if args.cleanup || leading == Some("cleanup") {
        std::process::exit(app::run_cleanup_mode());
    }

    std::process::exit(real_main(args, raw_argv).await);
}

async fn real_main(args: Args, raw_argv: Vec<String>) -> i32 {
    let logger = match Logger::new().await {
        Ok(logger) => logger,
        Err(err) => {
            eprintln!("ERROR: failed to initialize logger: {err}");
            return 1;
        }
    };

    if let Err(err) = init_tracing(&logger) {
        eprintln!("ERROR: failed to initialize logging: {err}");
        return 1;
    }

    // Reclaim logs left behind by dead predecessor runs.
    tokio::task::spawn_blocking(|| {
        match cleanup_old_logs(&RealCleanupEnv, &std::env::temp_dir()) {
            Ok(stats) if stats.deleted > 0 => {
                tracing::info!(deleted = stats.deleted, "removed stale log files")
            }
            Ok(_) => {}
            Err(failure) => tracing::warn!("startup log cleanup incomplete: {failure}"),
        }
    });

    let file_config = match settings::load_file_config(args.config.as_deref()) {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::error!("{err}");
            finish(&logger, 1).await;
            return 1;
        }
    };

    let exit_code = if args.parallel {
        app::run_parallel_mode(&args, &file_config, &logger).await
    } else {
        match settings::resolve_settings(&args, &raw_argv, &file_config, &args.args) {
            Ok(resolved) => {
                tracing::info!(
                    mode = %resolved.mode,
                    backend = %resolved.backend,
                    task_len = resolved.task.len(),
                    "parsed args"
                );
                app::run_single_mode(resolved, &logger).await
            }
            Err(err) => {
                tracing::error!("{err}");
                1
            }
        }
    };

    finish(&logger, exit_code).await;
    exit_code
}

/// Flushes the log and, on failure, surfaces the recent WARN/ERROR lines.
/// The log file is removed only after a clean run.
async fn finish(logger: &Logger, exit_code: i32) {
    logger.close().await;

    if exit_code != 0 {
        let entries = logger.recent_errors(10);
        if !entries.is_empty() {
            eprintln!("\n=== Recent Errors ===");
            for entry in entries {
                eprintln!("{entry}");
            }
        }
        eprintln!("Log file: {}", logger.path().display());
        return;
    }

    if let Err(err) = logger.remove_log_file() {
        eprintln!("WARN: failed to remove log file: {err}");
    }
}

fn init_tracing(logger: &Logger) -> Result<(), String> {
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.trim().is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::try_new("info").map_err(|e| e.to_string())?,
    };

    // Console output is opt-in; the log file is the primary sink and stderr
    // stays reserved for the banner and final error summary.
    let console_layer = std::env::var_os("RUST_LOG").map(|_| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(WrapperLogLayer::new(logger.clone()))
        .with(console_layer)
        .try_init()
        .map_err(|e| e.to_string())
}
