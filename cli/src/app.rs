//! Single-task and parallel entrypoints, bridging the CLI surface to the
//! core runner and executor.

use std::io::{IsTerminal, Read};

use codeagent_core::api::{
    execute_batch, parse_parallel_config, populate_report_fields, resolve_max_parallel_workers,
    resolve_timeout, run_task, Backend, CancelSignal, ExecOptions, Logger, RunnerOpts, TaskSpec,
    WrapperConfig,
};
use codeagent_core::runner::stdin_reasons;

use crate::cli::Args;
use crate::settings::{FileConfig, ResolvedSettings};

const DEFAULT_COVERAGE_TARGET: f64 = 90.0;

/// Runs one task and streams the outcome to stdout. Returns the process
/// exit code.
pub async fn run_single_mode(settings: ResolvedSettings, logger: &Logger) -> i32 {
    let backend = match Backend::select(&settings.backend) {
        Ok(backend) => backend,
        Err(err) => {
            tracing::error!("{err}");
            return 1;
        }
    };

    let timeout_secs = resolve_timeout();
    tracing::info!(timeout_secs, backend = backend.name(), "script started");

    let mut task_text = settings.task.clone();
    let mut piped = false;

    if settings.explicit_stdin {
        tracing::info!("explicit stdin mode: reading task from stdin");
        let mut buf = String::new();
        if let Err(err) = std::io::stdin().read_to_string(&mut buf) {
            tracing::error!("failed to read stdin: {err}");
            return 1;
        }
        if buf.is_empty() {
            tracing::error!("explicit stdin mode requires task input from stdin");
            return 1;
        }
        task_text = buf;
        piped = !std::io::stdin().is_terminal();
    } else if !std::io::stdin().is_terminal() {
        let mut buf = String::new();
        if let Err(err) = std::io::stdin().read_to_string(&mut buf) {
            tracing::error!("failed to read piped stdin: {err}");
            return 1;
        }
        if !buf.is_empty() {
            task_text = buf;
            piped = true;
        }
    }

    // Banner for the human watching stderr; the child owns stdout.
    let banner_cfg = WrapperConfig {
        mode: settings.mode.clone(),
        session_id: settings.session_id.clone(),
        workdir: settings.workdir.clone(),
        model: settings.model.clone(),
        reasoning_effort: settings.reasoning_effort.clone(),
        skip_permissions: settings.skip_permissions,
        yolo: settings.yolo,
        ..Default::default()
    };
    let banner_args = backend.build_args(&banner_cfg, "<task>");
    eprintln!("[codeagent]");
    eprintln!("  Backend: {}", backend.name());
    eprintln!("  Command: {} {}", backend.command(), banner_args.join(" "));
    eprintln!("  PID: {}", std::process::id());
    eprintln!("  Log: {}", logger.path().display());

    let use_stdin = settings.explicit_stdin || piped;
    let reasons = stdin_reasons(&task_text, piped, settings.explicit_stdin);
    if !reasons.is_empty() {
        tracing::warn!("using stdin mode for task due to: {}", reasons.join(", "));
    }

    let spec = TaskSpec {
        id: "single".to_string(),
        task: task_text,
        workdir: settings.workdir.clone(),
        session_id: settings.session_id.clone(),
        backend: backend.name().to_string(),
        model: settings.model.clone(),
        reasoning_effort: settings.reasoning_effort.clone(),
        agent: settings.agent.clone(),
        prompt_file: settings.prompt_file.clone(),
        prompt_file_explicit: settings.prompt_file_explicit,
        skip_permissions: settings.skip_permissions,
        yolo: settings.yolo,
        mode: settings.mode.clone(),
        use_stdin,
        ..Default::default()
    };

    tracing::info!("{} running...", backend.name());

    let opts = RunnerOpts {
        timeout_secs,
        ..Default::default()
    };
    let result = run_task(&spec, CancelSignal::never(), &opts).await;

    if result.exit_code != 0 {
        if let Some(error) = &result.error {
            tracing::error!("task failed: {error}");
        }
        return result.exit_code;
    }

    println!("{}", result.message);
    if !result.session_id.is_empty() {
        println!("\n---\nSESSION_ID: {}", result.session_id);
    }

    0
}

/// Reads task blocks from stdin, executes the graph and prints the
/// aggregated JSON report. Returns the process exit code.
pub async fn run_parallel_mode(args: &Args, file: &FileConfig, logger: &Logger) -> i32 {
    if !args.args.is_empty() {
        eprintln!("ERROR: --parallel reads its task configuration from stdin; no positional arguments are allowed.");
        eprintln!("Usage examples:");
        eprintln!("  codeagent --parallel < tasks.txt");
        eprintln!("  echo '...' | codeagent --parallel");
        eprintln!("  codeagent --parallel --full-output < tasks.txt  # include full task output");
        return 1;
    }

    if args.agent.is_some() || args.prompt_file.is_some() || args.reasoning_effort.is_some() {
        eprintln!("ERROR: --parallel reads its task configuration from stdin; only --backend, --model, --full-output and --skip-permissions are allowed.");
        return 1;
    }

    let backend_name = match &args.backend {
        Some(value) => {
            let value = value.trim();
            if value.is_empty() {
                eprintln!("ERROR: --backend flag requires a value");
                return 1;
            }
            value.to_string()
        }
        None => crate::settings::env_setting("backend")
            .or_else(|| file.backend.clone())
            .unwrap_or_default()
            .trim()
            .to_string(),
    };
    let backend_name = if backend_name.is_empty() {
        crate::settings::DEFAULT_BACKEND.to_string()
    } else {
        backend_name
    };

    let backend = match Backend::select(&backend_name) {
        Ok(backend) => backend,
        Err(err) => {
            eprintln!("ERROR: {err}");
            return 1;
        }
    };

    let model = match &args.model {
        Some(value) => {
            let value = value.trim();
            if value.is_empty() {
                eprintln!("ERROR: --model flag requires a value");
                return 1;
            }
            value.to_string()
        }
        None => crate::settings::env_setting("model")
            .or_else(|| file.model.clone())
            .unwrap_or_default()
            .trim()
            .to_string(),
    };

    let skip_permissions = args.skip_permissions
        || crate::settings::env_setting("skip-permissions")
            .map(|v| codeagent_core::api::parse_bool_flag(&v, false))
            .unwrap_or_else(|| file.skip_permissions.unwrap_or(false));

    let full_output = args.full_output || file.full_output.unwrap_or(false);

    let mut input = String::new();
    if let Err(err) = std::io::stdin().read_to_string(&mut input) {
        eprintln!("ERROR: failed to read stdin: {err}");
        return 1;
    }

    let mut cfg = match parse_parallel_config(&input) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("ERROR: {err}");
            return 1;
        }
    };

    cfg.global_backend = backend.name().to_string();
    for task in &mut cfg.tasks {
        if task.backend.trim().is_empty() {
            task.backend = backend.name().to_string();
        }
        if task.model.trim().is_empty() && !model.is_empty() {
            task.model = model.clone();
        }
        task.skip_permissions = task.skip_permissions || skip_permissions;
    }

    let exec_opts = ExecOptions {
        timeout_secs: resolve_timeout(),
        max_parallel: resolve_max_parallel_workers(),
        fail_fast: false,
    };

    let run = |spec: TaskSpec, timeout: u64, cancel: CancelSignal| async move {
        let opts = RunnerOpts {
            timeout_secs: timeout,
            ..Default::default()
        };
        run_task(&spec, cancel, &opts).await
    };

    let mut results = match execute_batch(cfg.tasks, &exec_opts, run).await {
        Ok(results) => results,
        Err(err) => {
            eprintln!("ERROR: {err}");
            return 1;
        }
    };

    let log_path = logger.path().display().to_string();
    for result in &mut results {
        result.coverage_target = DEFAULT_COVERAGE_TARGET;
        result.log_path = log_path.clone();
        populate_report_fields(result);
        if !full_output {
            result.message = String::new();
        }
    }

    match serde_json::to_string_pretty(&results) {
        Ok(report) => println!("{report}"),
        Err(err) => {
            eprintln!("ERROR: failed to render report: {err}");
            return 1;
        }
    }

    // Deterministic by insertion order: the last non-zero code wins.
    let mut exit_code = 0;
    for result in &results {
        if result.exit_code != 0 {
            exit_code = result.exit_code;
        }
    }
    exit_code
}

/// Scans the temp directory for orphaned wrapper logs.
pub fn run_cleanup_mode() -> i32 {
    use codeagent_core::api::{cleanup_old_logs, RealCleanupEnv};

    match cleanup_old_logs(&RealCleanupEnv, &std::env::temp_dir()) {
        Ok(stats) => {
            println!(
                "Cleanup: scanned={} deleted={} kept={} errors={}",
                stats.scanned, stats.deleted, stats.kept, stats.errors
            );
            0
        }
        Err(failure) => {
            eprintln!("ERROR: {failure}");
            eprintln!(
                "Cleanup: scanned={} deleted={} kept={} errors={}",
                failure.stats.scanned, failure.stats.deleted, failure.stats.kept,
                failure.stats.errors
            );
            1
        }
    }
}
