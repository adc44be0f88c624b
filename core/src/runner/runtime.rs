use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use tokio::io::AsyncWriteExt;

use crate::backend::{load_gemini_env, load_minimal_claude_settings, Backend, STDIN_SENTINEL};
use crate::config::{resolve_agent_config, resolve_backend_config, WrapperConfig};
use crate::error::RunnerError;
use crate::executor::cancel::CancelSignal;
use crate::executor::types::{TaskResult, TaskSpec};
use crate::stream::line_reader::{LineReader, RawLine};
use crate::stream::{parse_json_stream, NullObserver, StreamOutcome};
use crate::util::{safe_truncate, sanitize_output, truncate, TailBuffer};

use super::abort::{abort_sequence, DEFAULT_FORCE_KILL_GRACE};
use super::prompt::{read_agent_prompt_file, wrap_task_with_agent_prompt};
use super::report::extract_error_detail;
use super::session::{ChildSession, RunnerSession};
use super::stdin::should_use_stdin;

/// Exit code reported for tasks torn down by their deadline.
pub const EXIT_CODE_TIMEOUT: i32 = 124;
/// Exit code reported for tasks cancelled by the batch context.
pub const EXIT_CODE_CANCELLED: i32 = 130;

const STDERR_TAIL_BYTES: usize = 4096;
const STDERR_LOG_LINE_LIMIT: usize = 2000;
const ERROR_DETAIL_MAX_CHARS: usize = 500;

/// Runner knobs shared by single-task and parallel modes.
#[derive(Debug, Clone)]
pub struct RunnerOpts {
    /// Seconds until the child is torn down; 0 disables the deadline.
    pub timeout_secs: u64,
    /// Countdown between polite termination and the force kill.
    pub force_kill_grace: Duration,
    /// Reserved "allow outside" escape hatch for prompt-file confinement.
    pub allow_prompt_outside: bool,
}

impl Default for RunnerOpts {
    fn default() -> Self {
        Self {
            timeout_secs: 0,
            force_kill_grace: DEFAULT_FORCE_KILL_GRACE,
            allow_prompt_outside: false,
        }
    }
}

/// Runs one task to completion: builds the argv, launches the backend,
/// drains its streams and assembles the final result. Never panics and
/// never returns before the child is reaped.
pub async fn run_task(spec: &TaskSpec, cancel: CancelSignal, opts: &RunnerOpts) -> TaskResult {
    let backend = match Backend::select(&spec.backend) {
        Ok(backend) => backend,
        Err(err) => return TaskResult::failed(spec.id.clone(), 1, err.to_string()),
    };

    let mut task_text = spec.task.clone();
    if !spec.prompt_file.trim().is_empty() {
        let allow_outside = spec.prompt_file_explicit || opts.allow_prompt_outside;
        match read_agent_prompt_file(&spec.prompt_file, allow_outside) {
            Ok(prompt) if !prompt.is_empty() => {
                task_text = wrap_task_with_agent_prompt(&prompt, &task_text);
            }
            Ok(_) => {}
            Err(err) => {
                return TaskResult::failed(
                    spec.id.clone(),
                    1,
                    format!("failed to read prompt file: {err}"),
                )
            }
        }
    }

    let use_stdin = spec.use_stdin || should_use_stdin(&task_text, false);
    let target = if use_stdin {
        STDIN_SENTINEL.to_string()
    } else {
        task_text.clone()
    };

    let mut cfg = WrapperConfig {
        mode: if spec.mode.is_empty() {
            "new".to_string()
        } else {
            spec.mode.clone()
        },
        session_id: spec.session_id.clone(),
        workdir: spec.workdir.clone(),
        model: spec.model.clone(),
        reasoning_effort: spec.reasoning_effort.clone(),
        skip_permissions: spec.skip_permissions,
        yolo: spec.yolo,
        ..Default::default()
    };

    // Host-level backend config: claude settings may supply a model; both
    // claude and gemini may supply environment entries.
    let mut envs: HashMap<String, String> = HashMap::new();
    match backend {
        Backend::Claude => {
            let settings = load_minimal_claude_settings();
            if cfg.model.trim().is_empty() && !settings.model.is_empty() {
                cfg.model = settings.model;
            }
            envs.extend(settings.env);
        }
        Backend::Gemini => {
            envs.extend(load_gemini_env());
        }
        _ => {}
    }

    let (base_url, api_key) = if spec.agent.trim().is_empty() {
        resolve_backend_config(backend.name())
    } else {
        let resolved = resolve_agent_config(spec.agent.trim());
        (resolved.base_url, resolved.api_key)
    };
    envs.extend(backend.env(&base_url, &api_key));

    let args = backend.build_args(&cfg, &target);

    tracing::info!(
        task_id = %spec.id,
        backend = backend.name(),
        use_stdin,
        argc = args.len(),
        "launching backend"
    );

    let workdir = if spec.workdir.is_empty() {
        None
    } else {
        Some(Path::new(&spec.workdir))
    };

    let session = match ChildSession::spawn(backend.command(), &args, &envs, workdir, use_stdin) {
        Ok(session) => session,
        Err(err) => return TaskResult::failed(spec.id.clone(), 1, err.to_string()),
    };

    let stdin_payload = use_stdin.then(|| task_text.clone());

    let outcome = match drive_session(
        Box::new(session),
        stdin_payload,
        cancel,
        opts.timeout_secs,
        opts.force_kill_grace,
        backend.name(),
    )
    .await
    {
        Ok(outcome) => outcome,
        Err(err) => return TaskResult::failed(spec.id.clone(), 1, err.to_string()),
    };

    let mut result = TaskResult {
        task_id: spec.id.clone(),
        exit_code: outcome.exit_code,
        message: outcome.stream.message,
        session_id: outcome.stream.session_id,
        ..Default::default()
    };

    if outcome.timed_out {
        result.exit_code = EXIT_CODE_TIMEOUT;
        result.error = Some(format!("timeout after {}s", opts.timeout_secs));
    } else if outcome.cancelled {
        result.exit_code = EXIT_CODE_CANCELLED;
        result.error = Some("cancelled by parent".to_string());
    } else if result.exit_code != 0 {
        let tail = sanitize_output(outcome.stderr_tail.trim());
        let detail = if tail.is_empty() {
            extract_error_detail(&result.message, ERROR_DETAIL_MAX_CHARS)
        } else {
            safe_truncate(&tail, ERROR_DETAIL_MAX_CHARS)
        };
        result.error = Some(if detail.is_empty() {
            format!("exit code {}", result.exit_code)
        } else {
            detail
        });
    }

    tracing::info!(
        task_id = %result.task_id,
        exit_code = result.exit_code,
        message_len = result.message.len(),
        session_id = %result.session_id,
        "task finished"
    );

    result
}

pub(crate) struct SessionOutcome {
    pub exit_code: i32,
    pub stream: StreamOutcome,
    pub stderr_tail: String,
    pub timed_out: bool,
    pub cancelled: bool,
}

/// Drives a live session to a final state: feeds stdin, pumps both output
/// streams, enforces the deadline and propagates cancellation.
pub(crate) async fn drive_session(
    mut session: Box<dyn RunnerSession>,
    stdin_payload: Option<String>,
    mut cancel: CancelSignal,
    timeout_secs: u64,
    force_kill_grace: Duration,
    backend_name: &str,
) -> Result<SessionOutcome, RunnerError> {
    let stdout = session
        .stdout()
        .ok_or_else(|| RunnerError::Spawn("no stdout".into()))?;
    let stderr = session
        .stderr()
        .ok_or_else(|| RunnerError::Spawn("no stderr".into()))?;

    let stdout_task = tokio::spawn(async move {
        let mut observer = NullObserver;
        parse_json_stream(stdout, &mut observer).await
    });

    let tail = TailBuffer::new(STDERR_TAIL_BYTES);
    let tail_writer = tail.clone();
    let backend_label = backend_name.to_string();
    let stderr_task = tokio::spawn(async move {
        // Stderr is diagnostics only: mirrored line by line into the wrapper
        // log and kept as a bounded tail.
        let mut reader = LineReader::with_limits(stderr, 1024 * 1024, 256);
        loop {
            match reader.next_line().await {
                Ok(Some(RawLine::Complete)) => {
                    tail_writer.push(reader.line());
                    tail_writer.push(b"\n");
                    let line = String::from_utf8_lossy(reader.line());
                    tracing::info!(
                        "{} stderr: {}",
                        backend_label,
                        truncate(line.as_ref(), STDERR_LOG_LINE_LIMIT)
                    );
                }
                Ok(Some(RawLine::Oversized)) => {
                    tail_writer.push(reader.preview());
                    tail_writer.push(b"\n");
                    tracing::warn!("{} stderr: oversized line truncated", backend_label);
                }
                Ok(None) => break,
                Err(_) => break,
            }
        }
    });

    if let Some(payload) = stdin_payload {
        if let Some(mut stdin) = session.stdin() {
            tokio::spawn(async move {
                if let Err(err) = stdin.write_all(payload.as_bytes()).await {
                    tracing::warn!(error = %err, "failed to write task to child stdin");
                }
                let _ = stdin.shutdown().await;
            });
        }
    }

    let deadline = if timeout_secs > 0 {
        Duration::from_secs(timeout_secs)
    } else {
        // Effectively forever; tokio clamps far-future sleeps.
        Duration::from_secs(60 * 60 * 24 * 365 * 30)
    };

    enum WaitOutcome {
        Exited(i32),
        TimedOut,
        Cancelled,
    }

    // Resolve the race first; the wait future's borrow must end before the
    // teardown path can touch the session again.
    let outcome = {
        let wait_fut = session.wait();
        tokio::pin!(wait_fut);
        tokio::select! {
            res = &mut wait_fut => match res {
                Ok(code) => WaitOutcome::Exited(code),
                Err(err) => {
                    tracing::error!(error = %err, "wait on child failed");
                    WaitOutcome::Exited(-1)
                }
            },
            _ = tokio::time::sleep(deadline) => WaitOutcome::TimedOut,
            _ = cancel.cancelled() => WaitOutcome::Cancelled,
        }
    };

    let mut timed_out = false;
    let mut cancelled = false;
    let exit_code = match outcome {
        WaitOutcome::Exited(code) => code,
        WaitOutcome::TimedOut => {
            timed_out = true;
            tracing::warn!(timeout_secs, "deadline exceeded, tearing down child");
            abort_sequence(session.as_mut(), force_kill_grace).await
        }
        WaitOutcome::Cancelled => {
            cancelled = true;
            tracing::warn!("batch cancelled, tearing down child");
            abort_sequence(session.as_mut(), force_kill_grace).await
        }
    };

    // After a teardown the pipes may stay open if the child leaked
    // grandchildren; bound the drain so the deadline guarantee holds.
    let stream = if timed_out || cancelled {
        match tokio::time::timeout(Duration::from_secs(2), stdout_task).await {
            Ok(joined) => joined.unwrap_or_default(),
            Err(_) => StreamOutcome::default(),
        }
    } else {
        stdout_task.await.unwrap_or_default()
    };
    if timed_out || cancelled {
        let _ = tokio::time::timeout(Duration::from_secs(2), stderr_task).await;
    } else {
        let _ = stderr_task.await;
    }

    Ok(SessionOutcome {
        exit_code,
        stream,
        stderr_tail: tail.to_string_lossy(),
        timed_out,
        cancelled,
    })
}
