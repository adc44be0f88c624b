//! Reclamation of log files left behind by dead wrapper processes.
//!
//! The liveness rule is layered because PIDs are reused: a file is
//! collectible when its embedded PID is gone, or when the PID is alive but
//! provably belongs to a younger process than the file. Every inspection
//! failure resolves to "keep".

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use super::process;
use super::LOG_PREFIX;

/// Files older than this with an unknowable owner start time are treated as
/// orphans.
const STALE_FILE_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Filesystem and process probes used by the cleanup scan. The default
/// methods hit the real system; tests override the pieces they need.
pub trait CleanupEnv {
    fn list_logs(&self, temp_dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(temp_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if name.starts_with(&format!("{LOG_PREFIX}-")) && name.ends_with(".log") {
                out.push(entry.path());
            }
        }
        Ok(out)
    }

    fn is_running(&self, pid: u32) -> bool {
        process::is_process_running(pid)
    }

    fn start_time(&self, pid: u32) -> Option<SystemTime> {
        process::process_start_time(pid)
    }

    fn modified(&self, path: &Path) -> std::io::Result<SystemTime> {
        std::fs::metadata(path)?.modified()
    }

    fn is_symlink(&self, path: &Path) -> std::io::Result<bool> {
        Ok(std::fs::symlink_metadata(path)?.file_type().is_symlink())
    }

    fn resolve(&self, path: &Path) -> std::io::Result<PathBuf> {
        std::fs::canonicalize(path)
    }

    fn remove(&self, path: &Path) -> std::io::Result<()> {
        std::fs::remove_file(path)
    }
}

/// Production probe set.
pub struct RealCleanupEnv;

impl CleanupEnv for RealCleanupEnv {}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CleanupStats {
    pub scanned: usize,
    pub deleted: usize,
    pub kept: usize,
    pub errors: usize,
    pub deleted_files: Vec<String>,
    pub kept_files: Vec<String>,
}

/// A scan that could not complete cleanly. Partial progress is preserved in
/// `stats`.
#[derive(Debug, thiserror::Error)]
#[error("log cleanup incomplete: {message}")]
pub struct CleanupFailure {
    pub stats: CleanupStats,
    pub message: String,
}

/// Extracts the wrapper PID from `codeagent-<pid>[-suffix].log`.
/// Non-positive, non-numeric and out-of-range values are rejected.
pub fn parse_pid_from_log(file_name: &str) -> Option<u32> {
    let rest = file_name
        .strip_prefix(LOG_PREFIX)?
        .strip_prefix('-')?
        .strip_suffix(".log")?;
    let digits = match rest.find('-') {
        Some(pos) => &rest[..pos],
        None => rest,
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let pid: u64 = digits.parse().ok()?;
    if pid == 0 || pid > i32::MAX as u64 {
        return None;
    }
    Some(pid as u32)
}

/// PID-reuse check: the file predates the process that currently owns its
/// PID. A stat failure keeps the file.
fn is_pid_reused(env: &dyn CleanupEnv, path: &Path, pid: u32) -> bool {
    let Ok(mtime) = env.modified(path) else {
        return false;
    };
    match env.start_time(pid) {
        Some(start) => mtime < start,
        None => match mtime.elapsed() {
            Ok(age) => age > STALE_FILE_AGE,
            Err(_) => false,
        },
    }
}

/// Pre-unlink safety gate. Returns the refusal reason, or `None` when the
/// file may be deleted.
fn is_unsafe_file(env: &dyn CleanupEnv, path: &Path, resolved_temp_dir: &Path) -> Option<&'static str> {
    match env.is_symlink(path) {
        Ok(true) => return Some("refusing to delete symlink"),
        Ok(false) => {}
        Err(_) => return Some("stat failed"),
    }

    let Ok(resolved) = env.resolve(path) else {
        return Some("failed to resolve path");
    };
    if !resolved.starts_with(resolved_temp_dir) {
        return Some("file is outside tempDir");
    }
    None
}

/// Scans `temp_dir` for wrapper log files and removes the ones whose owning
/// process is gone. Unlink failures are aggregated; a listing failure is
/// fail-closed (zero stats, nothing deleted).
pub fn cleanup_old_logs(
    env: &dyn CleanupEnv,
    temp_dir: &Path,
) -> Result<CleanupStats, CleanupFailure> {
    let mut stats = CleanupStats::default();

    let files = match env.list_logs(temp_dir) {
        Ok(files) => files,
        Err(err) => {
            return Err(CleanupFailure {
                stats,
                message: format!("failed to list log files: {err}"),
            })
        }
    };

    let resolved_temp_dir = env
        .resolve(temp_dir)
        .unwrap_or_else(|_| temp_dir.to_path_buf());

    let mut failures: Vec<String> = Vec::new();

    for path in files {
        stats.scanned += 1;
        let display_str = path.display().to_string();

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let Some(pid) = parse_pid_from_log(&file_name) else {
            stats.kept += 1;
            stats.kept_files.push(display_str);
            continue;
        };

        let reclaimable = !env.is_running(pid) || is_pid_reused(env, &path, pid);
        if !reclaimable {
            stats.kept += 1;
            stats.kept_files.push(display_str);
            continue;
        }

        if let Some(reason) = is_unsafe_file(env, &path, &resolved_temp_dir) {
            tracing::warn!(path = %display_str, reason, "skipping log file");
            stats.kept += 1;
            stats.kept_files.push(display_str);
            continue;
        }

        match env.remove(&path) {
            Ok(()) => {
                stats.deleted += 1;
                stats.deleted_files.push(display_str);
            }
            Err(err) => {
                stats.errors += 1;
                failures.push(format!("{display_str}: {err}"));
            }
        }
    }

    if failures.is_empty() {
        Ok(stats)
    } else {
        Err(CleanupFailure {
            stats,
            message: failures.join("; "),
        })
    }
}
