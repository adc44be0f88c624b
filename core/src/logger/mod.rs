//! Per-invocation log file lifecycle: one file per wrapper process under the
//! system temp directory, written through a single background flusher, with
//! a bounded in-memory cache of recent WARN/ERROR lines for the exit path.

pub mod cleanup;
pub mod layer;
pub mod process;

pub use cleanup::{cleanup_old_logs, CleanupEnv, CleanupFailure, CleanupStats, RealCleanupEnv};
pub use layer::WrapperLogLayer;

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tracing::Level;

/// Fixed filename prefix for wrapper log files.
pub const LOG_PREFIX: &str = "codeagent";

/// Most recent WARN/ERROR lines retained in memory.
const RECENT_ERRORS_CAP: usize = 100;

enum Command {
    Line(String),
    Flush(oneshot::Sender<()>),
}

struct LoggerInner {
    path: PathBuf,
    /// `None` once closed; logging becomes a no-op.
    tx: Mutex<Option<mpsc::UnboundedSender<Command>>>,
    recent: Mutex<VecDeque<String>>,
    worker: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

impl LoggerInner {
    fn sender(&self) -> Option<mpsc::UnboundedSender<Command>> {
        match self.tx.lock() {
            Ok(g) => g.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Handle to the wrapper's log file. Cloneable; all clones append to the
/// same file through one background writer.
#[derive(Clone)]
pub struct Logger {
    inner: Arc<LoggerInner>,
}

impl Logger {
    /// Opens `<tempDir>/codeagent-<pid>.log`.
    pub async fn new() -> std::io::Result<Self> {
        Self::create(None).await
    }

    /// Opens `<tempDir>/codeagent-<pid>-<sanitized-suffix>.log`.
    pub async fn with_suffix(suffix: &str) -> std::io::Result<Self> {
        Self::create(Some(suffix)).await
    }

    async fn create(suffix: Option<&str>) -> std::io::Result<Self> {
        let pid = std::process::id();
        let name = match suffix {
            Some(s) => format!("{LOG_PREFIX}-{pid}-{}.log", sanitize_log_suffix(s)),
            None => format!("{LOG_PREFIX}-{pid}.log"),
        };
        let path = std::env::temp_dir().join(name);

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();
        let worker = tokio::spawn(async move {
            while let Some(cmd) = rx.recv().await {
                match cmd {
                    Command::Line(line) => {
                        if file.write_all(line.as_bytes()).await.is_err() {
                            return;
                        }
                        if file.write_all(b"\n").await.is_err() {
                            return;
                        }
                    }
                    Command::Flush(ack) => {
                        let _ = file.flush().await;
                        let _ = ack.send(());
                    }
                }
            }
            let _ = file.flush().await;
        });

        Ok(Self {
            inner: Arc::new(LoggerInner {
                path,
                tx: Mutex::new(Some(tx)),
                recent: Mutex::new(VecDeque::with_capacity(RECENT_ERRORS_CAP)),
                worker: Mutex::new(Some(worker)),
            }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    pub fn log(&self, level: Level, msg: &str) {
        let line = format!(
            "[{}] [{level}] {msg}",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ"),
        );
        if let Some(tx) = self.inner.sender() {
            let _ = tx.send(Command::Line(line));
        }

        if level == Level::WARN || level == Level::ERROR {
            let mut recent = match self.inner.recent.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            if recent.len() == RECENT_ERRORS_CAP {
                recent.pop_front();
            }
            recent.push_back(msg.to_string());
        }
    }

    pub fn debug(&self, msg: &str) {
        self.log(Level::DEBUG, msg);
    }

    pub fn info(&self, msg: &str) {
        self.log(Level::INFO, msg);
    }

    pub fn warn(&self, msg: &str) {
        self.log(Level::WARN, msg);
    }

    pub fn error(&self, msg: &str) {
        self.log(Level::ERROR, msg);
    }

    /// Returns up to `max` of the most recent WARN/ERROR messages, oldest
    /// first.
    pub fn recent_errors(&self, max: usize) -> Vec<String> {
        if max == 0 {
            return Vec::new();
        }
        let recent = match self.inner.recent.lock() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let skip = recent.len().saturating_sub(max);
        recent.iter().skip(skip).cloned().collect()
    }

    /// Waits until everything sent so far reaches the file.
    pub async fn flush(&self) {
        let Some(tx) = self.inner.sender() else {
            return;
        };
        let (ack_tx, ack_rx) = oneshot::channel();
        if tx.send(Command::Flush(ack_tx)).is_ok() {
            let _ = ack_rx.await;
        }
    }

    /// Stops the background writer after draining pending lines. The file is
    /// retained for post-mortem inspection; [`Logger::remove_log_file`]
    /// deletes it explicitly.
    pub async fn close(&self) {
        self.flush().await;
        {
            let mut guard = match self.inner.tx.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take();
        }
        let worker = {
            let mut guard = match self.inner.worker.lock() {
                Ok(g) => g,
                Err(poisoned) => poisoned.into_inner(),
            };
            guard.take()
        };
        if let Some(worker) = worker {
            let _ = worker.await;
        }
    }

    pub fn remove_log_file(&self) -> std::io::Result<()> {
        match std::fs::remove_file(&self.inner.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err),
        }
    }
}

/// Maps a caller-provided suffix onto the filename-safe alphabet. Distinct
/// inputs stay distinct: unsafe characters are replaced one-for-one with
/// `_` rather than stripped.
pub fn sanitize_log_suffix(suffix: &str) -> String {
    let mut out: String = suffix
        .chars()
        .take(64)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if out.is_empty() {
        out.push_str("log");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_all_levels_to_file() {
        let logger = Logger::with_suffix("levels-test").await.unwrap();

        logger.info("info message");
        logger.warn("warn message");
        logger.debug("debug message");
        logger.error("error message");
        logger.flush().await;

        let content = std::fs::read_to_string(logger.path()).unwrap();
        for needle in ["info message", "warn message", "debug message", "error message"] {
            assert!(content.contains(needle), "missing {needle:?} in {content}");
        }
        assert!(content.contains("[INFO]"));
        assert!(content.contains("[ERROR]"));

        logger.close().await;
        let _ = logger.remove_log_file();
    }

    #[tokio::test]
    async fn file_name_carries_pid() {
        let logger = Logger::with_suffix("pid-test").await.unwrap();
        let name = logger.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with(&format!("{LOG_PREFIX}-{}-", std::process::id())));
        assert!(name.ends_with(".log"));
        logger.close().await;
        let _ = logger.remove_log_file();
    }

    #[tokio::test]
    async fn file_survives_close_and_remove_deletes_it() {
        let logger = Logger::with_suffix("close-test").await.unwrap();
        logger.info("before close");
        logger.flush().await;
        let path = logger.path().to_path_buf();

        logger.close().await;
        assert!(path.exists(), "log should be retained after close");

        logger.remove_log_file().unwrap();
        assert!(!path.exists());
        // Removing twice is fine.
        logger.remove_log_file().unwrap();
    }

    #[tokio::test]
    async fn concurrent_writers_lose_no_lines() {
        let logger = Logger::with_suffix("concurrent-test").await.unwrap();
        let mut handles = Vec::new();
        for g in 0..10 {
            let logger = logger.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..50 {
                    logger.debug(&format!("g{g}-{i}"));
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        logger.flush().await;

        let content = std::fs::read_to_string(logger.path()).unwrap();
        assert_eq!(content.lines().count(), 500);

        logger.close().await;
        let _ = logger.remove_log_file();
    }

    #[tokio::test]
    async fn recent_errors_keeps_warn_and_error_only() {
        let logger = Logger::with_suffix("recent-test").await.unwrap();
        logger.info("started");
        logger.warn("warning message");
        logger.error("error message");
        logger.debug("noise");

        assert_eq!(
            logger.recent_errors(10),
            vec!["warning message", "error message"]
        );
        assert_eq!(logger.recent_errors(1), vec!["error message"]);
        assert!(logger.recent_errors(0).is_empty());

        logger.close().await;
        let _ = logger.remove_log_file();
    }

    #[tokio::test]
    async fn recent_errors_cap_drops_oldest() {
        let logger = Logger::with_suffix("cap-test").await.unwrap();
        for i in 1..=150 {
            if i % 2 == 0 {
                logger.error(&format!("error-{i:03}"));
            } else {
                logger.warn(&format!("warn-{i:03}"));
            }
        }

        let all = logger.recent_errors(200);
        assert_eq!(all.len(), 100);
        assert!(all[0].contains("051"));
        assert!(all[99].contains("150"));

        logger.close().await;
        let _ = logger.remove_log_file();
    }

    #[test]
    fn sanitize_suffix_is_injective_for_near_misses() {
        let cases = ["task", "task.", ".task", "-task", "task-", "--task--", "..task.."];
        let mut seen = std::collections::HashMap::new();
        for input in cases {
            let result = sanitize_log_suffix(input);
            assert!(!result.is_empty());
            assert!(!result.contains(['/', '\\', ':', '*', '?', '"', '<', '>', '|']));
            if let Some(prev) = seen.insert(result.clone(), input) {
                panic!("collision: {input:?} and {prev:?} both map to {result:?}");
            }
        }
    }

    #[test]
    fn sanitize_suffix_replaces_unsafe_chars() {
        assert_eq!(sanitize_log_suffix("a/b:c"), "a_b_c");
        assert_eq!(sanitize_log_suffix(""), "log");
    }
}
