use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

use crate::error::RunnerError;

/// One live child process and its pipes. The trait seam lets tests drive the
/// runtime with scripted sessions.
#[async_trait]
pub trait RunnerSession: Send {
    fn stdin(&mut self) -> Option<Box<dyn AsyncWrite + Unpin + Send>>;
    fn stdout(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>>;
    fn stderr(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>>;

    /// Polite termination: SIGTERM on Unix, process-terminate elsewhere.
    async fn terminate(&mut self) -> anyhow::Result<()>;

    /// Unconditional kill.
    async fn kill(&mut self) -> anyhow::Result<()>;

    /// Reaps the child and returns its exit code (-1 when unavailable, e.g.
    /// killed by a signal).
    async fn wait(&mut self) -> anyhow::Result<i32>;
}

#[derive(Debug)]
pub struct ChildSession {
    child: Child,
}

impl ChildSession {
    /// Spawns a backend process with piped stdout/stderr. `piped_stdin`
    /// controls whether stdin is piped (for stdin-mode tasks) or closed.
    pub fn spawn(
        command: &str,
        args: &[String],
        envs: &HashMap<String, String>,
        workdir: Option<&Path>,
        piped_stdin: bool,
    ) -> Result<Self, RunnerError> {
        if which::which(command).is_err() {
            return Err(RunnerError::CommandNotFound(command.to_string()));
        }

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(envs)
            .stdin(if piped_stdin {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(|e| RunnerError::Spawn(e.to_string()))?;
        Ok(Self { child })
    }
}

#[async_trait]
impl RunnerSession for ChildSession {
    fn stdin(&mut self) -> Option<Box<dyn AsyncWrite + Unpin + Send>> {
        self.child
            .stdin
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncWrite + Unpin + Send>)
    }

    fn stdout(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>> {
        self.child
            .stdout
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncRead + Unpin + Send>)
    }

    fn stderr(&mut self) -> Option<Box<dyn AsyncRead + Unpin + Send>> {
        self.child
            .stderr
            .take()
            .map(|s| Box::new(s) as Box<dyn AsyncRead + Unpin + Send>)
    }

    #[cfg(unix)]
    async fn terminate(&mut self) -> anyhow::Result<()> {
        if let Some(pid) = self.child.id() {
            let ret = unsafe { libc::kill(pid as i32, libc::SIGTERM) };
            if ret != 0 {
                return Err(std::io::Error::last_os_error().into());
            }
        }
        Ok(())
    }

    #[cfg(not(unix))]
    async fn terminate(&mut self) -> anyhow::Result<()> {
        self.child.start_kill()?;
        Ok(())
    }

    async fn kill(&mut self) -> anyhow::Result<()> {
        self.child.kill().await?;
        Ok(())
    }

    async fn wait(&mut self) -> anyhow::Result<i32> {
        let status = self.child.wait().await?;
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_unknown_command_reports_not_found() {
        let err = ChildSession::spawn(
            "definitely-not-a-real-binary-2a9f",
            &[],
            &HashMap::new(),
            None,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, RunnerError::CommandNotFound(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn spawn_wait_collects_exit_code() {
        let mut session = ChildSession::spawn(
            "sh",
            &["-c".to_string(), "exit 7".to_string()],
            &HashMap::new(),
            None,
            false,
        )
        .unwrap();
        assert_eq!(session.wait().await.unwrap(), 7);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn terminate_stops_a_sleeping_child() {
        let mut session = ChildSession::spawn(
            "sh",
            &["-c".to_string(), "sleep 30".to_string()],
            &HashMap::new(),
            None,
            false,
        )
        .unwrap();
        session.terminate().await.unwrap();
        let code = session.wait().await.unwrap();
        assert_ne!(code, 0);
    }
}
