use std::time::Duration;

use super::session::RunnerSession;

/// Default countdown between polite termination and the unconditional kill.
pub const DEFAULT_FORCE_KILL_GRACE: Duration = Duration::from_secs(5);

/// Tears a child down: polite signal, bounded grace, then force kill. Always
/// reaps the child before returning so no zombie survives the runner.
pub async fn abort_sequence(session: &mut dyn RunnerSession, grace: Duration) -> i32 {
    if let Err(err) = session.terminate().await {
        tracing::warn!(error = %err, "failed to send termination signal");
    }

    match tokio::time::timeout(grace, session.wait()).await {
        Ok(Ok(code)) => return code,
        Ok(Err(err)) => {
            tracing::warn!(error = %err, "wait after terminate failed");
            return -1;
        }
        Err(_) => {
            tracing::warn!(grace_ms = grace.as_millis() as u64, "grace expired, force killing");
        }
    }

    if let Err(err) = session.kill().await {
        tracing::warn!(error = %err, "force kill failed");
    }
    match session.wait().await {
        Ok(code) => code,
        Err(_) => -1,
    }
}
