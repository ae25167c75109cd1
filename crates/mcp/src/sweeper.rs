use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use roombook_core::SessionMachine;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Periodically removes expired dialog sessions. The first sweep runs one interval
/// after start.
pub fn spawn_session_sweeper(machine: Arc<SessionMachine>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every.max(Duration::from_secs(1)));
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match machine.expire(Utc::now()).await {
                Ok(removed) => {
                    debug!(event_name = "session.sweep_completed", removed, "session sweep completed")
                }
                Err(error) => warn!(
                    event_name = "session.sweep_failed",
                    error_class = error.error_class(),
                    error = %error,
                    "session sweep failed"
                ),
            }
        }
    })
}
