use std::path::Path;
use std::sync::Arc;

use chrono::Utc;
use roombook_core::{BookingService, SessionMachine};
use roombook_db::{SqlBookingStore, SqlSessionStore};
use tracing::info;

use crate::commands::{open_migrated, run_with_config, CommandResult};

pub fn run(config_path: Option<&Path>) -> CommandResult {
    let result = run_with_config("sweep-sessions", config_path, |config| async move {
        let pool = open_migrated(&config).await?;
        let machine = SessionMachine::new(
            BookingService::new(
                Arc::new(SqlBookingStore::new(pool.clone())),
                config.booking_policy(),
            ),
            Arc::new(SqlSessionStore::new(pool.clone())),
            config.session_settings(),
        );

        let removed = machine
            .expire(Utc::now())
            .await
            .map_err(|error| (error.error_class(), error.to_string(), 5u8));
        pool.close().await;
        removed
    });

    match result {
        Ok(removed) => {
            info!(event_name = "cli.sessions_swept", removed, "expired sessions removed");
            CommandResult::success("sweep-sessions", format!("removed {removed} expired sessions"))
        }
        Err(failure) => failure,
    }
}
