use std::sync::Arc;

use roombook_core::config::{AppConfig, NotificationMode};
use roombook_core::notify::{DisabledNotifier, LoggingNotifier};
use roombook_core::{BookingService, BookingStore, Notifier, SessionMachine, SessionStore};
use roombook_db::{connect_with_settings, migrations, DbPool, SqlBookingStore, SqlSessionStore};
use thiserror::Error;
use tracing::info;

use crate::handlers::BookingTools;

pub struct Application {
    pub config: AppConfig,
    pub db_pool: DbPool,
    pub machine: Arc<SessionMachine>,
    pub tools: BookingTools,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("database connection failed: {0}")]
    DatabaseConnect(#[source] sqlx::Error),
    #[error("database migration failed: {0}")]
    Migration(#[source] sqlx::migrate::MigrateError),
}

pub fn notifier_for(config: &AppConfig) -> Arc<dyn Notifier> {
    match config.notifications.mode {
        NotificationMode::Log => {
            Arc::new(LoggingNotifier::new(config.notifications.from_address.clone()))
        }
        NotificationMode::Disabled => Arc::new(DisabledNotifier),
    }
}

/// Connects, migrates and wires the SQL stores into the session machine.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", correlation_id = "bootstrap", "starting bootstrap");

    let db_pool = connect_with_settings(
        &config.database.url,
        config.database.max_connections,
        config.database.timeout_secs,
    )
    .await
    .map_err(BootstrapError::DatabaseConnect)?;
    info!(
        event_name = "system.bootstrap.database_connected",
        correlation_id = "bootstrap",
        "database connection established"
    );

    migrations::run_pending(&db_pool).await.map_err(BootstrapError::Migration)?;
    info!(
        event_name = "system.bootstrap.migrations_applied",
        correlation_id = "bootstrap",
        "database migrations applied"
    );

    let bookings: Arc<dyn BookingStore> = Arc::new(SqlBookingStore::new(db_pool.clone()));
    let sessions: Arc<dyn SessionStore> = Arc::new(SqlSessionStore::new(db_pool.clone()));
    let machine = Arc::new(SessionMachine::new(
        BookingService::new(bookings, config.booking_policy()),
        sessions,
        config.session_settings(),
    ));
    let tools = BookingTools::new(
        machine.clone(),
        notifier_for(&config),
        config.notifications.reminder_minutes_before,
    );

    Ok(Application { config, db_pool, machine, tools })
}
