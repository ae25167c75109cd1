use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::booking::extractor::is_valid_email;
use crate::booking::policy::BookingPolicy;
use crate::flows::engine::SessionSettings;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub booking: BookingConfig,
    pub sessions: SessionsConfig,
    pub notifications: NotificationsConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub max_duration_minutes: u32,
    pub max_participants: u32,
    pub cancellation_notice_minutes: u32,
    pub title_max_chars: u32,
}

#[derive(Clone, Debug)]
pub struct SessionsConfig {
    pub expiry_hours: u32,
    pub sweep_interval_secs: u64,
}

#[derive(Clone, Debug)]
pub struct NotificationsConfig {
    pub mode: NotificationMode,
    pub from_address: String,
    pub reminder_minutes_before: u32,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationMode {
    /// Messages are rendered and written to the log.
    Log,
    Disabled,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub log_format: Option<LogFormat>,
    pub notification_mode: Option<NotificationMode>,
    pub session_expiry_hours: Option<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://roombook.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            booking: BookingConfig {
                max_duration_minutes: 480,
                max_participants: 50,
                cancellation_notice_minutes: 60,
                title_max_chars: 50,
            },
            sessions: SessionsConfig { expiry_hours: 24, sweep_interval_secs: 3600 },
            notifications: NotificationsConfig {
                mode: NotificationMode::Log,
                from_address: "meeting-system@company.com".to_string(),
                reminder_minutes_before: 30,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl std::str::FromStr for NotificationMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "log" | "mock" => Ok(Self::Log),
            "disabled" | "off" => Ok(Self::Disabled),
            other => Err(ConfigError::Validation(format!(
                "unsupported notification mode `{other}` (expected log|disabled)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl BookingConfig {
    pub fn policy(&self) -> BookingPolicy {
        BookingPolicy {
            max_duration: Duration::minutes(i64::from(self.max_duration_minutes)),
            max_participants: self.max_participants as usize,
            cancellation_notice: Duration::minutes(i64::from(self.cancellation_notice_minutes)),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("roombook.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    pub fn booking_policy(&self) -> BookingPolicy {
        self.booking.policy()
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            expiry: Duration::hours(i64::from(self.sessions.expiry_hours)),
            title_max_chars: self.booking.title_max_chars as usize,
        }
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(booking) = patch.booking {
            if let Some(max_duration_minutes) = booking.max_duration_minutes {
                self.booking.max_duration_minutes = max_duration_minutes;
            }
            if let Some(max_participants) = booking.max_participants {
                self.booking.max_participants = max_participants;
            }
            if let Some(cancellation_notice_minutes) = booking.cancellation_notice_minutes {
                self.booking.cancellation_notice_minutes = cancellation_notice_minutes;
            }
            if let Some(title_max_chars) = booking.title_max_chars {
                self.booking.title_max_chars = title_max_chars;
            }
        }

        if let Some(sessions) = patch.sessions {
            if let Some(expiry_hours) = sessions.expiry_hours {
                self.sessions.expiry_hours = expiry_hours;
            }
            if let Some(sweep_interval_secs) = sessions.sweep_interval_secs {
                self.sessions.sweep_interval_secs = sweep_interval_secs;
            }
        }

        if let Some(notifications) = patch.notifications {
            if let Some(mode) = notifications.mode {
                self.notifications.mode = mode;
            }
            if let Some(from_address) = notifications.from_address {
                self.notifications.from_address = from_address;
            }
            if let Some(reminder_minutes_before) = notifications.reminder_minutes_before {
                self.notifications.reminder_minutes_before = reminder_minutes_before;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("ROOMBOOK_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("ROOMBOOK_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("ROOMBOOK_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("ROOMBOOK_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("ROOMBOOK_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("ROOMBOOK_BOOKING_MAX_DURATION_MINUTES") {
            self.booking.max_duration_minutes =
                parse_u32("ROOMBOOK_BOOKING_MAX_DURATION_MINUTES", &value)?;
        }
        if let Some(value) = read_env("ROOMBOOK_BOOKING_MAX_PARTICIPANTS") {
            self.booking.max_participants =
                parse_u32("ROOMBOOK_BOOKING_MAX_PARTICIPANTS", &value)?;
        }
        if let Some(value) = read_env("ROOMBOOK_BOOKING_CANCELLATION_NOTICE_MINUTES") {
            self.booking.cancellation_notice_minutes =
                parse_u32("ROOMBOOK_BOOKING_CANCELLATION_NOTICE_MINUTES", &value)?;
        }
        if let Some(value) = read_env("ROOMBOOK_BOOKING_TITLE_MAX_CHARS") {
            self.booking.title_max_chars = parse_u32("ROOMBOOK_BOOKING_TITLE_MAX_CHARS", &value)?;
        }

        if let Some(value) = read_env("ROOMBOOK_SESSIONS_EXPIRY_HOURS") {
            self.sessions.expiry_hours = parse_u32("ROOMBOOK_SESSIONS_EXPIRY_HOURS", &value)?;
        }
        if let Some(value) = read_env("ROOMBOOK_SESSIONS_SWEEP_INTERVAL_SECS") {
            self.sessions.sweep_interval_secs =
                parse_u64("ROOMBOOK_SESSIONS_SWEEP_INTERVAL_SECS", &value)?;
        }

        if let Some(value) = read_env("ROOMBOOK_NOTIFICATIONS_MODE") {
            self.notifications.mode = value.parse()?;
        }
        if let Some(value) = read_env("ROOMBOOK_NOTIFICATIONS_FROM_ADDRESS") {
            self.notifications.from_address = value;
        }
        if let Some(value) = read_env("ROOMBOOK_NOTIFICATIONS_REMINDER_MINUTES_BEFORE") {
            self.notifications.reminder_minutes_before =
                parse_u32("ROOMBOOK_NOTIFICATIONS_REMINDER_MINUTES_BEFORE", &value)?;
        }

        let log_level =
            read_env("ROOMBOOK_LOGGING_LEVEL").or_else(|| read_env("ROOMBOOK_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("ROOMBOOK_LOGGING_FORMAT").or_else(|| read_env("ROOMBOOK_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(log_format) = overrides.log_format {
            self.logging.format = log_format;
        }
        if let Some(mode) = overrides.notification_mode {
            self.notifications.mode = mode;
        }
        if let Some(expiry_hours) = overrides.session_expiry_hours {
            self.sessions.expiry_hours = expiry_hours;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_booking(&self.booking)?;
        validate_sessions(&self.sessions)?;
        validate_notifications(&self.notifications)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("roombook.toml"), PathBuf::from("config/roombook.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    if booking.max_duration_minutes == 0 {
        return Err(ConfigError::Validation(
            "booking.max_duration_minutes must be greater than zero".to_string(),
        ));
    }
    if booking.max_participants == 0 {
        return Err(ConfigError::Validation(
            "booking.max_participants must be greater than zero".to_string(),
        ));
    }
    if booking.title_max_chars == 0 {
        return Err(ConfigError::Validation(
            "booking.title_max_chars must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_sessions(sessions: &SessionsConfig) -> Result<(), ConfigError> {
    if sessions.expiry_hours == 0 {
        return Err(ConfigError::Validation(
            "sessions.expiry_hours must be greater than zero".to_string(),
        ));
    }
    if sessions.sweep_interval_secs == 0 {
        return Err(ConfigError::Validation(
            "sessions.sweep_interval_secs must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_notifications(notifications: &NotificationsConfig) -> Result<(), ConfigError> {
    if !is_valid_email(notifications.from_address.trim()) {
        return Err(ConfigError::Validation(format!(
            "notifications.from_address `{}` is not a valid email address",
            notifications.from_address
        )));
    }
    if notifications.reminder_minutes_before == 0 {
        return Err(ConfigError::Validation(
            "notifications.reminder_minutes_before must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    booking: Option<BookingPatch>,
    sessions: Option<SessionsPatch>,
    notifications: Option<NotificationsPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    max_duration_minutes: Option<u32>,
    max_participants: Option<u32>,
    cancellation_notice_minutes: Option<u32>,
    title_max_chars: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct SessionsPatch {
    expiry_hours: Option<u32>,
    sweep_interval_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct NotificationsPatch {
    mode: Option<NotificationMode>,
    from_address: Option<String>,
    reminder_minutes_before: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
