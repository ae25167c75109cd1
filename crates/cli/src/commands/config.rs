use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use roombook_core::config::AppConfig;
use toml::Value;

use crate::commands::load_options;

pub fn run(config_path: Option<&Path>) -> String {
    let config = match AppConfig::load(load_options(config_path)) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path(config_path);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    for (key_path, value) in effective_values(&config) {
        let source = field_source(
            key_path,
            env_keys(key_path),
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(key_path, &value, source));
    }

    lines.join("\n")
}

/// Environment variables that override each key, alias last.
const ENV_KEYS: &[(&str, &[&str])] = &[
    ("database.url", &["ROOMBOOK_DATABASE_URL"]),
    ("database.max_connections", &["ROOMBOOK_DATABASE_MAX_CONNECTIONS"]),
    ("database.timeout_secs", &["ROOMBOOK_DATABASE_TIMEOUT_SECS"]),
    ("booking.max_duration_minutes", &["ROOMBOOK_BOOKING_MAX_DURATION_MINUTES"]),
    ("booking.max_participants", &["ROOMBOOK_BOOKING_MAX_PARTICIPANTS"]),
    ("booking.cancellation_notice_minutes", &["ROOMBOOK_BOOKING_CANCELLATION_NOTICE_MINUTES"]),
    ("booking.title_max_chars", &["ROOMBOOK_BOOKING_TITLE_MAX_CHARS"]),
    ("sessions.expiry_hours", &["ROOMBOOK_SESSIONS_EXPIRY_HOURS"]),
    ("sessions.sweep_interval_secs", &["ROOMBOOK_SESSIONS_SWEEP_INTERVAL_SECS"]),
    ("notifications.mode", &["ROOMBOOK_NOTIFICATIONS_MODE"]),
    ("notifications.from_address", &["ROOMBOOK_NOTIFICATIONS_FROM_ADDRESS"]),
    ("notifications.reminder_minutes_before", &["ROOMBOOK_NOTIFICATIONS_REMINDER_MINUTES_BEFORE"]),
    ("logging.level", &["ROOMBOOK_LOGGING_LEVEL", "ROOMBOOK_LOG_LEVEL"]),
    ("logging.format", &["ROOMBOOK_LOGGING_FORMAT", "ROOMBOOK_LOG_FORMAT"]),
];

fn effective_values(config: &AppConfig) -> Vec<(&'static str, String)> {
    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("booking.max_duration_minutes", config.booking.max_duration_minutes.to_string()),
        ("booking.max_participants", config.booking.max_participants.to_string()),
        ("booking.cancellation_notice_minutes", config.booking.cancellation_notice_minutes.to_string()),
        ("booking.title_max_chars", config.booking.title_max_chars.to_string()),
        ("sessions.expiry_hours", config.sessions.expiry_hours.to_string()),
        ("sessions.sweep_interval_secs", config.sessions.sweep_interval_secs.to_string()),
        ("notifications.mode", format!("{:?}", config.notifications.mode)),
        ("notifications.from_address", config.notifications.from_address.clone()),
        ("notifications.reminder_minutes_before", config.notifications.reminder_minutes_before.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

fn env_keys(key_path: &str) -> &'static [&'static str] {
    ENV_KEYS.iter().find(|(key, _)| *key == key_path).map(|(_, keys)| *keys).unwrap_or(&[])
}

fn detect_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("roombook.toml"), PathBuf::from("config/roombook.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

#[cfg(test)]
mod tests {
    use super::contains_path;

    #[test]
    fn nested_keys_are_resolved_through_tables() {
        let doc = "[booking]\nmax_participants = 20\n".parse::<toml::Value>().expect("toml");

        assert!(contains_path(&doc, "booking.max_participants"));
        assert!(!contains_path(&doc, "booking.title_max_chars"));
        assert!(!contains_path(&doc, "sessions.expiry_hours"));
    }
}
