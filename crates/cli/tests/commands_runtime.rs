use std::env;
use std::path::Path;
use std::sync::{Mutex, OnceLock};

use roombook_cli::commands::{config, doctor, migrate, rooms, seed, sweep};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_database(|_| {
        let result = migrate::run(None);
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_unsupported_database() {
    with_env(&[("ROOMBOOK_DATABASE_URL", "postgres://localhost/rooms")], || {
        let result = migrate::run(None);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn explicit_config_path_must_exist() {
    with_database(|_| {
        let result = migrate::run(Some(Path::new("does-not-exist/roombook.toml")));
        assert_eq!(result.exit_code, 2);
        assert_eq!(parse_payload(&result.output)["error_class"], "config_validation");
    });
}

#[test]
fn seed_is_idempotent_across_runs() {
    with_database(|_| {
        let first = seed::run(None);
        assert_eq!(first.exit_code, 0, "expected first seed invocation success");
        let first_payload = parse_payload(&first.output);
        assert_eq!(first_payload["command"], "seed");
        assert_eq!(first_payload["message"], "inserted 8 sample rooms");

        let second = seed::run(None);
        assert_eq!(second.exit_code, 0, "expected second seed invocation success");
        let second_payload = parse_payload(&second.output);
        assert_eq!(second_payload["status"], "ok");
        assert_eq!(
            second_payload["message"],
            "rooms already present; sample catalog left untouched"
        );
    });
}

#[test]
fn rooms_lists_the_seeded_catalog() {
    with_database(|_| {
        assert_eq!(seed::run(None).exit_code, 0);

        let result = rooms::run(None);
        assert_eq!(result.exit_code, 0);
        let payload = parse_payload(&result.output);
        assert_eq!(payload["message"], "8 rooms");
        assert_eq!(payload["data"]["statistics"]["total_rooms"], 8);

        let names = payload["data"]["rooms"]
            .as_array()
            .expect("rooms array")
            .iter()
            .filter_map(|room| room["name"].as_str())
            .collect::<Vec<_>>();
        assert!(names.contains(&"대회의실"));
        assert!(names.contains(&"창의공간"));
    });
}

#[test]
fn doctor_flags_an_unmigrated_database() {
    with_database(|_| {
        let result = doctor::run(None, true);
        assert_eq!(result.exit_code, 1);

        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "fail");
        assert_eq!(check_status(&report, "database_connectivity"), "pass");
        assert_eq!(check_status(&report, "schema_migrations"), "fail");
        assert_eq!(check_status(&report, "room_catalog"), "skipped");
    });
}

#[test]
fn doctor_passes_once_migrated_and_seeded() {
    with_database(|_| {
        assert_eq!(seed::run(None).exit_code, 0);

        let result = doctor::run(None, true);
        assert_eq!(result.exit_code, 0, "{}", result.output);
        let report = parse_payload(&result.output);
        assert_eq!(report["overall_status"], "pass");
        assert_eq!(check_status(&report, "room_catalog"), "pass");

        let human = doctor::run(None, false);
        assert!(human.output.starts_with("doctor: all readiness checks passed"));
        assert!(human.output.contains("- [ok] schema_migrations: 1 of 1 migrations applied"));
    });
}

#[test]
fn sweep_sessions_reports_removed_count() {
    with_database(|_| {
        let result = sweep::run(None);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "sweep-sessions");
        assert_eq!(payload["message"], "removed 0 expired sessions");
    });
}

#[test]
fn config_attributes_env_sources() {
    with_database(|url| {
        let output = config::run(None);
        assert!(output.starts_with("effective config"));
        assert!(output.contains(&format!(
            "- database.url = {url} (source: env (ROOMBOOK_DATABASE_URL))"
        )));
        assert!(output.contains("- booking.max_participants = 50 (source: default)"));
    });
}

fn check_status<'a>(report: &'a Value, name: &str) -> &'a str {
    report["checks"]
        .as_array()
        .and_then(|checks| checks.iter().find(|check| check["name"] == name))
        .and_then(|check| check["status"].as_str())
        .unwrap_or_default()
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

/// Runs `test_fn` against a fresh file database named by `ROOMBOOK_DATABASE_URL`.
fn with_database(test_fn: impl FnOnce(&str)) {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}", dir.path().join("roombook.db").display());
    with_env(&[("ROOMBOOK_DATABASE_URL", url.as_str())], || test_fn(&url));
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ROOMBOOK_DATABASE_URL",
        "ROOMBOOK_DATABASE_MAX_CONNECTIONS",
        "ROOMBOOK_DATABASE_TIMEOUT_SECS",
        "ROOMBOOK_BOOKING_MAX_DURATION_MINUTES",
        "ROOMBOOK_BOOKING_MAX_PARTICIPANTS",
        "ROOMBOOK_BOOKING_CANCELLATION_NOTICE_MINUTES",
        "ROOMBOOK_BOOKING_TITLE_MAX_CHARS",
        "ROOMBOOK_SESSIONS_EXPIRY_HOURS",
        "ROOMBOOK_SESSIONS_SWEEP_INTERVAL_SECS",
        "ROOMBOOK_NOTIFICATIONS_MODE",
        "ROOMBOOK_NOTIFICATIONS_FROM_ADDRESS",
        "ROOMBOOK_NOTIFICATIONS_REMINDER_MINUTES_BEFORE",
        "ROOMBOOK_LOGGING_LEVEL",
        "ROOMBOOK_LOGGING_FORMAT",
        "ROOMBOOK_LOG_LEVEL",
        "ROOMBOOK_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
