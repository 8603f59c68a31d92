use std::env;
use std::sync::{Mutex, OnceLock};

use estimator_cli::commands::{config, migrate, stats};
use serde_json::Value;

#[test]
fn migrate_returns_success_with_valid_env() {
    with_env(&[("ESTIMATOR_DATABASE_URL", "sqlite::memory:")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 0, "expected successful migrate run");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "migrate");
        assert_eq!(payload["status"], "ok");
    });
}

#[test]
fn migrate_returns_config_failure_for_non_sqlite_url() {
    with_env(&[("ESTIMATOR_DATABASE_URL", "postgres://localhost/estimator")], || {
        let result = migrate::run();
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn config_attributes_env_values_to_their_variable() {
    with_env(
        &[("ESTIMATOR_DATABASE_URL", "sqlite::memory:"), ("ESTIMATOR_SERVER_PORT", "9100")],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["command"], "config");
            let entries = payload["data"].as_array().expect("config entries");
            let port = entries
                .iter()
                .find(|entry| entry["key"] == "server.port")
                .expect("server.port entry");
            assert_eq!(port["value"], "9100");
            assert_eq!(port["source"], "env (ESTIMATOR_SERVER_PORT)");

            let timeout = entries
                .iter()
                .find(|entry| entry["key"] == "server.request_timeout_secs")
                .expect("timeout entry");
            assert_eq!(timeout["value"], "30");
            assert_eq!(timeout["source"], "default");
        },
    );
}

#[test]
fn config_accepts_short_log_level_alias() {
    with_env(&[("ESTIMATOR_LOG_LEVEL", "debug")], || {
        let payload = parse_payload(&config::run().output);
        let entries = payload["data"].as_array().expect("config entries");
        let level =
            entries.iter().find(|entry| entry["key"] == "logging.level").expect("level entry");
        assert_eq!(level["value"], "debug");
        assert_eq!(level["source"], "env (ESTIMATOR_LOG_LEVEL)");
    });
}

#[test]
fn stats_reports_empty_totals_after_migrate() {
    let dir = tempfile::tempdir().expect("tempdir");
    let url = format!("sqlite://{}?mode=rwc", dir.path().join("estimator.db").display());

    with_env(&[("ESTIMATOR_DATABASE_URL", url.as_str())], || {
        assert_eq!(migrate::run().exit_code, 0, "migrate should prepare the file database");

        let result = stats::run();
        assert_eq!(result.exit_code, 0, "unexpected output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "stats");
        assert_eq!(payload["data"]["total_quotes"], 0);
        assert!(payload["data"]["by_status"].as_object().is_some_and(|by_status| by_status.is_empty()));
    });
}

#[test]
fn stats_without_schema_is_a_query_failure() {
    with_env(&[("ESTIMATOR_DATABASE_URL", "sqlite::memory:")], || {
        let result = stats::run();
        assert_eq!(result.exit_code, 5);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "query");
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ESTIMATOR_DATABASE_URL",
        "ESTIMATOR_DATABASE_MAX_CONNECTIONS",
        "ESTIMATOR_DATABASE_TIMEOUT_SECS",
        "ESTIMATOR_SERVER_BIND_ADDRESS",
        "ESTIMATOR_SERVER_PORT",
        "ESTIMATOR_SERVER_REQUEST_TIMEOUT_SECS",
        "ESTIMATOR_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "ESTIMATOR_LOGGING_LEVEL",
        "ESTIMATOR_LOGGING_FORMAT",
        "ESTIMATOR_LOG_LEVEL",
        "ESTIMATOR_LOG_FORMAT",
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
