pub mod config;
pub mod migrate;
pub mod stats;

use std::future::Future;

use estimator_core::config::{AppConfig, LoadOptions};
use estimator_db::{connect_with_config, DbPool};
use serde::Serialize;
use serde_json::{json, Value};

/// Rendered JSON for stdout plus the process exit code.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Clone, Copy, Debug, Serialize)]
#[serde(rename_all = "lowercase")]
enum Status {
    Ok,
    Error,
}

#[derive(Debug, Serialize)]
struct CommandOutcome<'a> {
    command: &'a str,
    status: Status,
    error_class: Option<&'a str>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

/// A failed step: error class, message, exit code.
pub(crate) type StepFailure = (&'static str, String, u8);

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with(command, message, None)
    }

    pub fn success_with(command: &str, message: impl Into<String>, data: Option<Value>) -> Self {
        let outcome =
            CommandOutcome { command, status: Status::Ok, error_class: None, message: message.into(), data };
        Self { exit_code: 0, output: render(&outcome) }
    }

    pub fn failure(command: &str, error_class: &str, message: impl Into<String>, exit_code: u8) -> Self {
        let outcome = CommandOutcome {
            command,
            status: Status::Error,
            error_class: Some(error_class),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: render(&outcome) }
    }
}

pub(crate) fn load_config(command: &str) -> Result<AppConfig, CommandResult> {
    AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(command, "config_validation", format!("configuration issue: {error}"), 2)
    })
}

/// Loads config, opens the pool, runs `work` on a current-thread runtime and
/// closes the pool again whatever `work` returned.
pub(crate) fn with_database<T, F, Fut>(command: &str, work: F) -> Result<T, CommandResult>
where
    F: FnOnce(DbPool) -> Fut,
    Fut: Future<Output = Result<T, StepFailure>>,
{
    let config = load_config(command)?;
    let runtime = tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
        CommandResult::failure(command, "runtime_init", format!("async runtime unavailable: {error}"), 3)
    })?;

    let outcome = runtime.block_on(async {
        let pool = match connect_with_config(&config.database).await {
            Ok(pool) => pool,
            Err(error) => return Err(("db_connectivity", error.to_string(), 4)),
        };
        let outcome = work(pool.clone()).await;
        pool.close().await;
        outcome
    });

    outcome.map_err(|(error_class, message, exit_code)| {
        CommandResult::failure(command, error_class, message, exit_code)
    })
}

fn render(outcome: &CommandOutcome<'_>) -> String {
    serde_json::to_string(outcome).unwrap_or_else(|error| {
        json!({
            "command": outcome.command,
            "status": "error",
            "error_class": "serialization",
            "message": error.to_string(),
        })
        .to_string()
    })
}
