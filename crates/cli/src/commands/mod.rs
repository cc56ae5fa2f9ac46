pub mod ingest;
pub mod migrate;
pub mod quote;
pub mod resolve;

use std::future::Future;

use renoquote_core::config::{AppConfig, LoadOptions};
use renoquote_db::{connect_from_config, migrations, DbPool};
use serde::Serialize;
use serde_json::Value;

pub const EXIT_CONFIG: u8 = 2;
pub const EXIT_RUNTIME: u8 = 3;
pub const EXIT_DB: u8 = 4;
pub const EXIT_MIGRATION: u8 = 5;
pub const EXIT_INPUT: u8 = 6;
pub const EXIT_NOT_FOUND: u8 = 7;
pub const EXIT_PIPELINE: u8 = 8;

/// `(error_class, message, exit_code)` raised inside a command body.
pub type CommandFailure = (&'static str, String, u8);

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::success_with_data(command, message, None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::failure_with_data(command, error_class, message, exit_code, None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config, starts a current-thread runtime and drives `body` to
/// completion. Config and runtime problems become the usual failure payloads.
pub(crate) fn execute<F, Fut>(command: &str, body: F) -> CommandResult
where
    F: FnOnce(AppConfig) -> Fut,
    Fut: Future<Output = Result<CommandResult, CommandFailure>>,
{
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                EXIT_CONFIG,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                EXIT_RUNTIME,
            );
        }
    };

    match runtime.block_on(body(config)) {
        Ok(result) => result,
        Err((error_class, message, exit_code)) => {
            CommandResult::failure(command, error_class, message, exit_code)
        }
    }
}

/// Connects and brings the schema up to date.
pub(crate) async fn open_database(config: &AppConfig) -> Result<DbPool, CommandFailure> {
    let pool = connect_from_config(&config.database)
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), EXIT_DB))?;
    migrations::run_pending(&pool)
        .await
        .map_err(|error| ("migration", error.to_string(), EXIT_MIGRATION))?;
    Ok(pool)
}

pub(crate) fn to_data<T: Serialize>(value: &T) -> Option<Value> {
    serde_json::to_value(value).ok()
}
