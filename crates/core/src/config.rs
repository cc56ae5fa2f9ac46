use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::matching::{MatchingSettings, DEFAULT_ACCEPTANCE_THRESHOLD, DEFAULT_CANDIDATE_LIMIT};

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub llm: LlmConfig,
    pub server: ServerConfig,
    pub matching: MatchingConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

/// Global matching knobs. One value for every tenant.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MatchingConfig {
    pub acceptance_threshold: u8,
    pub candidate_limit: usize,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Ollama,
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
    pub llm_enabled: Option<bool>,
    pub llm_provider: Option<LlmProvider>,
    pub llm_model: Option<String>,
    pub server_port: Option<u16>,
    pub acceptance_threshold: Option<u8>,
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
                url: "sqlite://renoquote.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            llm: LlmConfig {
                enabled: false,
                provider: LlmProvider::Ollama,
                api_key: None,
                base_url: Some("http://localhost:11434".to_string()),
                model: "llama3.1".to_string(),
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
            },
            matching: MatchingConfig::default(),
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            acceptance_threshold: DEFAULT_ACCEPTANCE_THRESHOLD,
            candidate_limit: DEFAULT_CANDIDATE_LIMIT,
        }
    }
}

impl MatchingConfig {
    pub fn settings(&self) -> MatchingSettings {
        MatchingSettings {
            acceptance_threshold: self.acceptance_threshold,
            candidate_limit: self.candidate_limit,
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl LlmProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|ollama)"
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

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected =
                options.config_path.unwrap_or_else(|| PathBuf::from("renoquote.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
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

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(api_key) = llm.api_key {
                self.llm.api_key = Some(secret_value(api_key));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
        }

        if let Some(matching) = patch.matching {
            if let Some(acceptance_threshold) = matching.acceptance_threshold {
                self.matching.acceptance_threshold = acceptance_threshold;
            }
            if let Some(candidate_limit) = matching.candidate_limit {
                self.matching.candidate_limit = candidate_limit;
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
        if let Some(value) = read_env("RENOQUOTE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("RENOQUOTE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("RENOQUOTE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("RENOQUOTE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("RENOQUOTE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RENOQUOTE_LLM_ENABLED") {
            self.llm.enabled = parse_bool("RENOQUOTE_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("RENOQUOTE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("RENOQUOTE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("RENOQUOTE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("RENOQUOTE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("RENOQUOTE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("RENOQUOTE_LLM_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("RENOQUOTE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("RENOQUOTE_SERVER_PORT") {
            self.server.port = parse_u16("RENOQUOTE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("RENOQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("RENOQUOTE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        if let Some(value) = read_env("RENOQUOTE_MATCHING_ACCEPTANCE_THRESHOLD") {
            self.matching.acceptance_threshold =
                parse_u8("RENOQUOTE_MATCHING_ACCEPTANCE_THRESHOLD", &value)?;
        }
        if let Some(value) = read_env("RENOQUOTE_MATCHING_CANDIDATE_LIMIT") {
            self.matching.candidate_limit =
                parse_usize("RENOQUOTE_MATCHING_CANDIDATE_LIMIT", &value)?;
        }

        let log_level =
            read_env("RENOQUOTE_LOGGING_LEVEL").or_else(|| read_env("RENOQUOTE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("RENOQUOTE_LOGGING_FORMAT").or_else(|| read_env("RENOQUOTE_LOG_FORMAT"));
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
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(llm_provider) = overrides.llm_provider {
            self.llm.provider = llm_provider;
        }
        if let Some(llm_model) = overrides.llm_model {
            self.llm.model = llm_model;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(acceptance_threshold) = overrides.acceptance_threshold {
            self.matching.acceptance_threshold = acceptance_threshold;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_llm(&self.llm)?;
        validate_server(&self.server)?;
        validate_matching(&self.matching)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("renoquote.toml"), PathBuf::from("config/renoquote.toml")]
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

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if !llm.enabled {
        return Ok(());
    }

    if llm.model.trim().is_empty() {
        return Err(ConfigError::Validation("llm.model is required when llm is enabled".into()));
    }

    match llm.provider {
        LlmProvider::OpenAi => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for the openai provider".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {
            let missing =
                llm.base_url.as_ref().map(|value| value.trim().is_empty()).unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.base_url is required for the ollama provider".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_matching(matching: &MatchingConfig) -> Result<(), ConfigError> {
    if matching.acceptance_threshold == 0 || matching.acceptance_threshold > 100 {
        return Err(ConfigError::Validation(
            "matching.acceptance_threshold must be in range 1..=100".to_string(),
        ));
    }

    if matching.candidate_limit == 0 {
        return Err(ConfigError::Validation(
            "matching.candidate_limit must be greater than zero".to_string(),
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

fn invalid_override(key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidEnvOverride { key: key.to_string(), value: value.to_string() }
}

fn parse_u8(key: &str, value: &str) -> Result<u8, ConfigError> {
    value.parse::<u8>().map_err(|_| invalid_override(key, value))
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| invalid_override(key, value))
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| invalid_override(key, value))
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| invalid_override(key, value))
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| invalid_override(key, value))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| invalid_override(key, value))
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    llm: Option<LlmPatch>,
    server: Option<ServerPatch>,
    matching: Option<MatchingPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct MatchingPatch {
    acceptance_threshold: Option<u8>,
    candidate_limit: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use secrecy::ExposeSecret;
    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LlmProvider, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    fn empty_dir_config() -> Result<(TempDir, LoadOptions), String> {
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let options = LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            ..LoadOptions::default()
        };
        Ok((dir, options))
    }

    #[test]
    fn defaults_are_valid_without_llm() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;
        let (_dir, options) = empty_dir_config()?;

        let config =
            AppConfig::load(options).map_err(|err| format!("config load failed: {err}"))?;

        ensure(!config.llm.enabled, "llm should be disabled by default")?;
        ensure(config.matching.acceptance_threshold == 98, "threshold should default to 98")?;
        ensure(config.matching.candidate_limit == 3, "candidate limit should default to 3")?;
        ensure(config.settings_match(), "matching settings should mirror config")?;
        ensure(
            matches!(config.logging.format, LogFormat::Compact),
            "default logging format should be compact",
        )
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_RENOQUOTE_LLM_KEY", "sk-from-env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("renoquote.toml");
            fs::write(
                &path,
                r#"
[llm]
enabled = true
provider = "open_ai"
api_key = "${TEST_RENOQUOTE_LLM_KEY}"
model = "gpt-4o-mini"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.llm.provider == LlmProvider::OpenAi, "provider should come from file")?;
            ensure(
                config.llm.api_key.as_ref().map(|key| key.expose_secret() == "sk-from-env")
                    == Some(true),
                "api key should be interpolated from environment",
            )
        })();

        clear_vars(&["TEST_RENOQUOTE_LLM_KEY"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RENOQUOTE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("RENOQUOTE_MATCHING_CANDIDATE_LIMIT", "5");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("renoquote.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[matching]
acceptance_threshold = 90
candidate_limit = 4

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    log_level: Some("debug".to_string()),
                    acceptance_threshold: Some(95),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-env.db",
                "env database url should win over file",
            )?;
            ensure(config.matching.candidate_limit == 5, "env candidate limit should win")?;
            ensure(config.matching.acceptance_threshold == 95, "override threshold should win")?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")
        })();

        clear_vars(&["RENOQUOTE_DATABASE_URL", "RENOQUOTE_MATCHING_CANDIDATE_LIMIT"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RENOQUOTE_LOG_LEVEL", "warn");
        env::set_var("RENOQUOTE_LOG_FORMAT", "json");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = empty_dir_config()?;
            let config =
                AppConfig::load(options).map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "log level should be set from env alias")?;
            ensure(
                matches!(config.logging.format, LogFormat::Json),
                "json logging format should be set from env alias",
            )
        })();

        clear_vars(&["RENOQUOTE_LOG_LEVEL", "RENOQUOTE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn threshold_out_of_range_fails_validation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RENOQUOTE_MATCHING_ACCEPTANCE_THRESHOLD", "101");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = empty_dir_config()?;
            let error = match AppConfig::load(options) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            ensure(
                matches!(
                    error,
                    ConfigError::Validation(ref message)
                        if message.contains("matching.acceptance_threshold")
                ),
                "validation failure should name matching.acceptance_threshold",
            )
        })();

        clear_vars(&["RENOQUOTE_MATCHING_ACCEPTANCE_THRESHOLD"]);
        result
    }

    #[test]
    fn enabled_openai_requires_api_key() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RENOQUOTE_LLM_ENABLED", "true");
        env::set_var("RENOQUOTE_LLM_PROVIDER", "openai");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = empty_dir_config()?;
            let error = match AppConfig::load(options) {
                Ok(_) => return Err("expected missing api key to fail".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("llm.api_key")),
                "validation failure should mention llm.api_key",
            )
        })();

        clear_vars(&["RENOQUOTE_LLM_ENABLED", "RENOQUOTE_LLM_PROVIDER"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RENOQUOTE_SERVER_PORT", "eighty");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = empty_dir_config()?;
            let error = match AppConfig::load(options) {
                Ok(_) => return Err("expected invalid override to fail".to_string()),
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::InvalidEnvOverride { ref key, .. } if key == "RENOQUOTE_SERVER_PORT"),
                "error should name the offending variable",
            )
        })();

        clear_vars(&["RENOQUOTE_SERVER_PORT"]);
        result
    }

    #[test]
    fn secret_values_are_not_leaked_by_debug() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("RENOQUOTE_LLM_API_KEY", "sk-secret-value");

        let result = (|| -> Result<(), String> {
            let (_dir, options) = empty_dir_config()?;
            let config =
                AppConfig::load(options).map_err(|err| format!("config load failed: {err}"))?;
            let debug = format!("{config:?}");

            ensure(!debug.contains("sk-secret-value"), "debug output should not contain api key")
        })();

        clear_vars(&["RENOQUOTE_LLM_API_KEY"]);
        result
    }

    impl AppConfig {
        fn settings_match(&self) -> bool {
            let settings = self.matching.settings();
            settings.acceptance_threshold == self.matching.acceptance_threshold
                && settings.candidate_limit == self.matching.candidate_limit
        }
    }
}
