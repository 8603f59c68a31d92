use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["estimator.toml", "config/estimator.toml"];

/// Config key paths and the environment variables that override them.
pub const ENV_OVERRIDES: [(&str, &str); 9] = [
    ("database.url", "ESTIMATOR_DATABASE_URL"),
    ("database.max_connections", "ESTIMATOR_DATABASE_MAX_CONNECTIONS"),
    ("database.timeout_secs", "ESTIMATOR_DATABASE_TIMEOUT_SECS"),
    ("server.bind_address", "ESTIMATOR_SERVER_BIND_ADDRESS"),
    ("server.port", "ESTIMATOR_SERVER_PORT"),
    ("server.request_timeout_secs", "ESTIMATOR_SERVER_REQUEST_TIMEOUT_SECS"),
    ("server.graceful_shutdown_secs", "ESTIMATOR_SERVER_GRACEFUL_SHUTDOWN_SECS"),
    ("logging.level", "ESTIMATOR_LOGGING_LEVEL"),
    ("logging.format", "ESTIMATOR_LOGGING_FORMAT"),
];

/// Shorter spellings, consulted only when the canonical variable is unset.
pub const ENV_ALIASES: [(&str, &str); 2] =
    [("logging.level", "ESTIMATOR_LOG_LEVEL"), ("logging.format", "ESTIMATOR_LOG_FORMAT")];

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

/// Values supplied by the caller; these beat both file and environment.
#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
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
    #[error("config file references unset environment variable `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("`${{` in config file is never closed")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://estimator.db".to_string(), max_connections: 5, timeout_secs: 30 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            graceful_shutdown_secs: 15,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl LogFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Compact => "compact",
            Self::Pretty => "pretty",
            Self::Json => "json",
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        [Self::Compact, Self::Pretty, Self::Json]
            .into_iter()
            .find(|format| value.trim().eq_ignore_ascii_case(format.as_str()))
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "unsupported log format `{}` (expected compact|pretty|json)",
                    value.trim()
                ))
            })
    }
}

impl AppConfig {
    /// Builds the effective config: defaults, then the file, then
    /// `ESTIMATOR_*` variables, then `options.overrides`.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = match resolve_config_path(options.config_path.as_deref()) {
            Some(path) => read_file(&path)?,
            None if options.require_file => {
                return Err(ConfigError::MissingConfigFile(
                    options.config_path.unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATHS[0])),
                ));
            }
            None => Self::default(),
        };

        for (key, env_key) in ENV_OVERRIDES {
            let alias = ENV_ALIASES.iter().find(|(aliased, _)| *aliased == key);
            let found = read_env(env_key)
                .map(|value| (env_key, value))
                .or_else(|| alias.and_then(|&(_, name)| read_env(name).map(|value| (name, value))));
            if let Some((name, value)) = found {
                config.assign(key, &value).map_err(|_| ConfigError::InvalidEnvOverride {
                    key: name.to_string(),
                    value,
                })?;
            }
        }

        let ConfigOverrides { database_url, log_level, server_port } = options.overrides;
        if let Some(url) = database_url {
            config.database.url = url;
        }
        if let Some(level) = log_level {
            config.logging.level = level;
        }
        if let Some(port) = server_port {
            config.server.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Current value of a dotted key from [`ENV_OVERRIDES`], rendered as text.
    pub fn value_of(&self, key: &str) -> Option<String> {
        let value = match key {
            "database.url" => self.database.url.clone(),
            "database.max_connections" => self.database.max_connections.to_string(),
            "database.timeout_secs" => self.database.timeout_secs.to_string(),
            "server.bind_address" => self.server.bind_address.clone(),
            "server.port" => self.server.port.to_string(),
            "server.request_timeout_secs" => self.server.request_timeout_secs.to_string(),
            "server.graceful_shutdown_secs" => self.server.graceful_shutdown_secs.to_string(),
            "logging.level" => self.logging.level.clone(),
            "logging.format" => self.logging.format.as_str().to_string(),
            _ => return None,
        };
        Some(value)
    }

    fn assign(&mut self, key: &str, raw: &str) -> Result<(), ConfigError> {
        let text = raw.trim();
        let bad = || ConfigError::InvalidEnvOverride { key: key.to_string(), value: raw.to_string() };
        match key {
            "database.url" => self.database.url = text.to_string(),
            "database.max_connections" => {
                self.database.max_connections = text.parse().map_err(|_| bad())?;
            }
            "database.timeout_secs" => {
                self.database.timeout_secs = text.parse().map_err(|_| bad())?;
            }
            "server.bind_address" => self.server.bind_address = text.to_string(),
            "server.port" => self.server.port = text.parse().map_err(|_| bad())?,
            "server.request_timeout_secs" => {
                self.server.request_timeout_secs = text.parse().map_err(|_| bad())?;
            }
            "server.graceful_shutdown_secs" => {
                self.server.graceful_shutdown_secs = text.parse().map_err(|_| bad())?;
            }
            "logging.level" => self.logging.level = text.to_string(),
            "logging.format" => self.logging.format = text.parse().map_err(|_| bad())?,
            _ => return Err(bad()),
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.database.url.trim();
        if !(url.starts_with("sqlite:") || url == ":memory:") {
            return Err(invalid(
                "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(invalid("database.max_connections must be greater than zero"));
        }
        within_range("database.timeout_secs", self.database.timeout_secs)?;

        if self.server.bind_address.trim().is_empty() {
            return Err(invalid("server.bind_address must not be empty"));
        }
        if self.server.port == 0 {
            return Err(invalid("server.port must be greater than zero"));
        }
        within_range("server.request_timeout_secs", self.server.request_timeout_secs)?;
        if self.server.graceful_shutdown_secs == 0 {
            return Err(invalid("server.graceful_shutdown_secs must be greater than zero"));
        }

        let level = self.logging.level.trim();
        if !LOG_LEVELS.iter().any(|known| level.eq_ignore_ascii_case(known)) {
            return Err(invalid("logging.level must be one of trace|debug|info|warn|error"));
        }
        Ok(())
    }
}

/// The config file `load` would read, if any.
pub fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    match explicit_path {
        Some(path) => path.exists().then(|| path.to_path_buf()),
        None => DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists()),
    }
}

fn read_file(path: &Path) -> Result<AppConfig, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;
    let expanded = expand_env_refs(&raw)?;
    toml::from_str(&expanded)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

/// Replaces every `${NAME}` with the value of the environment variable `NAME`.
fn expand_env_refs(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        output.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find('}').ok_or(ConfigError::UnterminatedInterpolation)?;
        let name = &after[..end];
        let value = env::var(name)
            .map_err(|_| ConfigError::MissingEnvInterpolation { var: name.to_string() })?;
        output.push_str(&value);
        rest = &after[end + 1..];
    }

    output.push_str(rest);
    Ok(output)
}

fn within_range(key: &str, secs: u64) -> Result<(), ConfigError> {
    if (1..=300).contains(&secs) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!("{key} must be in range 1..=300")))
    }
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::Validation(message.to_string())
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{
        expand_env_refs, AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat,
        ENV_ALIASES, ENV_OVERRIDES,
    };

    fn with_env<T>(vars: &[(&str, &str)], body: impl FnOnce() -> T) -> T {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        let _guard = LOCK.get_or_init(|| Mutex::new(())).lock().unwrap_or_else(|p| p.into_inner());

        let touched: Vec<&str> = ENV_OVERRIDES
            .iter()
            .chain(ENV_ALIASES.iter())
            .map(|(_, name)| *name)
            .chain(vars.iter().map(|(name, _)| *name))
            .collect();
        for name in &touched {
            env::remove_var(name);
        }
        for (name, value) in vars {
            env::set_var(name, value);
        }

        let outcome = body();

        for name in &touched {
            env::remove_var(name);
        }
        outcome
    }

    fn write_file(dir: &TempDir, contents: &str) -> PathBuf {
        let path = dir.path().join("estimator.toml");
        fs::write(&path, contents).expect("config file should be writable");
        path
    }

    fn from_file(path: PathBuf) -> Result<AppConfig, ConfigError> {
        AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
    }

    #[test]
    fn defaults_are_valid() {
        let config = AppConfig::default();
        config.validate().expect("defaults validate");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.request_timeout_secs, 30);
        assert_eq!(config.logging.format, LogFormat::Compact);
        assert_eq!(config.value_of("logging.format").as_deref(), Some("compact"));
        assert_eq!(config.value_of("nope"), None);
    }

    #[test]
    fn partial_file_keeps_defaults_for_missing_keys() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(&dir, "[server]\nport = 9090\n\n[logging]\nformat = \"json\"\n");

        let config = with_env(&[], || from_file(path)).expect("load");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.server.bind_address, "127.0.0.1");
        assert_eq!(config.database.url, "sqlite://estimator.db");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn unknown_file_keys_are_parse_errors() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(&dir, "[server]\nprot = 9090\n");

        let result = with_env(&[], || from_file(path));
        assert!(matches!(result, Err(ConfigError::ParseFile { .. })), "got {result:?}");
    }

    #[test]
    fn file_values_expand_environment_references() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(&dir, "[database]\nurl = \"sqlite://${TEST_ESTIMATOR_DB_PATH}\"\n");

        let config = with_env(&[("TEST_ESTIMATOR_DB_PATH", "/var/lib/estimator/quotes.db")], || {
            from_file(path)
        })
        .expect("load");
        assert_eq!(config.database.url, "sqlite:///var/lib/estimator/quotes.db");
    }

    #[test]
    fn expansion_reports_unset_and_unterminated_references() {
        with_env(&[], || {
            match expand_env_refs("url = \"${ESTIMATOR_TEST_UNSET_VARIABLE}\"") {
                Err(ConfigError::MissingEnvInterpolation { var }) => {
                    assert_eq!(var, "ESTIMATOR_TEST_UNSET_VARIABLE")
                }
                other => panic!("expected missing variable, got {other:?}"),
            }
            assert!(matches!(
                expand_env_refs("url = \"${OPEN"),
                Err(ConfigError::UnterminatedInterpolation)
            ));
            assert_eq!(expand_env_refs("price = \"$5\"").expect("plain dollar"), "price = \"$5\"");
        });
    }

    #[test]
    fn short_logging_aliases_apply_when_canonical_is_unset() {
        let config = with_env(
            &[("ESTIMATOR_LOG_LEVEL", "warn"), ("ESTIMATOR_LOG_FORMAT", "json")],
            || AppConfig::load(LoadOptions::default()),
        )
        .expect("load");
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Json);

        let config = with_env(
            &[("ESTIMATOR_LOG_LEVEL", "warn"), ("ESTIMATOR_LOGGING_LEVEL", "error")],
            || AppConfig::load(LoadOptions::default()),
        )
        .expect("load");
        assert_eq!(config.logging.level, "error");
    }

    #[test]
    fn overrides_beat_environment_which_beats_file() {
        let dir = TempDir::new().expect("tempdir");
        let path = write_file(
            &dir,
            "[database]\nurl = \"sqlite://from-file.db\"\n\n[server]\nrequest_timeout_secs = 10\ngraceful_shutdown_secs = 5\n",
        );

        let config = with_env(
            &[
                ("ESTIMATOR_DATABASE_URL", "sqlite://from-env.db"),
                ("ESTIMATOR_SERVER_REQUEST_TIMEOUT_SECS", "45"),
            ],
            || {
                AppConfig::load(LoadOptions {
                    config_path: Some(path),
                    overrides: ConfigOverrides {
                        database_url: Some("sqlite://from-override.db".to_string()),
                        ..ConfigOverrides::default()
                    },
                    ..LoadOptions::default()
                })
            },
        )
        .expect("load");

        assert_eq!(config.database.url, "sqlite://from-override.db");
        assert_eq!(config.server.request_timeout_secs, 45);
        assert_eq!(config.server.graceful_shutdown_secs, 5);
    }

    #[test]
    fn non_sqlite_urls_fail_validation() {
        let result = with_env(&[("ESTIMATOR_DATABASE_URL", "postgres://localhost/estimator")], || {
            AppConfig::load(LoadOptions::default())
        });
        match result {
            Err(ConfigError::Validation(message)) => assert!(message.contains("database.url")),
            other => panic!("expected validation failure, got {other:?}"),
        }
    }

    #[test]
    fn malformed_numeric_override_names_the_variable() {
        let result = with_env(&[("ESTIMATOR_SERVER_PORT", "eighty")], || {
            AppConfig::load(LoadOptions::default())
        });
        match result {
            Err(ConfigError::InvalidEnvOverride { key, value }) => {
                assert_eq!(key, "ESTIMATOR_SERVER_PORT");
                assert_eq!(value, "eighty");
            }
            other => panic!("expected invalid override, got {other:?}"),
        }
    }

    #[test]
    fn timeouts_outside_range_are_rejected() {
        let mut config = AppConfig::default();
        config.server.request_timeout_secs = 301;
        assert!(matches!(config.validate(), Err(ConfigError::Validation(m)) if m.contains("request_timeout_secs")));
    }

    #[test]
    fn required_file_must_exist() {
        let result = with_env(&[], || {
            AppConfig::load(LoadOptions {
                config_path: Some(PathBuf::from("/nonexistent/estimator.toml")),
                require_file: true,
                ..LoadOptions::default()
            })
        });
        assert!(matches!(result, Err(ConfigError::MissingConfigFile(_))));
    }
}
