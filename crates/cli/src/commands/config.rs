use std::env;
use std::fs;
use std::path::Path;

use estimator_core::config::{resolve_config_path, ENV_ALIASES, ENV_OVERRIDES};
use serde::Serialize;
use toml::Value;

use crate::commands::{load_config, CommandResult};

#[derive(Debug, Serialize)]
struct EffectiveValue {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(failure) => return failure,
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let values: Vec<EffectiveValue> = ENV_OVERRIDES
        .iter()
        .map(|&(key, env_key)| EffectiveValue {
            key,
            value: config.value_of(key).unwrap_or_default(),
            source: field_source(key, env_key, config_file_doc.as_ref(), config_file_path.as_deref()),
        })
        .collect();

    match serde_json::to_value(&values) {
        Ok(data) => CommandResult::success_with(
            "config",
            "effective config (source precedence: env > file > default)",
            Some(data),
        ),
        Err(error) => CommandResult::failure("config", "serialization", error.to_string(), 3),
    }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let aliases = ENV_ALIASES.iter().filter(|(key, _)| *key == key_path).map(|(_, alias)| *alias);
    if let Some(env_var) =
        std::iter::once(env_key).chain(aliases).find(|key| env::var_os(key).is_some())
    {
        return format!("env ({env_var})");
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
