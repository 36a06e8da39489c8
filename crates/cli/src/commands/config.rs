use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::commands::{load_config, CommandResult, LoadedConfig};
use cadence_core::config::AppConfig;
use serde::Serialize;
use toml::Value;

#[derive(Debug, Serialize)]
struct ConfigLine {
    key: &'static str,
    value: String,
    source: String,
}

pub fn run(loaded: &LoadedConfig) -> CommandResult {
    let config = match load_config("config", loaded) {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let lines = effective_lines(config, config_file_doc.as_ref(), config_file_path.as_deref());

    let mut rendered =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    rendered.extend(
        lines.iter().map(|line| format!("- {} = {} (source: {})", line.key, line.value, line.source)),
    );

    match serde_json::to_value(&lines) {
        Ok(data) => CommandResult::success_with_data("config", rendered.join("\n"), Some(data)),
        Err(error) => CommandResult::failure("config", "serialization", error.to_string(), 6),
    }
}

fn effective_lines(
    config: &AppConfig,
    doc: Option<&Value>,
    path: Option<&Path>,
) -> Vec<ConfigLine> {
    let line = |key: &'static str, value: String, env_keys: &[&str]| ConfigLine {
        key,
        value,
        source: field_source(key, env_keys, doc, path),
    };

    vec![
        line("database.url", config.database.url.clone(), &["CADENCE_DATABASE_URL"]),
        line(
            "database.max_connections",
            config.database.max_connections.to_string(),
            &["CADENCE_DATABASE_MAX_CONNECTIONS"],
        ),
        line(
            "database.timeout_secs",
            config.database.timeout_secs.to_string(),
            &["CADENCE_DATABASE_TIMEOUT_SECS"],
        ),
        line("engine.ema_alpha", config.engine.ema_alpha.to_string(), &["CADENCE_ENGINE_EMA_ALPHA"]),
        line(
            "engine.default_interval_days",
            config.engine.default_interval_days.to_string(),
            &["CADENCE_ENGINE_DEFAULT_INTERVAL_DAYS"],
        ),
        line(
            "engine.high_value_threshold",
            config.engine.high_value_threshold.to_string(),
            &["CADENCE_ENGINE_HIGH_VALUE_THRESHOLD"],
        ),
        line(
            "health.dormant_after_days",
            config.health.dormant_after_days.to_string(),
            &["CADENCE_HEALTH_DORMANT_AFTER_DAYS"],
        ),
        line(
            "batch.limit_customers",
            config.batch.limit_customers.to_string(),
            &["CADENCE_BATCH_LIMIT_CUSTOMERS"],
        ),
        line("batch.only_active", config.batch.only_active.to_string(), &["CADENCE_BATCH_ONLY_ACTIVE"]),
        line("batch.concurrency", config.batch.concurrency.to_string(), &["CADENCE_BATCH_CONCURRENCY"]),
        line(
            "logging.level",
            config.logging.level.clone(),
            &["CADENCE_LOGGING_LEVEL", "CADENCE_LOG_LEVEL"],
        ),
        line(
            "logging.format",
            format!("{:?}", config.logging.format).to_ascii_lowercase(),
            &["CADENCE_LOGGING_FORMAT", "CADENCE_LOG_FORMAT"],
        ),
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    ["cadence.toml", "config/cadence.toml"].into_iter().map(PathBuf::from).find(|path| path.exists())
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
