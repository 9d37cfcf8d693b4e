//! Load [`Settings`] from `CONF_FILE` (JSON, default `application.json`) and the environment.

use crate::config::{validate, Settings};
use crate::error::ConfigError;
use serde_json::{Map, Value};
use std::path::Path;

pub const DEFAULT_CONF_FILE: &str = "application.json";

impl Settings {
    /// Read `.env`, the config file if present, then environment overrides. Validated.
    pub fn load() -> Result<Settings, ConfigError> {
        dotenvy::dotenv().ok();
        let path = std::env::var("CONF_FILE").unwrap_or_else(|_| DEFAULT_CONF_FILE.to_string());
        let file = if Path::new(&path).exists() {
            let raw = std::fs::read_to_string(&path).map_err(|e| ConfigError::File {
                path: path.clone(),
                message: e.to_string(),
            })?;
            Some(raw)
        } else {
            None
        };
        Self::from_sources(file.as_deref(), |k| std::env::var(k).ok()).map_err(|e| match e {
            ConfigError::File { message, .. } => ConfigError::File { path, message },
            other => other,
        })
    }

    /// Merge defaults, the JSON document `file` and `env` (later wins), then validate.
    pub fn from_sources(file: Option<&str>, env: impl Fn(&str) -> Option<String>) -> Result<Settings, ConfigError> {
        let mut merged = match serde_json::to_value(Settings::default()) {
            Ok(Value::Object(m)) => m,
            _ => Map::new(),
        };
        if let Some(raw) = file {
            let doc: Map<String, Value> = serde_json::from_str(raw).map_err(|e| ConfigError::File {
                path: DEFAULT_CONF_FILE.into(),
                message: e.to_string(),
            })?;
            for (k, v) in doc {
                if merged.contains_key(&k) {
                    merged.insert(k, v);
                }
            }
        }
        let mut settings: Settings =
            serde_json::from_value(Value::Object(merged)).map_err(|e| ConfigError::Validation(e.to_string()))?;
        apply_env(&mut settings, env)?;
        validate(&settings)?;
        Ok(settings)
    }
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue { key, value })
}

fn parse_bool(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue { key, value }),
    }
}

fn apply_env(s: &mut Settings, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
    if let Some(v) = env("MODE") {
        s.mode = v;
    }
    if let Some(v) = env("DEBUG") {
        s.debug = parse_bool("DEBUG", v)?;
    }
    if let Some(v) = env("API_VERSION") {
        s.api_version = v;
    }
    if let Some(v) = env("HOST_IP") {
        s.host_ip = v;
    }
    if let Some(v) = env("HOST_PORT") {
        s.host_port = parse("HOST_PORT", v)?;
    }
    if let Some(v) = env("DATABASE_URL") {
        s.database_url = v;
    }
    if let Some(v) = env("MAX_CONNECTIONS") {
        s.max_connections = parse("MAX_CONNECTIONS", v)?;
    }
    if let Some(v) = env("USE_MEMORY_ENGINE") {
        s.use_memory_engine = parse_bool("USE_MEMORY_ENGINE", v)?;
    }
    Ok(())
}
