//! Settings validation.

use crate::config::Settings;
use crate::error::ConfigError;

pub fn validate(s: &Settings) -> Result<(), ConfigError> {
    if !s.api_version.starts_with('/') {
        return Err(ConfigError::Validation(format!(
            "api_version must start with '/', got {}",
            s.api_version
        )));
    }
    if s.api_version.len() > 1 && s.api_version.ends_with('/') {
        return Err(ConfigError::Validation("api_version must not end with '/'".into()));
    }
    if s.host_port == 0 {
        return Err(ConfigError::Validation("host_port must be non-zero".into()));
    }
    if s.max_connections == 0 {
        return Err(ConfigError::Validation("max_connections must be at least 1".into()));
    }
    if !s.use_memory_engine && s.database_url.trim().is_empty() {
        return Err(ConfigError::Validation(
            "database_url is required unless use_memory_engine is set".into(),
        ));
    }
    Ok(())
}
