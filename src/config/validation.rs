use crate::config::types::{Config, FilterConfig, HttpConfig, MirrorConfig, TimeoutConfig};
use crate::url::parse_http_url;
use crate::ConfigError;

/// Largest accepted worker count
pub const MAX_WORKERS: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_mirror_config(&config.mirror)?;
    validate_timeout_config(&config.timeouts)?;
    validate_http_config(&config.http)?;
    validate_filter_config(&config.filter)?;
    Ok(())
}

/// Validates the `[mirror]` section
fn validate_mirror_config(config: &MirrorConfig) -> Result<(), ConfigError> {
    parse_http_url(&config.entry)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid entry '{}': {}", config.entry, e)))?;

    if config.local.trim().is_empty() {
        return Err(ConfigError::Validation("local cannot be empty".to_string()));
    }

    if matches!(&config.temp_dir, Some(dir) if dir.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "temp-dir cannot be empty when set".to_string(),
        ));
    }

    if config.default_index.is_empty()
        || config.default_index.contains('/')
        || config.default_index.contains('\\')
    {
        return Err(ConfigError::Validation(format!(
            "default-index must be a plain file name, got '{}'",
            config.default_index
        )));
    }

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    Ok(())
}

/// Validates the `[timeouts]` section
fn validate_timeout_config(config: &TimeoutConfig) -> Result<(), ConfigError> {
    if config.headers_ms == 0 {
        return Err(ConfigError::Validation(
            "headers-ms must be greater than 0".to_string(),
        ));
    }
    if config.body_ms == 0 {
        return Err(ConfigError::Validation(
            "body-ms must be greater than 0".to_string(),
        ));
    }
    Ok(())
}

/// Validates the `[http]` section
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }
    Ok(())
}

/// Validates the `[filter]` section
fn validate_filter_config(config: &FilterConfig) -> Result<(), ConfigError> {
    for pattern in &config.allow {
        validate_host_pattern(pattern)?;
    }
    Ok(())
}

/// Validates a host pattern (supports a leading `*.` wildcard)
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    let host = pattern.strip_prefix("*.").unwrap_or(pattern);
    validate_host_string(host)
}

/// Validates a host name (without wildcard prefix)
fn validate_host_string(host: &str) -> Result<(), ConfigError> {
    if host.is_empty() {
        return Err(ConfigError::InvalidPattern("Host cannot be empty".to_string()));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            host
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.starts_with('-') || host.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot start or end with '.' or '-'",
            host
        )));
    }

    if host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' cannot contain consecutive dots",
            host
        )));
    }

    Ok(())
}
