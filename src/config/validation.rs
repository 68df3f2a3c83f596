use crate::config::types::{ApiConfig, Config, CrawlerConfig, StorageConfig};
use crate::state::Credential;
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_api_config(&config.api)?;
    validate_storage_config(&config.storage)?;
    validate_credentials(&config.credentials)?;
    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.idle_time < 1 {
        return Err(ConfigError::Validation(format!(
            "idle_time must be >= 1s, got {}s",
            config.idle_time
        )));
    }

    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    if config.retry < 1 {
        return Err(ConfigError::Validation(format!(
            "retry must be >= 1, got {}",
            config.retry
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "timeout_secs must be >= 1, got {}",
            config.timeout_secs
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    let url = Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid base_url: {}", e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_credentials(credentials: &[Credential]) -> Result<(), ConfigError> {
    if credentials.is_empty() {
        return Err(ConfigError::Validation(
            "at least one [[credentials]] entry is required".to_string(),
        ));
    }

    let mut seen = HashSet::new();
    for credential in credentials {
        if credential.username.is_empty() || credential.password.is_empty() {
            return Err(ConfigError::Validation(
                "credential username and password cannot be empty".to_string(),
            ));
        }

        if !seen.insert(credential.username.as_str()) {
            return Err(ConfigError::Validation(format!(
                "credential '{}' is listed more than once",
                credential.username
            )));
        }
    }

    Ok(())
}
