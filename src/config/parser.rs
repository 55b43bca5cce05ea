use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Environment variable overriding `scraper.api-wait-ms`
pub const ENV_API_WAIT_MS: &str = "ARCHIVER_API_WAIT_MS";
/// Environment variable overriding `scraper.file-wait-ms`
pub const ENV_FILE_WAIT_MS: &str = "ARCHIVER_FILE_WAIT_MS";
/// Environment variable overriding `scraper.max-concurrency`
pub const ENV_MAX_CONCURRENCY: &str = "ARCHIVER_MAX_CONCURRENCY";
/// Environment variable overriding `scraper.connection-timeout-secs`
pub const ENV_CONNECTION_TIMEOUT_SECS: &str = "ARCHIVER_CONNECTION_TIMEOUT_SECS";

/// Loads and parses a configuration file from the given path
///
/// Environment overrides are applied after parsing and before validation.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content, |key| std::env::var(key).ok())
}

/// Parses configuration text, applies overrides from `lookup` and validates the result
pub fn parse_config<F>(content: &str, lookup: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: Config = toml::from_str(content)?;
    apply_env_overrides(&mut config, lookup)?;
    validate(&config)?;
    Ok(config)
}

/// Applies the pacing overrides found through `lookup`
///
/// `lookup` is normally `std::env::var`; tests pass a closure over a map.
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F) -> Result<(), ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(value) = lookup(ENV_API_WAIT_MS) {
        config.scraper.api_wait_ms = parse_override(ENV_API_WAIT_MS, &value)?;
    }
    if let Some(value) = lookup(ENV_FILE_WAIT_MS) {
        config.scraper.file_wait_ms = parse_override(ENV_FILE_WAIT_MS, &value)?;
    }
    if let Some(value) = lookup(ENV_MAX_CONCURRENCY) {
        config.scraper.max_concurrency = parse_override(ENV_MAX_CONCURRENCY, &value)?;
    }
    if let Some(value) = lookup(ENV_CONNECTION_TIMEOUT_SECS) {
        config.scraper.connection_timeout_secs =
            parse_override(ENV_CONNECTION_TIMEOUT_SECS, &value)?;
    }
    Ok(())
}

fn parse_override<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| {
        ConfigError::Validation(format!("{} must be a non-negative integer, got '{}'", key, value))
    })
}

/// Computes a SHA-256 hash of the configuration file content
///
/// This is logged at startup so runs can be correlated with the config that produced them.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(String)` - Hex-encoded SHA-256 hash of the file content
/// * `Err(ConfigError)` - Failed to read the file
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    let result = hasher.finalize();
    Ok(hex::encode(result))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}
