use crate::config::types::{
    BoardEntry, Config, OutputConfig, RemoteConfig, ScraperConfig, UserAgentConfig,
};
use crate::ConfigError;
use std::collections::HashSet;
use url::Url;

/// Upper bound on per-board workers
const MAX_CONCURRENCY: usize = 64;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_scraper_config(&config.scraper)?;
    validate_remote_config(&config.remote)?;
    validate_user_agent_config(&config.user_agent)?;
    validate_output_config(&config.output)?;
    validate_boards(&config.boards)?;
    Ok(())
}

/// Validates pacing and concurrency settings
fn validate_scraper_config(config: &ScraperConfig) -> Result<(), ConfigError> {
    if config.max_concurrency < 1 || config.max_concurrency > MAX_CONCURRENCY {
        return Err(ConfigError::Validation(format!(
            "max_concurrency must be between 1 and {}, got {}",
            MAX_CONCURRENCY, config.max_concurrency
        )));
    }

    if config.connection_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "connection_timeout_secs must be >= 1, got {}",
            config.connection_timeout_secs
        )));
    }

    Ok(())
}

/// Validates the remote endpoint base URLs
fn validate_remote_config(config: &RemoteConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("api_base_url", &config.api_base_url),
        ("image_base_url", &config.image_base_url),
        ("thumbnail_base_url", &config.thumbnail_base_url),
    ] {
        let url = Url::parse(value)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

        if url.scheme() != "https" && url.scheme() != "http" {
            return Err(ConfigError::InvalidUrl(format!(
                "{} must use http or https, got '{}'",
                name, value
            )));
        }
    }

    Ok(())
}

/// Validates user agent configuration
fn validate_user_agent_config(config: &UserAgentConfig) -> Result<(), ConfigError> {
    // The name is sent verbatim as the product token of the User-Agent header.
    let name = config.crawler_name.as_str();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "user-agent crawler-name must be a non-empty token of letters, digits and hyphens, got '{}'",
            name
        )));
    }

    if config.crawler_version.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent crawler-version cannot be empty".to_string(),
        ));
    }

    let contact = Url::parse(&config.contact_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("contact-url: {}", e)))?;
    if !matches!(contact.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "contact-url must use http or https, got '{}'",
            config.contact_url
        )));
    }

    validate_email(&config.contact_email)
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    if config.media_root.is_empty() {
        return Err(ConfigError::Validation(
            "media_root cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates board entries: well-formed, unique names
fn validate_boards(boards: &[BoardEntry]) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();

    for board in boards {
        validate_board_name(&board.name)?;

        if !seen.insert(board.name.as_str()) {
            return Err(ConfigError::Validation(format!(
                "Board '{}' is listed more than once",
                board.name
            )));
        }
    }

    Ok(())
}

/// Board names end up in URLs and file paths
fn validate_board_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "Board name cannot be empty".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(ConfigError::Validation(format!(
            "Board name must be alphanumeric, got '{}'",
            name
        )));
    }

    Ok(())
}

/// Basic email validation
fn validate_email(email: &str) -> Result<(), ConfigError> {
    let valid = match email.split_once('@') {
        Some((local, host)) => {
            !local.is_empty()
                && !host.contains('@')
                && host.contains('.')
                && host.split('.').all(|label| !label.is_empty())
        }
        None => false,
    };

    if valid {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "contact-email is not a valid address: '{}'",
            email
        )))
    }
}
