//! Application configuration
//!
//! Backend location, credentials and upload limits, read from the
//! environment (and `.env` when present).

use std::env;
use std::time::Duration;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Backend base URL, without the `/api` suffix
    pub api_base_url: String,
    /// Bearer token of the signed-in account, if any
    pub api_token: Option<String>,
    /// Maximum attachment size in bytes
    pub max_upload_size: usize,
    /// Connect timeout for backend calls; unset means no limit
    pub connect_timeout: Option<Duration>,
    /// Environment (development/production)
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Production,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let environment = match lookup("ENVIRONMENT")
            .unwrap_or_else(|| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" | "prod" => Environment::Production,
            _ => Environment::Development,
        };

        let api_base_url = lookup("API_BASE_URL")
            .or_else(|| lookup("PQRS_API_URL"))
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| {
                ConfigError::Missing("API_BASE_URL or PQRS_API_URL is required".to_string())
            })?;

        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::Invalid(format!(
                "API_BASE_URL must be an http(s) URL, got '{}'",
                api_base_url
            )));
        }
        if environment == Environment::Production && api_base_url.starts_with("http://") {
            tracing::warn!("Using a plain http backend in production: {}", api_base_url);
        }

        let connect_timeout = match lookup("CONNECT_TIMEOUT_SECS") {
            Some(raw) => Some(Duration::from_secs(raw.trim().parse().map_err(|_| {
                ConfigError::Invalid(format!("CONNECT_TIMEOUT_SECS is not a number: '{}'", raw))
            })?)),
            None => None,
        };

        Ok(Config {
            api_base_url,
            api_token: lookup("API_TOKEN").filter(|t| !t.trim().is_empty()),
            max_upload_size: lookup("MAX_UPLOAD_SIZE")
                .and_then(|s| s.parse().ok())
                .unwrap_or(50 * 1024 * 1024), // 50MB default
            connect_timeout,
            environment,
        })
    }

    /// Check if running in production
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// A configured token means the user is signed in
    pub fn is_authenticated(&self) -> bool {
        self.api_token.is_some()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration: {0}")]
    Missing(String),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
