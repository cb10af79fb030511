//! munit Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Authentication configuration
    pub auth: AuthConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Address the HTTP listener binds to
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        // Server
        if let Some(host) = lookup("MUNIT_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("MUNIT_PORT") {
            self.server.port = parse_value("MUNIT_PORT", &port)?;
        }
        if let Some(timeout) = lookup("MUNIT_TIMEOUT") {
            // Accept both "30" and "30s"
            self.server.request_timeout_secs =
                parse_value("MUNIT_TIMEOUT", timeout.trim_end_matches('s'))?;
        }
        if let Some(origins) = lookup("MUNIT_ALLOWED_ORIGIN") {
            self.server.cors_origins = origins
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect();
        }

        // Auth
        if let Some(file) = lookup("MUNIT_SECRET_FILE") {
            self.auth.secret_file = PathBuf::from(file);
        }
        if let Some(issuer) = lookup("MUNIT_ISSUER") {
            self.auth.issuer = Some(issuer);
        }

        // Logging
        if let Some(level) = lookup("MUNIT_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("MUNIT_LOG_JSON") {
            self.logging.json_format = parse_value("MUNIT_LOG_JSON", &json)?;
        }
        if let Some(debug) = lookup("MUNIT_DEBUG") {
            self.logging.debug = parse_value("MUNIT_DEBUG", &debug)?;
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request deadline in seconds, authentication included
    pub request_timeout_secs: u64,

    /// Maximum request body size in bytes
    pub max_body_size: usize,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 7878,
            request_timeout_secs: 30,
            max_body_size: 1024 * 1024, // 1MiB
            cors_origins: vec!["munit.digital".to_string()],
        }
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// File holding the base64 encoded signing key seed
    pub secret_file: PathBuf,

    /// Token issuer, defaults to the host name
    pub issuer: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            secret_file: PathBuf::from(".secret"),
            issuer: None,
        }
    }
}

impl AuthConfig {
    /// Issuer written into tokens: the configured value or the host name
    pub fn resolved_issuer(&self) -> String {
        if let Some(issuer) = &self.issuer {
            return issuer.clone();
        }
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,
    /// JSON format for logs
    pub json_format: bool,
    /// Force debug level regardless of `level`
    pub debug: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            debug: false,
        }
    }
}

impl LoggingConfig {
    /// Effective level directive
    pub fn effective_level(&self) -> &str {
        if self.debug {
            "debug"
        } else {
            &self.level
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}
