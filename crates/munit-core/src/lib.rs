//! munit Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used by the munit backend:
//! - Common error types
//! - User identifiers and the user account record
//! - The user store seam consumed by authentication
//! - Configuration management

pub mod config;
pub mod id;
pub mod store;
pub mod user;

pub use config::{AppConfig, AuthConfig, ConfigError, LoggingConfig, ServerConfig};
pub use id::UserId;
pub use store::{MemoryUserStore, UserStore};
pub use user::{validate_password, User};

use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for munit operations
#[derive(Error, Debug)]
pub enum MunitError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid id")]
    InvalidId,

    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl MunitError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, MunitError>;
