//! Application state management

use crate::auth::{SigningKeys, TokenService};
use munit_core::config::AppConfig;
use munit_core::{MemoryUserStore, UserStore};
use std::sync::Arc;

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Token issuance and verification with the process signing key
    pub tokens: TokenService,
    /// User accounts
    pub users: Arc<dyn UserStore>,
}

impl AppState {
    pub fn new(config: AppConfig, keys: SigningKeys, users: Arc<dyn UserStore>) -> Self {
        let tokens = TokenService::new(keys, config.auth.resolved_issuer());
        Self {
            config,
            tokens,
            users,
        }
    }

    /// State with a throwaway signing key and an empty in-memory store
    pub fn for_testing() -> Self {
        let mut config = AppConfig::default();
        config.auth.issuer = Some("munit-test".to_string());
        let keys = SigningKeys::from_seed(&rand::random());
        Self::new(config, keys, Arc::new(MemoryUserStore::new()))
    }
}
