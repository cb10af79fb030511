//! Authentication module
//!
//! This module provides token-based authentication with the following components:
//! - Signing key bootstrap from the secret file
//! - Password hashing with Argon2id
//! - EdDSA token issuance and verification
//! - Middleware for request authentication

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod secret;

pub use jwt::{Claims, Expiry, TokenError, TokenService, TOKEN_LIFETIME_SECS};
pub use middleware::{
    auth_middleware, current_user, AuthError, AuthenticatedUser, NoAuthenticatedUser,
};
pub use password::{Credential, PasswordError};
pub use secret::{load_or_create_secret, SecretError, SigningKeys};
