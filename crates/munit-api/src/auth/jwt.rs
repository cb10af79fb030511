//! JWT token generation and validation
//!
//! Tokens are signed with EdDSA (Ed25519) using the process signing key from
//! [`super::secret`]. They are self-contained: verification needs only the
//! public key and the embedded timestamps, never a session store.
//!
//! A token is valid while its `exp` claim is not in the past. Tokens without
//! `exp` are accepted until `iat` plus the token lifetime; tokens carrying
//! neither are rejected.

use super::secret::SigningKeys;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use chrono::Utc;
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifetime of an issued token in seconds (7 days)
pub const TOKEN_LIFETIME_SECS: u64 = 7 * 24 * 60 * 60;

const EXPECTED_ALGORITHM: &str = "EdDSA";

/// JWT Claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID
    #[serde(default)]
    pub sub: String,
    /// Token issuer (host that signed the token)
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iss: String,
    /// Issued at timestamp (Unix epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
    /// Expiration timestamp (Unix epoch)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
}

/// Explicit expiry claim of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    Present(u64),
    Absent,
}

impl Claims {
    pub fn expiry(&self) -> Expiry {
        match self.exp {
            Some(exp) => Expiry::Present(exp),
            None => Expiry::Absent,
        }
    }

    /// Last second at which the token is still valid
    pub fn valid_until(&self, lifetime_secs: u64) -> Result<u64, TokenError> {
        match self.expiry() {
            Expiry::Present(exp) => Ok(exp),
            Expiry::Absent => self
                .iat
                .map(|iat| iat.saturating_add(lifetime_secs))
                .ok_or(TokenError::MissingExpiry),
        }
    }
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Malformed token: {0}")]
    MalformedToken(String),

    #[error("Unexpected signing method: {0}")]
    UnexpectedAlgorithm(String),

    #[error("Invalid token signature")]
    InvalidSignature,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Token has no expiration")]
    MissingExpiry,

    #[error("Failed to sign token: {0}")]
    Signing(#[source] jsonwebtoken::errors::Error),
}

#[derive(Deserialize)]
struct RawHeader {
    alg: String,
}

/// Issues and verifies bearer tokens with the process signing key
#[derive(Debug, Clone)]
pub struct TokenService {
    keys: SigningKeys,
    issuer: String,
}

impl TokenService {
    pub fn new(keys: SigningKeys, issuer: impl Into<String>) -> Self {
        Self {
            keys,
            issuer: issuer.into(),
        }
    }

    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token for an already validated subject
    pub fn issue(&self, subject: &str) -> Result<String, TokenError> {
        let now = unix_now();
        self.sign(&Claims {
            sub: subject.to_string(),
            iss: self.issuer.clone(),
            iat: Some(now),
            exp: Some(now + TOKEN_LIFETIME_SECS),
        })
    }

    /// Verify a token and return its subject
    pub fn verify(&self, token: &str) -> Result<String, TokenError> {
        self.verify_claims(token).map(|claims| claims.sub)
    }

    /// Verify a token and return all of its claims
    pub fn verify_claims(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify_at(token, unix_now())
    }

    fn verify_at(&self, token: &str, now: u64) -> Result<Claims, TokenError> {
        let alg = declared_algorithm(token)?;
        if alg != EXPECTED_ALGORITHM {
            return Err(TokenError::UnexpectedAlgorithm(alg));
        }

        let mut validation = Validation::new(Algorithm::EdDSA);
        validation.required_spec_claims.clear();
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.leeway = 0;

        let claims = decode::<Claims>(token, self.keys.decoding_key(), &validation)
            .map_err(|e| match e.kind() {
                ErrorKind::InvalidSignature => TokenError::InvalidSignature,
                ErrorKind::InvalidAlgorithm => TokenError::UnexpectedAlgorithm(alg.clone()),
                _ => TokenError::MalformedToken(e.to_string()),
            })?
            .claims;

        if now > claims.valid_until(TOKEN_LIFETIME_SECS)? {
            return Err(TokenError::ExpiredToken);
        }
        Ok(claims)
    }

    fn sign(&self, claims: &Claims) -> Result<String, TokenError> {
        encode(
            &Header::new(Algorithm::EdDSA),
            claims,
            self.keys.encoding_key(),
        )
        .map_err(TokenError::Signing)
    }
}

/// Read the `alg` header field without trusting anything else in the token
fn declared_algorithm(token: &str) -> Result<String, TokenError> {
    let mut parts = token.split('.');
    let (Some(header), Some(_claims), Some(_signature), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(TokenError::MalformedToken(
            "token must have 3 parts separated by dots".to_string(),
        ));
    };

    let header = URL_SAFE_NO_PAD
        .decode(header)
        .map_err(|e| TokenError::MalformedToken(format!("header: {e}")))?;
    let header: RawHeader = serde_json::from_slice(&header)
        .map_err(|e| TokenError::MalformedToken(format!("header: {e}")))?;
    Ok(header.alg)
}

fn unix_now() -> u64 {
    Utc::now().timestamp().max(0) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::EncodingKey;
    use serde_json::json;

    const DAY: u64 = 24 * 60 * 60;

    fn service() -> TokenService {
        TokenService::new(SigningKeys::generate().unwrap(), "test-host")
    }

    fn raw_token(header: serde_json::Value, claims: serde_json::Value) -> String {
        let header = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header).unwrap());
        let claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        format!("{header}.{claims}.")
    }

    #[test]
    fn test_issue_and_verify() {
        let tokens = service();
        let token = tokens.issue("user1").unwrap();

        assert_eq!(token.split('.').count(), 3);
        assert_eq!(tokens.verify(&token).unwrap(), "user1");
    }

    #[test]
    fn test_issued_claims() {
        let tokens = service();
        let claims = tokens.verify_claims(&tokens.issue("abcdEFG1").unwrap()).unwrap();

        assert_eq!(claims.iss, "test-host");
        let iat = claims.iat.unwrap();
        assert_eq!(claims.expiry(), Expiry::Present(iat + TOKEN_LIFETIME_SECS));
        assert!(iat.abs_diff(unix_now()) <= 5);
    }

    #[test]
    fn test_header_declares_eddsa() {
        let token = service().issue("user1").unwrap();
        assert_eq!(declared_algorithm(&token).unwrap(), "EdDSA");
    }

    #[test]
    fn test_wrong_key() {
        let token = service().issue("user1").unwrap();
        let result = service().verify(&token);
        assert!(matches!(result, Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_tampered_claims() {
        let tokens = service();
        let token = tokens.issue("user1").unwrap();
        let parts: Vec<&str> = token.split('.').collect();

        let forged = URL_SAFE_NO_PAD.encode(
            serde_json::to_vec(&json!({"sub": "admin", "exp": unix_now() + DAY})).unwrap(),
        );
        let token = format!("{}.{}.{}", parts[0], forged, parts[2]);
        assert!(matches!(tokens.verify(&token), Err(TokenError::InvalidSignature)));
    }

    #[test]
    fn test_hmac_token_rejected() {
        let tokens = service();
        let claims = Claims {
            sub: "user1".to_string(),
            iss: "test-host".to_string(),
            iat: Some(unix_now()),
            exp: Some(unix_now() + DAY),
        };
        let token = encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(&tokens.keys.public_key()),
        )
        .unwrap();

        assert!(matches!(
            tokens.verify(&token),
            Err(TokenError::UnexpectedAlgorithm(alg)) if alg == "HS256"
        ));
    }

    #[test]
    fn test_alg_none_rejected() {
        let token = raw_token(
            json!({"alg": "none", "typ": "JWT"}),
            json!({"sub": "user1", "exp": unix_now() + DAY}),
        );
        assert!(matches!(
            service().verify(&token),
            Err(TokenError::UnexpectedAlgorithm(alg)) if alg == "none"
        ));
    }

    #[test]
    fn test_malformed_tokens() {
        let tokens = service();
        for token in ["", "abc", "a.b", "a.b.c.d", "!!!.e30.", "e30.e30.sig"] {
            assert!(
                matches!(tokens.verify(token), Err(TokenError::MalformedToken(_))),
                "token: {token:?}"
            );
        }
    }

    #[test]
    fn test_expired_token() {
        let tokens = service();
        let now = unix_now();
        let token = tokens
            .sign(&Claims {
                sub: "user1".to_string(),
                iss: "test-host".to_string(),
                iat: Some(now - 2 * DAY),
                exp: Some(now - DAY),
            })
            .unwrap();

        assert!(matches!(tokens.verify(&token), Err(TokenError::ExpiredToken)));
    }

    #[test]
    fn test_issued_at_fallback() {
        let tokens = service();
        let now = unix_now();
        let claims = |iat| Claims {
            sub: "user1".to_string(),
            iss: String::new(),
            iat: Some(iat),
            exp: None,
        };

        let stale = tokens.sign(&claims(now - 8 * DAY)).unwrap();
        assert!(matches!(tokens.verify(&stale), Err(TokenError::ExpiredToken)));

        let fresh = tokens.sign(&claims(now - DAY)).unwrap();
        assert_eq!(tokens.verify(&fresh).unwrap(), "user1");
    }

    #[test]
    fn test_missing_expiry() {
        let tokens = service();
        let token = tokens
            .sign(&Claims {
                sub: "user1".to_string(),
                iss: String::new(),
                iat: None,
                exp: None,
            })
            .unwrap();

        assert!(matches!(tokens.verify(&token), Err(TokenError::MissingExpiry)));
    }

    #[test]
    fn test_expiry_boundary() {
        let tokens = service();
        let token = tokens.issue("user1").unwrap();
        let exp = tokens.verify_claims(&token).unwrap().exp.unwrap();

        assert!(tokens.verify_at(&token, exp).is_ok());
        assert!(matches!(
            tokens.verify_at(&token, exp + 1),
            Err(TokenError::ExpiredToken)
        ));
    }

    #[test]
    fn test_valid_until() {
        let claims = Claims {
            sub: String::new(),
            iss: String::new(),
            iat: Some(100),
            exp: None,
        };
        assert_eq!(claims.valid_until(10).unwrap(), 110);

        let claims = Claims { exp: Some(50), ..claims };
        assert_eq!(claims.valid_until(10).unwrap(), 50);
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn issued_tokens_verify_to_their_subject(subject in ".{0,64}") {
                let tokens = TokenService::new(SigningKeys::from_seed(&[11u8; 32]), "host");
                let token = tokens.issue(&subject).unwrap();
                prop_assert_eq!(tokens.verify(&token).unwrap(), subject);
            }
        }
    }
}
