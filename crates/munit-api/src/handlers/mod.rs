//! API handlers

pub mod auth;
pub mod health;
pub mod users;

use crate::auth::Credential;
use crate::error::AppError;

/// Salt and hash a new password off the async runtime
///
/// Argon2id with 64 MiB of memory takes long enough to stall a worker thread.
pub(crate) async fn new_credential(password: String) -> Result<Credential, AppError> {
    let credential = tokio::task::spawn_blocking(move || Credential::new(&password))
        .await
        .map_err(|e| AppError::Internal(format!("hashing task failed: {e}")))??;
    Ok(credential)
}

/// Check a password against a stored credential off the async runtime
pub(crate) async fn check_password(
    credential: Credential,
    password: String,
) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || credential.verify(&password))
        .await
        .map_err(|e| AppError::Internal(format!("verification task failed: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_new_credential_verifies() {
        let credential = new_credential("correct-horse-1!".to_string()).await.unwrap();
        assert!(check_password(credential.clone(), "correct-horse-1!".to_string())
            .await
            .unwrap());
        assert!(!check_password(credential, "wrong-horse-1!".to_string())
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_decoy_check_runs_and_fails() {
        let verified = check_password(Credential::decoy(), "correct-horse-1!".to_string())
            .await
            .unwrap();
        assert!(!verified);
    }
}
