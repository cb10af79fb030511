//! Authentication API handlers
//!
//! Provides HTTP endpoints for account registration and login.

use super::{check_password, new_credential};
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::auth::Credential;
use crate::error::AppError;
use crate::state::AppState;
use axum::{extract::State, http::HeaderMap, http::StatusCode, response::IntoResponse, Json};
use munit_core::{validate_password, MunitError, User, UserId};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Registration request
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub display_name: String,
    pub email: String,
    pub password: String,
}

/// Login request
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

/// Register a new user account
///
/// # Responses
///
/// * `201 Created` - the new user, without credentials
/// * `400 Bad Request` - password or profile fields fail validation
/// * `409 Conflict` - email already registered
pub async fn register_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    let client = ClientInfo::from_headers(&headers);

    let result = register(&state, request.display_name, &request.email, request.password).await;
    match result {
        Ok(user) => {
            audit_log(&AuditEvent::RegistrationSuccess {
                user_id: user.id.clone(),
                email: user.email.clone(),
                client,
            });
            Ok((StatusCode::CREATED, Json(user)))
        }
        Err(e) => {
            audit_log(&AuditEvent::RegistrationFailure {
                email: request.email,
                reason: format!("{e:?}"),
                client,
            });
            Err(e)
        }
    }
}

async fn register(
    state: &AppState,
    display_name: String,
    email: &str,
    password: String,
) -> Result<User, AppError> {
    validate_password(&password)?;

    let credential = new_credential(password).await?;
    let user = User::new(
        UserId::generate(),
        display_name,
        email,
        credential.hash,
        credential.salt,
    );
    user.validate()?;

    state.users.insert_user(user.clone()).await?;
    Ok(user)
}

/// Login with email and password
///
/// Unknown email and wrong password produce the same 401.
///
/// # Responses
///
/// * `200 OK` - `{"token": "..."}`
/// * `400 Bad Request` - email or password is empty
/// * `401 Unauthorized` - invalid credentials
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if request.email.is_empty() {
        return Err(AppError::BadRequest("email is empty".to_string()));
    }
    if request.password.is_empty() {
        return Err(AppError::BadRequest("password is empty".to_string()));
    }

    let client = ClientInfo::from_headers(&headers);
    let login_failure = |reason: &str, client: ClientInfo| {
        audit_log(&AuditEvent::LoginFailure {
            email: request.email.clone(),
            reason: reason.to_string(),
            client,
        });
        AppError::Unauthorized
    };

    // An unknown email is checked against a decoy so it costs one hash too
    let (user, credential) = match state.users.get_user_by_email(&request.email).await {
        Ok(user) => {
            let credential = Credential::from(&user);
            (Some(user), credential)
        }
        Err(MunitError::NotFound(_)) => (None, Credential::decoy()),
        Err(e) => return Err(e.into()),
    };

    let verified = check_password(credential, request.password.clone()).await?;
    let user = match user {
        Some(user) if verified => user,
        Some(_) => return Err(login_failure("password mismatch", client)),
        None => return Err(login_failure("unknown email", client)),
    };

    let token = state.tokens.issue(user.id.as_str())?;

    audit_log(&AuditEvent::LoginSuccess {
        user_id: user.id,
        email: user.email,
        client,
    });

    Ok(Json(TokenResponse { token }))
}
