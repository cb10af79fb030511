//! Profile handlers
//!
//! All routes here sit behind the authentication middleware.

use super::new_credential;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::auth::AuthenticatedUser;
use crate::error::AppError;
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use munit_core::{validate_password, UserId};
use serde::Deserialize;
use std::sync::Arc;

/// Profile update request, absent fields are left unchanged
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub display_name: Option<String>,
    pub email: Option<String>,
    /// A non-empty value replaces the password credential
    pub password: Option<String>,
}

/// Get the authenticated user's profile
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError> {
    let user = state.users.get_user(&user.user_id).await?;
    Ok(Json(user))
}

/// Update the authenticated user's profile
///
/// Identifier and creation time never change.
pub async fn update_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, AppError> {
    let mut record = state.users.get_user(&user.user_id).await?;

    if let Some(display_name) = request.display_name {
        record.display_name = display_name;
    }
    if let Some(email) = request.email {
        record.email = email;
    }
    if let Some(password) = request.password.filter(|p| !p.is_empty()) {
        validate_password(&password)?;
        let credential = new_credential(password).await?;
        record.password_hash = credential.hash;
        record.salt = credential.salt;
    }
    record.touch();

    let updated = state.users.update_user(&user.user_id, record).await?;
    Ok(Json(updated))
}

/// Delete the authenticated user's account
///
/// Tokens already issued for the account stop working because the
/// middleware no longer finds the subject.
pub async fn delete_profile(
    State(state): State<Arc<AppState>>,
    user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    state.users.delete_user(&user.user_id).await?;

    audit_log(&AuditEvent::ProfileDeleted {
        user_id: user.user_id,
        client: ClientInfo::from_headers(&headers),
    });

    Ok(StatusCode::NO_CONTENT)
}

/// Get another user's public profile
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    _user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let id = UserId::parse(&id)?;
    let user = state.users.get_user(&id).await?;
    Ok(Json(user))
}
