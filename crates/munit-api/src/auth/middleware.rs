/// Authentication middleware for protecting routes
///
/// Extracts the bearer token from the Authorization header, verifies it with
/// the [`TokenService`](super::jwt::TokenService) held in [`AppState`] and
/// checks that the subject still has an account. On success the subject is
/// added to request extensions as [`AuthenticatedUser`].
///
/// Every rejection answers with the same 401 body. The reason is written to
/// the audit log only.
use super::jwt::TokenError;
use crate::audit::{audit_log, AuditEvent, ClientInfo};
use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, Extensions, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use munit_core::{MunitError, UserId};
use std::sync::Arc;
use thiserror::Error;
use tracing::error;

const BEARER_SCHEME: &str = "Bearer";

/// Identity of the caller, attached by [`auth_middleware`]
///
/// Handlers behind the middleware take it as an extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
}

/// Reasons a request is not authenticated
#[derive(Debug, Error)]
enum AuthFailure {
    #[error("Missing Authorization header")]
    MissingHeader,

    #[error("Invalid Authorization header format")]
    InvalidHeader,

    #[error("Unsupported authorization scheme: {0}")]
    UnsupportedScheme(String),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error("Token subject is not a user id")]
    InvalidSubject,
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Unauthorized")]
    Unauthorized,

    #[error("User lookup failed: {0}")]
    Store(#[from] MunitError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        match self {
            AuthError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, Json(ApiError::unauthorized())).into_response()
            }
            AuthError::Store(e) => {
                error!(error = %e, "user lookup failed during authentication");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiError::internal_error()),
                )
                    .into_response()
            }
        }
    }
}

/// Handler ran without [`auth_middleware`] in front of it
///
/// This is a routing mistake, answered with 500.
#[derive(Debug, Error)]
#[error("no authenticated user in request context")]
pub struct NoAuthenticatedUser;

impl IntoResponse for NoAuthenticatedUser {
    fn into_response(self) -> Response {
        error!("{self}");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::internal_error()),
        )
            .into_response()
    }
}

/// Authentication middleware that requires a valid bearer token
///
/// This middleware:
/// 1. Extracts the `Authorization: Bearer <token>` header
/// 2. Verifies the token signature and expiry
/// 3. Resolves the subject to an existing user
/// 4. Adds AuthenticatedUser to request extensions
///
/// # Usage
///
/// ```ignore
/// use axum::{middleware, routing::get, Router};
/// use munit_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/profile", get(get_profile))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let subject = match authenticate(&state, request.headers()) {
        Ok(subject) => subject,
        Err(failure) => {
            audit_log(&AuditEvent::InvalidToken {
                reason: failure.to_string(),
                client: ClientInfo::from_headers(request.headers()),
            });
            return Err(AuthError::Unauthorized);
        }
    };

    match state.users.get_user(&subject).await {
        Ok(_) => {}
        Err(e) if e.is_not_found() => {
            audit_log(&AuditEvent::UnknownSubject {
                subject: subject.to_string(),
                client: ClientInfo::from_headers(request.headers()),
            });
            return Err(AuthError::Unauthorized);
        }
        Err(e) => return Err(AuthError::Store(e)),
    }

    request
        .extensions_mut()
        .insert(AuthenticatedUser { user_id: subject });

    Ok(next.run(request).await)
}

/// Authenticated user of a request
pub fn current_user(extensions: &Extensions) -> Result<&AuthenticatedUser, NoAuthenticatedUser> {
    extensions
        .get::<AuthenticatedUser>()
        .ok_or(NoAuthenticatedUser)
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = NoAuthenticatedUser;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(&parts.extensions).cloned()
    }
}

fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<UserId, AuthFailure> {
    let token = bearer_token(headers)?;
    let subject = state.tokens.verify(token)?;
    UserId::parse(&subject).map_err(|_| AuthFailure::InvalidSubject)
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthFailure> {
    let value = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthFailure::MissingHeader)?
        .to_str()
        .map_err(|_| AuthFailure::InvalidHeader)?;

    let (scheme, token) = value.split_once(' ').ok_or(AuthFailure::InvalidHeader)?;
    if scheme != BEARER_SCHEME {
        return Err(AuthFailure::UnsupportedScheme(scheme.to_string()));
    }
    if token.is_empty() {
        return Err(AuthFailure::InvalidHeader);
    }
    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(authorization: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            HeaderValue::from_str(authorization).unwrap(),
        );
        headers
    }

    #[test]
    fn test_bearer_token() {
        assert_eq!(bearer_token(&headers("Bearer abc.def.ghi")).unwrap(), "abc.def.ghi");
    }

    #[test]
    fn test_bearer_token_rejections() {
        assert!(matches!(
            bearer_token(&HeaderMap::new()),
            Err(AuthFailure::MissingHeader)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer")),
            Err(AuthFailure::InvalidHeader)
        ));
        assert!(matches!(
            bearer_token(&headers("Bearer ")),
            Err(AuthFailure::InvalidHeader)
        ));
        assert!(matches!(
            bearer_token(&headers("Basic dXNlcjpwYXNz")),
            Err(AuthFailure::UnsupportedScheme(s)) if s == "Basic"
        ));
        assert!(matches!(
            bearer_token(&headers("bearer abc")),
            Err(AuthFailure::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_authenticate_rejects_non_id_subject() {
        let state = AppState::for_testing();
        let token = state.tokens.issue("not an id").unwrap();

        let result = authenticate(&state, &headers(&format!("Bearer {token}")));
        assert!(matches!(result, Err(AuthFailure::InvalidSubject)));
    }

    #[test]
    fn test_authenticate_surfaces_token_errors() {
        let state = AppState::for_testing();
        let result = authenticate(&state, &headers("Bearer a.b.c"));
        assert!(matches!(
            result,
            Err(AuthFailure::Token(TokenError::MalformedToken(_)))
        ));
    }

    #[test]
    fn test_authenticate_returns_subject() {
        let state = AppState::for_testing();
        let id = UserId::generate();
        let token = state.tokens.issue(id.as_str()).unwrap();

        let subject = authenticate(&state, &headers(&format!("Bearer {token}"))).unwrap();
        assert_eq!(subject, id);
    }

    #[test]
    fn test_current_user() {
        let mut extensions = Extensions::new();
        assert!(current_user(&extensions).is_err());

        let id = UserId::generate();
        extensions.insert(AuthenticatedUser { user_id: id.clone() });
        assert_eq!(current_user(&extensions).unwrap().user_id, id);
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(
            AuthError::Unauthorized.into_response().status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AuthError::Store(MunitError::Storage("down".into()))
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            NoAuthenticatedUser.into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
