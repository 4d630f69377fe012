use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use super::AuthContext;
use crate::app::AppState;
use crate::error::ErrorResponse;

/// Extractor that requires authentication
///
/// ```ignore
/// async fn protected_route(auth: RequireAuth) -> impl IntoResponse {
///     format!("Hello, user {}", auth.user_id)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthContext);

impl std::ops::Deref for RequireAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Like `RequireAuth`, but anonymous callers are let through as `None`.
/// A present but invalid token is still rejected.
#[derive(Debug, Clone)]
pub struct OptionalAuth(pub Option<AuthContext>);

impl OptionalAuth {
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|ctx| ctx.user_id)
    }
}

/// Extractor that requires a row in `user_roles` with `is_admin = true`
#[derive(Debug, Clone)]
pub struct RequireAdmin(pub AuthContext);

impl std::ops::Deref for RequireAdmin {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// Authentication for server-sent event streams. `EventSource` cannot set
/// headers, so the token may also arrive as an `access_token` query
/// parameter. The header wins when both are present.
#[derive(Debug, Clone)]
pub struct StreamAuth(pub AuthContext);

impl std::ops::Deref for StreamAuth {
    type Target = AuthContext;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[derive(Debug)]
pub enum AuthError {
    MissingToken,
    InvalidFormat,
    InvalidToken(String),
    NotAdmin,
    Database(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AuthError::MissingToken => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing authorization token",
            ),
            AuthError::InvalidFormat => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid authorization format",
            ),
            AuthError::InvalidToken(_) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Invalid or expired token",
            ),
            AuthError::NotAdmin => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Admin privileges required",
            ),
            AuthError::Database(e) => {
                tracing::error!(error = %e, "Role lookup failed");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "Internal server error",
                )
            }
        };

        (status, Json(ErrorResponse::new(code, message))).into_response()
    }
}

fn bearer_token(parts: &Parts) -> Result<Option<&str>, AuthError> {
    let Some(header) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };
    let header = header.to_str().map_err(|_| AuthError::InvalidFormat)?;
    let token = header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidFormat)?
        .trim();
    if token.is_empty() {
        return Err(AuthError::MissingToken);
    }
    Ok(Some(token))
}

fn query_token(parts: &Parts) -> Option<String> {
    let query = parts.uri.query()?;
    url::form_urlencoded::parse(query.as_bytes())
        .find(|(key, _)| key == "access_token")
        .map(|(_, value)| value.trim().to_string())
        .filter(|token| !token.is_empty())
}

fn stream_token(parts: &Parts) -> Result<String, AuthError> {
    match bearer_token(parts)? {
        Some(token) => Ok(token.to_string()),
        None => query_token(parts).ok_or(AuthError::MissingToken),
    }
}

async fn authenticate(state: &AppState, token: &str) -> Result<AuthContext, AuthError> {
    let claims = state.jwks_cache.verify_token(token).await.map_err(|e| {
        tracing::warn!(error = %e, "JWT verification failed");
        AuthError::InvalidToken(e.to_string())
    })?;

    AuthContext::from_claims_with_token(&claims, token).map_err(|e| {
        tracing::warn!(error = %e, "Failed to build auth context");
        AuthError::InvalidToken(e.to_string())
    })
}

/// Whether the user holds the admin role. No role row means no.
pub async fn is_admin(db: &sqlx::PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    let flag: Option<bool> = sqlx::query_scalar("SELECT is_admin FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .fetch_optional(db)
        .await?;
    Ok(flag.unwrap_or(false))
}

/// Pass `ctx` through if it belongs to an admin.
pub async fn ensure_admin(state: &AppState, ctx: AuthContext) -> Result<AuthContext, AuthError> {
    let admin = is_admin(&state.db, ctx.user_id)
        .await
        .map_err(|e| AuthError::Database(e.to_string()))?;

    if !admin {
        tracing::warn!(user_id = %ctx.user_id, "Non-admin user attempted to access admin route");
        return Err(AuthError::NotAdmin);
    }
    Ok(ctx)
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)?.ok_or(AuthError::MissingToken)?;
        authenticate(state, token).await.map(RequireAuth)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for OptionalAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(parts)? {
            Some(token) => Ok(OptionalAuth(Some(authenticate(state, token).await?))),
            None => Ok(OptionalAuth(None)),
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for RequireAdmin {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(ctx) = RequireAuth::from_request_parts(parts, state).await?;
        ensure_admin(state, ctx).await.map(RequireAdmin)
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for StreamAuth {
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = stream_token(parts)?;
        authenticate(state, &token).await.map(StreamAuth)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use rstest::rstest;

    fn parts(authorization: Option<&str>) -> Parts {
        parts_for("/", authorization)
    }

    fn parts_for(uri: &str, authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn missing_header_is_anonymous() {
        assert!(matches!(bearer_token(&parts(None)), Ok(None)));
    }

    #[rstest]
    #[case("Bearer abc.def.ghi", Some("abc.def.ghi"))]
    #[case("Bearer   abc ", Some("abc"))]
    fn extracts_bearer_token(#[case] header: &str, #[case] expected: Option<&str>) {
        let parts = parts(Some(header));
        assert_eq!(bearer_token(&parts).unwrap(), expected);
    }

    #[rstest]
    #[case("Basic dXNlcjpwYXNz")]
    #[case("bearer abc")]
    fn rejects_other_schemes(#[case] header: &str) {
        assert!(matches!(
            bearer_token(&parts(Some(header))),
            Err(AuthError::InvalidFormat)
        ));
    }

    #[test]
    fn empty_bearer_is_missing() {
        assert!(matches!(
            bearer_token(&parts(Some("Bearer "))),
            Err(AuthError::MissingToken)
        ));
    }

    #[rstest]
    #[case("/realtime/messages?access_token=abc.def.ghi", None, "abc.def.ghi")]
    #[case("/realtime/messages?since=1&access_token=a%2Eb", None, "a.b")]
    #[case("/realtime/messages?access_token=query", Some("Bearer header"), "header")]
    fn stream_token_falls_back_to_query(
        #[case] uri: &str,
        #[case] authorization: Option<&str>,
        #[case] expected: &str,
    ) {
        assert_eq!(stream_token(&parts_for(uri, authorization)).unwrap(), expected);
    }

    #[rstest]
    #[case("/realtime/messages")]
    #[case("/realtime/messages?access_token=")]
    #[case("/realtime/messages?token=abc")]
    fn stream_without_token_is_rejected(#[case] uri: &str) {
        assert!(matches!(
            stream_token(&parts_for(uri, None)),
            Err(AuthError::MissingToken)
        ));
    }

    #[test]
    fn regular_routes_ignore_query_tokens() {
        let parts = parts_for("/me?access_token=abc", None);
        assert!(matches!(bearer_token(&parts), Ok(None)));
    }

    #[rstest]
    #[case(AuthError::MissingToken, StatusCode::UNAUTHORIZED)]
    #[case(AuthError::InvalidToken("exp".into()), StatusCode::UNAUTHORIZED)]
    #[case(AuthError::NotAdmin, StatusCode::FORBIDDEN)]
    #[case(AuthError::Database("down".into()), StatusCode::INTERNAL_SERVER_ERROR)]
    fn rejection_status(#[case] error: AuthError, #[case] status: StatusCode) {
        assert_eq!(error.into_response().status(), status);
    }
}
