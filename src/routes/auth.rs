//! Authentication routes
//!
//! These routes proxy authentication requests to Supabase Auth and keep
//! the local profile row in step with the auth user.

use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;
use url::Url;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::{is_admin, RequireAuth};
use crate::domain::auth::{
    AuthResponse, CodeExchangeRequest, OAuthProvider, OAuthQuery, OAuthUrlResponse, PkceChallenge,
    RefreshTokenRequest, SessionResponse, SignInRequest, SignUpRequest, SignupPendingResponse,
    SupabaseAuthResponse, SupabaseErrorResponse, SupabaseSignupResponse, SupabaseUser, User,
    VerifyRequest,
};
use crate::error::{ApiError, ApiResult};

use super::profiles::upsert_profile;

fn auth_url(state: &AppState, path: &str) -> String {
    format!("{}/auth/v1/{}", state.settings.supabase_url, path)
}

fn unreachable_auth(e: reqwest::Error) -> ApiError {
    ApiError::upstream(format!("Failed to connect to auth service: {}", e))
}

/// Turn a failed Supabase response into an API error. 5xx answers are the
/// auth service's problem; anything else is reported with `client_error`.
async fn supabase_failure(
    response: reqwest::Response,
    fallback: &str,
    client_error: fn(String) -> ApiError,
) -> ApiError {
    let status = response.status();
    let message = response
        .json::<SupabaseErrorResponse>()
        .await
        .map(|e| e.get_message())
        .unwrap_or_else(|_| fallback.to_string());

    if status.is_server_error() {
        tracing::error!(status = %status, message = %message, "Auth service error");
        ApiError::upstream(message)
    } else {
        client_error(message)
    }
}

fn parse_user_id(id: &str) -> ApiResult<Uuid> {
    id.parse()
        .map_err(|_| ApiError::internal("Invalid user ID from auth service"))
}

/// Make sure the auth user has a profile row.
async fn sync_profile(state: &AppState, user: &SupabaseUser) -> ApiResult<()> {
    let user_id = parse_user_id(&user.id)?;
    let (first_name, last_name) = user.names();
    let avatar_url = user.avatar_url();

    upsert_profile(
        &state.db,
        user_id,
        user.email.as_deref(),
        first_name.as_deref(),
        last_name.as_deref(),
        avatar_url.as_deref(),
    )
    .await?;
    Ok(())
}

/// Sync the profile and shape a token response for the client.
async fn establish_session(state: &AppState, auth: SupabaseAuthResponse) -> ApiResult<AuthResponse> {
    sync_profile(state, &auth.user).await?;

    Ok(AuthResponse {
        access_token: auth.access_token,
        refresh_token: auth.refresh_token,
        expires_in: auth.expires_in,
        user: User::from(auth.user),
    })
}

async fn read_token_response(response: reqwest::Response) -> ApiResult<SupabaseAuthResponse> {
    response
        .json()
        .await
        .map_err(|e| ApiError::upstream(format!("Failed to parse auth response: {}", e)))
}

/// POST /auth/signup
///
/// Register a new user with Supabase and create a profile.
pub async fn sign_up(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignUpRequest>,
) -> Result<Response, ApiError> {
    req.validate()?;

    let email = req.email.trim().to_lowercase();
    let response = state
        .http_client
        .post(auth_url(&state, "signup"))
        .header("apikey", &state.settings.supabase_anon_key)
        .json(&serde_json::json!({
            "email": email,
            "password": req.password,
            "data": req.metadata(),
        }))
        .send()
        .await
        .map_err(unreachable_auth)?;

    if !response.status().is_success() {
        return Err(supabase_failure(response, "Sign up failed", ApiError::bad_request).await);
    }

    // Tokens come back only when email confirmation is disabled
    let body = response
        .text()
        .await
        .map_err(|e| ApiError::upstream(format!("Failed to read auth response: {}", e)))?;

    if let Ok(auth) = serde_json::from_str::<SupabaseAuthResponse>(&body) {
        let session = establish_session(&state, auth).await?;
        tracing::info!(user_id = %session.user.id, "User signed up");
        return Ok(Created(session).into_response());
    }

    if let Ok(signup) = serde_json::from_str::<SupabaseSignupResponse>(&body) {
        let user_id = parse_user_id(&signup.id)?;
        upsert_profile(
            &state.db,
            user_id,
            Some(email.as_str()),
            req.first_name.as_deref().map(str::trim),
            req.last_name.as_deref().map(str::trim),
            None,
        )
        .await?;

        tracing::info!(user_id = %user_id, "User signed up, confirmation pending");
        let pending = SignupPendingResponse::from(signup);
        return Ok(Created(pending).into_response());
    }

    Err(ApiError::upstream("Failed to parse auth response: unexpected format"))
}

/// POST /auth/signin
///
/// Sign in with email and password.
pub async fn sign_in(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignInRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .http_client
        .post(auth_url(&state, "token?grant_type=password"))
        .header("apikey", &state.settings.supabase_anon_key)
        .json(&serde_json::json!({
            "email": req.email.trim(),
            "password": req.password
        }))
        .send()
        .await
        .map_err(unreachable_auth)?;

    if !response.status().is_success() {
        return Err(supabase_failure(response, "Invalid credentials", ApiError::unauthorized).await);
    }

    let session = establish_session(&state, read_token_response(response).await?).await?;
    Ok(Json(DataResponse::new(session)))
}

/// POST /auth/signout
///
/// Revokes the refresh tokens of the current session. Always succeeds
/// locally; the access token expires on its own.
pub async fn sign_out(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .http_client
        .post(auth_url(&state, "logout"))
        .header("apikey", &state.settings.supabase_anon_key)
        .bearer_auth(auth.token())
        .send()
        .await;

    if let Err(e) = result {
        tracing::warn!(error = %e, user_id = %auth.user_id, "Sign out request failed");
    }

    Ok(NoContent)
}

/// GET /auth/session
///
/// Get the current session/user info.
pub async fn get_session(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .http_client
        .get(auth_url(&state, "user"))
        .header("apikey", &state.settings.supabase_anon_key)
        .bearer_auth(auth.token())
        .send()
        .await
        .map_err(unreachable_auth)?;

    if !response.status().is_success() {
        return Err(supabase_failure(response, "Invalid session", ApiError::unauthorized).await);
    }

    let supabase_user: SupabaseUser = response
        .json()
        .await
        .map_err(|e| ApiError::upstream(format!("Failed to parse user response: {}", e)))?;

    let session = SessionResponse {
        user: User::from(supabase_user),
        access_token: auth.token().to_string(),
        expires_at: auth.claims().exp,
        is_admin: is_admin(&state.db, auth.user_id).await?,
    };

    Ok(Json(DataResponse::new(session)))
}

/// POST /auth/refresh
///
/// Refresh the access token.
pub async fn refresh_token(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RefreshTokenRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .http_client
        .post(auth_url(&state, "token?grant_type=refresh_token"))
        .header("apikey", &state.settings.supabase_anon_key)
        .json(&serde_json::json!({ "refresh_token": req.refresh_token }))
        .send()
        .await
        .map_err(unreachable_auth)?;

    if !response.status().is_success() {
        return Err(supabase_failure(response, "Invalid refresh token", ApiError::unauthorized).await);
    }

    let auth = read_token_response(response).await?;
    Ok(Json(DataResponse::new(AuthResponse {
        access_token: auth.access_token,
        refresh_token: auth.refresh_token,
        expires_in: auth.expires_in,
        user: User::from(auth.user),
    })))
}

/// Supabase authorize URL for an OAuth provider.
pub(crate) fn oauth_authorize_url(
    supabase_url: &str,
    provider: OAuthProvider,
    redirect_to: &str,
    pkce: Option<&PkceChallenge>,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(supabase_url)?.join("/auth/v1/authorize")?;
    {
        let mut query = url.query_pairs_mut();
        query
            .append_pair("provider", provider.as_str())
            .append_pair("redirect_to", redirect_to);
        if let Some(pkce) = pkce {
            query
                .append_pair("code_challenge", &pkce.challenge)
                .append_pair("code_challenge_method", pkce.method);
        }
    }
    Ok(url)
}

/// GET /auth/oauth/:provider
///
/// Where to send the browser to sign in with a third-party account.
pub async fn oauth_url(
    State(state): State<Arc<AppState>>,
    Path(provider): Path<String>,
    Query(query): Query<OAuthQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let provider = OAuthProvider::parse(&provider)
        .ok_or_else(|| ApiError::bad_request(format!("Unsupported provider: {}", provider)))?;

    let redirect_to = query
        .redirect_to
        .as_deref()
        .filter(|r| !r.trim().is_empty())
        .unwrap_or(state.settings.oauth_redirect_url.as_str());
    let pkce = query.pkce()?;

    let url = oauth_authorize_url(
        &state.settings.supabase_url,
        provider,
        redirect_to,
        pkce.as_ref(),
    )
        .map_err(|e| ApiError::internal(format!("Invalid auth service URL: {}", e)))?;

    Ok(Json(DataResponse::new(OAuthUrlResponse {
        provider,
        url: url.to_string(),
    })))
}

/// POST /auth/callback
///
/// Exchange the PKCE code from the OAuth redirect for a session.
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CodeExchangeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .http_client
        .post(auth_url(&state, "token?grant_type=pkce"))
        .header("apikey", &state.settings.supabase_anon_key)
        .json(&serde_json::json!({
            "auth_code": req.auth_code,
            "code_verifier": req.code_verifier,
        }))
        .send()
        .await
        .map_err(unreachable_auth)?;

    if !response.status().is_success() {
        return Err(supabase_failure(response, "Invalid authorization code", ApiError::unauthorized).await);
    }

    let session = establish_session(&state, read_token_response(response).await?).await?;
    tracing::info!(user_id = %session.user.id, "OAuth sign in");
    Ok(Json(DataResponse::new(session)))
}

/// POST /auth/verify
///
/// Confirm an email address from the link sent at sign up.
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    Json(req): Json<VerifyRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let response = state
        .http_client
        .post(auth_url(&state, "verify"))
        .header("apikey", &state.settings.supabase_anon_key)
        .json(&serde_json::json!({
            "token_hash": req.token_hash,
            "type": req.verify_type,
        }))
        .send()
        .await
        .map_err(unreachable_auth)?;

    if !response.status().is_success() {
        return Err(
            supabase_failure(response, "Invalid or expired confirmation link", ApiError::bad_request)
                .await,
        );
    }

    let session = establish_session(&state, read_token_response(response).await?).await?;
    Ok(Json(DataResponse::new(session)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_carries_provider_and_redirect() {
        let url = oauth_authorize_url(
            "https://abc.supabase.co",
            OAuthProvider::Google,
            "https://garvani.test/auth/callback?next=/me",
            None,
        )
        .unwrap();

        assert_eq!(url.path(), "/auth/v1/authorize");
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("provider".to_string(), "google".to_string()),
                (
                    "redirect_to".to_string(),
                    "https://garvani.test/auth/callback?next=/me".to_string()
                ),
            ]
        );
    }

    #[test]
    fn authorize_url_forwards_pkce_challenge() {
        let pkce = PkceChallenge {
            challenge: "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM".to_string(),
            method: "s256",
        };
        let url = oauth_authorize_url(
            "https://abc.supabase.co",
            OAuthProvider::Github,
            "https://garvani.test/auth/callback",
            Some(&pkce),
        )
        .unwrap();

        let pairs: std::collections::HashMap<String, String> = url
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        assert_eq!(pairs["code_challenge"], pkce.challenge);
        assert_eq!(pairs["code_challenge_method"], "s256");
        assert_eq!(pairs["provider"], "github");
    }

    #[test]
    fn authorize_url_rejects_garbage_base() {
        assert!(oauth_authorize_url("not a url", OAuthProvider::Github, "/", None).is_err());
    }

    #[test]
    fn user_ids_must_be_uuids() {
        assert!(parse_user_id("6f1c").is_err());
        assert!(parse_user_id("00000000-0000-0000-0000-000000000000").is_ok());
    }
}
