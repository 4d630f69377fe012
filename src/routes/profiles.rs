//! Profile routes
//!
//! Own profile management with Redis caching, plus the public subset of
//! anyone else's profile.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::{AuthContext, RequireAuth};
use crate::domain::profiles::{Profile, ProfileSummary, UpdateProfileRequest};
use crate::error::{ApiError, ApiResult};
use crate::services::cache::keys as cache_keys;

/// Database row for profile
#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProfileRow> for Profile {
    fn from(row: ProfileRow) -> Self {
        Self {
            id: row.id,
            email: row.email,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SummaryRow {
    id: Uuid,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
}

impl From<SummaryRow> for ProfileSummary {
    fn from(row: SummaryRow) -> Self {
        Self {
            id: row.id,
            first_name: row.first_name,
            last_name: row.last_name,
            avatar_url: row.avatar_url,
        }
    }
}

const PROFILE_COLUMNS: &str = "id, email, first_name, last_name, avatar_url, created_at, updated_at";

// ============================================================================
// Helpers shared with other routes
// ============================================================================

/// Create the caller's profile from token metadata if it does not exist yet.
/// Existing rows are left untouched.
pub(crate) async fn ensure_profile(db: &PgPool, auth: &AuthContext) -> Result<(), sqlx::Error> {
    upsert_profile(db, auth.user_id, auth.email.as_deref(), auth.first_name(), auth.last_name(), None).await
}

/// Insert a profile unless one exists.
pub(crate) async fn upsert_profile(
    db: &PgPool,
    user_id: Uuid,
    email: Option<&str>,
    first_name: Option<&str>,
    last_name: Option<&str>,
    avatar_url: Option<&str>,
) -> Result<(), sqlx::Error> {
    let inserted = sqlx::query(
        r#"
        INSERT INTO profiles (id, email, first_name, last_name, avatar_url)
        VALUES ($1, $2, $3, $4, $5)
        ON CONFLICT (id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(email)
    .bind(first_name)
    .bind(last_name)
    .bind(avatar_url)
    .execute(db)
    .await?
    .rows_affected();

    if inserted > 0 {
        tracing::info!(user_id = %user_id, "Profile created");
    }
    Ok(())
}

/// Public summaries keyed by user id. Unknown ids are simply absent.
pub(crate) async fn fetch_summaries(
    db: &PgPool,
    user_ids: &[Uuid],
) -> Result<HashMap<Uuid, ProfileSummary>, sqlx::Error> {
    if user_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query_as::<_, SummaryRow>(
        "SELECT id, first_name, last_name, avatar_url FROM profiles WHERE id = ANY($1)",
    )
    .bind(user_ids)
    .fetch_all(db)
    .await?;

    Ok(rows
        .into_iter()
        .map(|row| (row.id, ProfileSummary::from(row)))
        .collect())
}

/// Summary for a user whose profile row may be gone.
pub(crate) fn summary_or_placeholder(summaries: &HashMap<Uuid, ProfileSummary>, user_id: Uuid) -> ProfileSummary {
    summaries.get(&user_id).cloned().unwrap_or(ProfileSummary {
        id: user_id,
        first_name: None,
        last_name: None,
        avatar_url: None,
    })
}

async fn fetch_profile(db: &PgPool, user_id: Uuid) -> ApiResult<Profile> {
    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        "SELECT {} FROM profiles WHERE id = $1",
        PROFILE_COLUMNS
    ))
    .bind(user_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(row.into())
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /profiles/me
///
/// Get the current user's profile. Uses Redis cache for performance.
pub async fn get_my_profile(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let profile = state
        .cache
        .get_or_load(&cache_keys::profile(auth.user_id), || async {
            ensure_profile(&state.db, &auth).await?;
            fetch_profile(&state.db, auth.user_id).await
        })
        .await?;

    Ok(Json(DataResponse::new(profile)))
}

/// PUT /profiles/me
///
/// Update the current user's profile. Absent fields keep their value.
pub async fn update_my_profile(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    ensure_profile(&state.db, &auth).await?;

    let trimmed = |v: &Option<String>| v.as_deref().map(str::trim).map(str::to_string);

    let row = sqlx::query_as::<_, ProfileRow>(&format!(
        r#"
        UPDATE profiles SET
            first_name = COALESCE($2, first_name),
            last_name = COALESCE($3, last_name),
            avatar_url = COALESCE($4, avatar_url),
            updated_at = NOW()
        WHERE id = $1
        RETURNING {}
        "#,
        PROFILE_COLUMNS
    ))
    .bind(auth.user_id)
    .bind(trimmed(&req.first_name))
    .bind(trimmed(&req.last_name))
    .bind(trimmed(&req.avatar_url))
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    let profile = Profile::from(row);

    let cache_key = cache_keys::profile(auth.user_id);
    state.cache.invalidate(&[cache_key.clone()]).await;
    if let Err(e) = state.cache.set(&cache_key, &profile).await {
        tracing::warn!(error = %e, "Failed to cache profile");
    }

    tracing::info!(user_id = %auth.user_id, "Profile updated");

    Ok(Json(DataResponse::new(profile)))
}

/// GET /profiles/:id
///
/// Public subset of any profile.
pub async fn get_profile(
    State(state): State<Arc<AppState>>,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let summary = fetch_summaries(&state.db, &[user_id])
        .await?
        .remove(&user_id)
        .ok_or_else(|| ApiError::not_found("Profile not found"))?;

    Ok(Json(DataResponse::new(summary)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn placeholder_keeps_the_id() {
        let id = Uuid::new_v4();
        let summary = summary_or_placeholder(&HashMap::new(), id);
        assert_eq!(summary.id, id);
        assert_eq!(summary.display_name(), "");
    }

    #[test]
    fn known_profiles_are_returned_as_is() {
        let id = Uuid::new_v4();
        let mut summaries = HashMap::new();
        summaries.insert(
            id,
            ProfileSummary {
                id,
                first_name: Some("Ada".to_string()),
                last_name: Some("Obi".to_string()),
                avatar_url: None,
            },
        );
        assert_eq!(summary_or_placeholder(&summaries, id).display_name(), "Ada Obi");
    }
}
