//! Favorite routes
//!
//! A favorite is a bookmark; adding one twice is a no-op.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, NoContent};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::favorites::FavoriteResponse;
use crate::domain::listings::Listing;
use crate::error::ApiError;

use super::listings::{fetch_listing, listing_cards, ListingRow, LISTING_COLUMNS};
use super::profiles::ensure_profile;

/// The caller's favorite ids among `home_ids`, keyed by listing id.
pub(crate) async fn favorite_ids(
    db: &PgPool,
    user_id: Uuid,
    home_ids: &[Uuid],
) -> Result<HashMap<Uuid, Uuid>, sqlx::Error> {
    if home_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows: Vec<(Uuid, Uuid)> = sqlx::query_as(
        "SELECT home_id, id FROM favorites WHERE user_id = $1 AND home_id = ANY($2)",
    )
    .bind(user_id)
    .bind(home_ids)
    .fetch_all(db)
    .await?;

    Ok(rows.into_iter().collect())
}

/// POST /listings/:id/favorite
///
/// 201 when the favorite is new, 200 when it already existed.
pub async fn add_favorite(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = fetch_listing(&state.db, listing_id).await?;
    if !listing.status.is_public() && !listing.is_owned_by(auth.user_id) {
        return Err(ApiError::not_found("Listing not found"));
    }

    ensure_profile(&state.db, &auth).await?;

    let inserted: Option<Uuid> = sqlx::query_scalar(
        r#"
        INSERT INTO favorites (user_id, home_id)
        VALUES ($1, $2)
        ON CONFLICT (user_id, home_id) DO NOTHING
        RETURNING id
        "#,
    )
    .bind(auth.user_id)
    .bind(listing_id)
    .fetch_optional(&state.db)
    .await?;

    let (favorite_id, created) = match inserted {
        Some(id) => (id, true),
        None => {
            let id: Uuid = sqlx::query_scalar(
                "SELECT id FROM favorites WHERE user_id = $1 AND home_id = $2",
            )
            .bind(auth.user_id)
            .bind(listing_id)
            .fetch_one(&state.db)
            .await?;
            (id, false)
        }
    };

    if created {
        tracing::info!(user_id = %auth.user_id, listing_id = %listing_id, "Favorite added");
    }

    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(DataResponse::new(FavoriteResponse {
            favorite_id,
            home_id: listing_id,
            created,
        })),
    ))
}

/// DELETE /listings/:id/favorite
pub async fn remove_favorite(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND home_id = $2")
        .bind(auth.user_id)
        .bind(listing_id)
        .execute(&state.db)
        .await?
        .rows_affected();

    if removed == 0 {
        return Err(ApiError::not_found("Favorite not found"));
    }

    tracing::info!(user_id = %auth.user_id, listing_id = %listing_id, "Favorite removed");

    Ok(NoContent)
}

/// GET /me/favorites
///
/// Favorited listings that are still public, most recently favorited first.
pub async fn my_favorites(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query_as::<_, ListingRow>(&format!(
        r#"
        SELECT {}
        FROM favorites f
        JOIN homes h ON h.id = f.home_id
        WHERE f.user_id = $1 AND h.status = 'active'
        ORDER BY f.created_at DESC
        "#,
        LISTING_COLUMNS
    ))
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;

    let listings: Vec<Listing> = rows.into_iter().map(Listing::from).collect();
    let cards = listing_cards(&state.db, Some(auth.user_id), &listings).await?;

    Ok(Json(DataResponse::new(cards)))
}
