//! Listing routes
//!
//! Public browsing of active listings plus owner CRUD. Browsing reads the
//! cached set of active listings and filters it in memory; every write
//! drops that set and the listing's detail entry.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::{PgPool, Postgres};
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{is_admin, OptionalAuth, RequireAuth};
use crate::domain::admin::{AdminAction, AuditTargetType};
use crate::domain::filters::ListingFilter;
use crate::domain::listings::{
    category_catalogue, CreateListingRequest, Listing, ListingCard, ListingDetail, NewListing,
};
use crate::domain::moderation::ModerationAction;
use crate::domain::realtime::{ChangeEvent, ChangeKind};
use crate::domain::reviews::summarize;
use crate::error::{ApiError, ApiResult};
use crate::middleware::ClientInfo;
use crate::services::cache::keys as cache_keys;

use super::admin::log_admin_action;
use super::favorites::favorite_ids;
use super::profiles::{ensure_profile, fetch_summaries};

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ListingRow {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    price: Decimal,
    mode: String,
    #[sqlx(rename = "type")]
    listing_type: String,
    category_name: Option<String>,
    state: String,
    lga: String,
    address: Option<String>,
    size: Option<i32>,
    year_built: Option<i32>,
    features: Vec<String>,
    photo: Option<String>,
    images: Vec<String>,
    bedrooms: Option<String>,
    livingrooms: Option<String>,
    bathrooms: Option<String>,
    added_category: bool,
    added_description: bool,
    status: String,
    reviewed_by: Option<Uuid>,
    rejection_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ListingRow> for Listing {
    fn from(row: ListingRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            title: row.title,
            description: row.description,
            price: row.price,
            mode: row.mode.into(),
            listing_type: row.listing_type.into(),
            category_name: row.category_name,
            state: row.state,
            lga: row.lga,
            address: row.address,
            size: row.size,
            year_built: row.year_built,
            features: row.features,
            photo: row.photo,
            images: row.images,
            bedrooms: row.bedrooms,
            livingrooms: row.livingrooms,
            bathrooms: row.bathrooms,
            added_category: row.added_category,
            added_description: row.added_description,
            status: row.status.into(),
            reviewed_by: row.reviewed_by,
            rejection_reason: row.rejection_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Every `homes` column, qualified with the `h` alias.
pub(crate) const LISTING_COLUMNS: &str = r#"
    h.id, h.user_id, h.title, h.description, h.price, h.mode, h.type,
    h.category_name, h.state, h.lga, h.address, h.size, h.year_built,
    h.features, h.photo, h.images, h.bedrooms, h.livingrooms, h.bathrooms,
    h.added_category, h.added_description, h.status, h.reviewed_by,
    h.rejection_reason, h.created_at, h.updated_at
"#;

/// Bind the validated fields as `$2..=$20`, in `homes` column order.
fn bind_listing_fields<'q, O>(
    query: QueryAs<'q, Postgres, O, PgArguments>,
    listing: &'q NewListing,
) -> QueryAs<'q, Postgres, O, PgArguments> {
    query
        .bind(&listing.title)
        .bind(&listing.description)
        .bind(listing.price)
        .bind(listing.mode.as_str())
        .bind(listing.listing_type.as_str())
        .bind(&listing.category_name)
        .bind(&listing.state)
        .bind(&listing.lga)
        .bind(&listing.address)
        .bind(listing.size)
        .bind(listing.year_built)
        .bind(&listing.features)
        .bind(&listing.photo)
        .bind(&listing.images)
        .bind(&listing.bedrooms)
        .bind(&listing.livingrooms)
        .bind(&listing.bathrooms)
        .bind(listing.added_category)
        .bind(listing.added_description)
}

// ============================================================================
// Helpers shared with other routes
// ============================================================================

/// Load a listing straight from the database.
pub(crate) async fn fetch_listing(db: &PgPool, listing_id: Uuid) -> ApiResult<Listing> {
    let row = sqlx::query_as::<_, ListingRow>(&format!(
        "SELECT {} FROM homes h WHERE h.id = $1",
        LISTING_COLUMNS
    ))
    .bind(listing_id)
    .fetch_optional(db)
    .await?
    .ok_or_else(|| ApiError::not_found("Listing not found"))?;

    Ok(row.into())
}

/// Every active listing, newest first, read through the cache.
pub(crate) async fn load_active_listings(state: &AppState) -> ApiResult<Vec<Listing>> {
    state
        .cache
        .get_or_load(&cache_keys::active_listings(), || async {
            let rows = sqlx::query_as::<_, ListingRow>(&format!(
                "SELECT {} FROM homes h WHERE h.status = 'active' ORDER BY h.created_at DESC",
                LISTING_COLUMNS
            ))
            .fetch_all(&state.db)
            .await?;
            Ok::<_, ApiError>(rows.into_iter().map(Listing::from).collect())
        })
        .await
}

/// Drop cached copies of a listing after a write.
pub(crate) async fn invalidate_listing(state: &AppState, listing_id: Uuid) {
    state
        .cache
        .invalidate(&cache_keys::listing_writes(listing_id))
        .await;
}

/// Change event carrying the fields admin dashboards display.
pub(crate) fn listing_event(kind: ChangeKind, listing: &Listing) -> ChangeEvent {
    ChangeEvent::listing(
        kind,
        listing.id,
        serde_json::json!({
            "user_id": listing.user_id,
            "title": listing.title,
            "status": listing.status,
        }),
    )
}

/// Cards for the given listings with the viewer's favorites flagged.
pub(crate) async fn listing_cards<'a>(
    db: &PgPool,
    viewer: Option<Uuid>,
    listings: impl IntoIterator<Item = &'a Listing>,
) -> Result<Vec<ListingCard>, sqlx::Error> {
    let listings: Vec<&Listing> = listings.into_iter().collect();
    let favorites = match viewer {
        Some(user_id) => {
            let ids: Vec<Uuid> = listings.iter().map(|l| l.id).collect();
            favorite_ids(db, user_id, &ids).await?
        }
        None => HashMap::new(),
    };

    Ok(listings
        .into_iter()
        .map(|l| ListingCard::from_listing(l, favorites.get(&l.id).copied()))
        .collect())
}

/// Who may see a listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Visibility {
    Visible,
    /// Not public; shown only if this viewer is an admin
    AdminOnly(Uuid),
    Hidden,
}

/// Active listings are public; the rest belong to their owner and admins.
pub(crate) fn visibility(listing: &Listing, viewer: Option<Uuid>) -> Visibility {
    match viewer {
        _ if listing.status.is_public() => Visibility::Visible,
        Some(user_id) if listing.is_owned_by(user_id) => Visibility::Visible,
        Some(user_id) => Visibility::AdminOnly(user_id),
        None => Visibility::Hidden,
    }
}

/// 404 for callers who may not see the listing.
pub(crate) async fn ensure_visible(
    db: &PgPool,
    listing: &Listing,
    viewer: Option<Uuid>,
) -> ApiResult<()> {
    let allowed = match visibility(listing, viewer) {
        Visibility::Visible => true,
        Visibility::AdminOnly(user_id) => is_admin(db, user_id).await?,
        Visibility::Hidden => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(ApiError::not_found("Listing not found"))
    }
}

// ============================================================================
// Public browsing
// ============================================================================

/// GET /listings
///
/// Active listings matching the filter, sorted and paginated. An `lga`
/// picked under another state (`lga_state`) is ignored.
pub async fn list_listings(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
    Query(filter): Query<ListingFilter>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let filter = filter.normalized();
    let listings = load_active_listings(&state).await?;
    let matched = filter.apply_sorted(&listings);
    let total = matched.len() as u64;

    let page = pagination.slice(&matched);
    let cards = listing_cards(&state.db, auth.user_id(), page.iter().copied()).await?;

    tracing::debug!(
        matched = total,
        page = pagination.page(),
        "Listing search"
    );

    Ok(Paginated::new(cards, &pagination, total))
}

/// GET /listings/:id
///
/// Active listings are public. Anything else is only shown to its owner
/// and to admins; other callers get a 404.
pub async fn get_listing(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = state
        .cache
        .get_or_load(&cache_keys::listing(listing_id), || {
            fetch_listing(&state.db, listing_id)
        })
        .await?;

    let viewer = auth.user_id();
    ensure_visible(&state.db, &listing, viewer).await?;

    let owner = fetch_summaries(&state.db, &[listing.user_id])
        .await?
        .remove(&listing.user_id);

    let favorite_count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM favorites WHERE home_id = $1")
            .bind(listing_id)
            .fetch_one(&state.db)
            .await?;

    let ratings: Vec<i16> = sqlx::query_scalar("SELECT rating FROM reviews WHERE home_id = $1")
        .bind(listing_id)
        .fetch_all(&state.db)
        .await?;
    let summary = summarize(&ratings);

    let favorite_id = match viewer {
        Some(user_id) => favorite_ids(&state.db, user_id, &[listing_id])
            .await?
            .get(&listing_id)
            .copied(),
        None => None,
    };

    Ok(Json(DataResponse::new(ListingDetail {
        listing,
        owner,
        favorite_id,
        favorite_count,
        average_rating: summary.average_rating,
        review_count: summary.review_count,
    })))
}

/// GET /categories
pub async fn list_categories() -> impl IntoResponse {
    Json(DataResponse::new(category_catalogue()))
}

// ============================================================================
// Owner operations
// ============================================================================

/// POST /listings
///
/// Submit a listing. It waits in `pending` until an admin approves it.
pub async fn create_listing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_listing = req.validate()?;
    ensure_profile(&state.db, &auth).await?;

    let query = format!(
        r#"
        INSERT INTO homes AS h (
            user_id, title, description, price, mode, type, category_name,
            state, lga, address, size, year_built, features, photo, images,
            bedrooms, livingrooms, bathrooms, added_category, added_description,
            status
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15,
                $16, $17, $18, $19, $20, 'pending')
        RETURNING {}
        "#,
        LISTING_COLUMNS
    );

    let row = bind_listing_fields(
        sqlx::query_as::<_, ListingRow>(&query).bind(auth.user_id),
        &new_listing,
    )
    .fetch_one(&state.db)
    .await?;
    let listing = Listing::from(row);

    state.cache.invalidate(&[cache_keys::active_listings()]).await;
    state
        .change_feed
        .publish(listing_event(ChangeKind::Insert, &listing));

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %listing.id,
        listing_type = %listing.listing_type,
        "Listing submitted for review"
    );

    Ok(Created(listing))
}

/// PUT /listings/:id
///
/// Replace every field of the caller's listing. The edit goes back through
/// moderation.
pub async fn update_listing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<CreateListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let current = fetch_listing(&state.db, listing_id).await?;
    if !current.is_owned_by(auth.user_id) {
        return Err(ApiError::forbidden("Only the owner can edit this listing"));
    }

    let new_listing = req.validate()?;
    let next_status = current.status.after_owner_edit();

    let query = format!(
        r#"
        UPDATE homes AS h SET
            title = $2, description = $3, price = $4, mode = $5, type = $6,
            category_name = $7, state = $8, lga = $9, address = $10, size = $11,
            year_built = $12, features = $13, photo = $14, images = $15,
            bedrooms = $16, livingrooms = $17, bathrooms = $18,
            added_category = $19, added_description = $20,
            status = $21, rejection_reason = NULL, reviewed_by = NULL,
            updated_at = NOW()
        WHERE h.id = $1
        RETURNING {}
        "#,
        LISTING_COLUMNS
    );

    let row = bind_listing_fields(
        sqlx::query_as::<_, ListingRow>(&query).bind(listing_id),
        &new_listing,
    )
    .bind(next_status.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Listing not found"))?;
    let listing = Listing::from(row);

    invalidate_listing(&state, listing_id).await;
    state
        .change_feed
        .publish(listing_event(ChangeKind::Update, &listing));

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %listing_id,
        from = %current.status,
        to = %listing.status,
        "Listing edited"
    );

    Ok(Json(DataResponse::new(listing)))
}

/// DELETE /listings/:id
///
/// Owners delete their own listings; admins may delete any, which is audited.
pub async fn delete_listing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    client: ClientInfo,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = fetch_listing(&state.db, listing_id).await?;

    let is_owner = listing.is_owned_by(auth.user_id);
    if !is_owner && !is_admin(&state.db, auth.user_id).await? {
        return Err(ApiError::forbidden("Only the owner can delete this listing"));
    }

    sqlx::query("DELETE FROM homes WHERE id = $1")
        .bind(listing_id)
        .execute(&state.db)
        .await?;

    if !is_owner {
        if let Err(e) = log_admin_action(
            &state.db,
            auth.user_id,
            AdminAction::DeleteListing,
            AuditTargetType::Listing,
            Some(listing_id),
            serde_json::json!({ "title": listing.title, "owner_id": listing.user_id }),
            &client,
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to write audit log");
        }
    }

    invalidate_listing(&state, listing_id).await;
    state
        .change_feed
        .publish(listing_event(ChangeKind::Delete, &listing));

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %listing_id,
        by_admin = !is_owner,
        "Listing deleted"
    );

    Ok(NoContent)
}

/// GET /me/listings
///
/// Every listing the caller owns, whatever its status.
pub async fn my_listings(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query_as::<_, ListingRow>(&format!(
        "SELECT {} FROM homes h WHERE h.user_id = $1 ORDER BY h.created_at DESC",
        LISTING_COLUMNS
    ))
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;

    let listings: Vec<Listing> = rows.into_iter().map(Listing::from).collect();
    let cards = listing_cards(&state.db, Some(auth.user_id), &listings).await?;

    Ok(Json(DataResponse::new(cards)))
}

/// POST /listings/:id/deactivate
///
/// Owner takes an active listing off the market.
pub async fn deactivate_listing(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let current = fetch_listing(&state.db, listing_id).await?;
    if !current.is_owned_by(auth.user_id) {
        return Err(ApiError::forbidden("Only the owner can deactivate this listing"));
    }

    let next = ModerationAction::Deactivate.apply(current.status)?;

    let row = sqlx::query_as::<_, ListingRow>(&format!(
        r#"
        UPDATE homes AS h SET status = $2, updated_at = NOW()
        WHERE h.id = $1 AND h.status = $3
        RETURNING {}
        "#,
        LISTING_COLUMNS
    ))
    .bind(listing_id)
    .bind(next.as_str())
    .bind(current.status.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::conflict("Listing changed while deactivating, try again"))?;
    let listing = Listing::from(row);

    invalidate_listing(&state, listing_id).await;
    state
        .change_feed
        .publish(listing_event(ChangeKind::Update, &listing));

    tracing::info!(user_id = %auth.user_id, listing_id = %listing_id, "Listing deactivated by owner");

    Ok(Json(DataResponse::new(listing)))
}

#[cfg(test)]
impl ListingRow {
    pub(crate) fn sample(status: &str) -> Self {
        ListingRow {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            title: "Plot in Lekki".to_string(),
            description: "Land property".to_string(),
            price: rust_decimal_macros::dec!(12000000),
            mode: "Sale".to_string(),
            listing_type: "Land".to_string(),
            category_name: None,
            state: "Lagos".to_string(),
            lga: "Eti-Osa".to_string(),
            address: None,
            size: Some(600),
            year_built: None,
            features: vec![],
            photo: Some("https://cdn.test/0.png".to_string()),
            images: vec!["https://cdn.test/0.png".to_string()],
            bedrooms: None,
            livingrooms: None,
            bathrooms: Some("0".to_string()),
            added_category: false,
            added_description: false,
            status: status.to_string(),
            reviewed_by: None,
            rejection_reason: Some("blurry photos".to_string()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }
}
