//! Review routes
//!
//! Only paying customers may review a listing, once each.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::{OptionalAuth, RequireAuth};
use crate::domain::reviews::{
    summarize, CreateReviewRequest, ListingReviews, Review, ReviewEligibility, ReviewResponse,
};
use crate::error::ApiError;
use crate::services::notifications;

use super::listings::{ensure_visible, fetch_listing};
use super::profiles::{ensure_profile, fetch_summaries, summary_or_placeholder};

#[derive(Debug, sqlx::FromRow)]
struct ReviewRow {
    id: Uuid,
    user_id: Uuid,
    home_id: Uuid,
    rating: i16,
    comment: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<ReviewRow> for Review {
    fn from(row: ReviewRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            home_id: row.home_id,
            rating: row.rating,
            comment: row.comment,
            created_at: row.created_at,
        }
    }
}

/// GET /listings/:id/reviews
///
/// Newest first, with reviewer names and the average rating. Hidden
/// listings answer only their owner and admins.
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
    auth: OptionalAuth,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = fetch_listing(&state.db, listing_id).await?;
    ensure_visible(&state.db, &listing, auth.user_id()).await?;

    let reviews: Vec<Review> = sqlx::query_as::<_, ReviewRow>(
        r#"
        SELECT id, user_id, home_id, rating, comment, created_at
        FROM reviews
        WHERE home_id = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(listing_id)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(Review::from)
    .collect();

    let reviewer_ids: Vec<Uuid> = reviews.iter().map(|r| r.user_id).collect();
    let reviewers = fetch_summaries(&state.db, &reviewer_ids).await?;

    let ratings: Vec<i16> = reviews.iter().map(|r| r.rating).collect();
    let summary = summarize(&ratings);

    let reviews = reviews
        .into_iter()
        .map(|r| ReviewResponse {
            reviewer: summary_or_placeholder(&reviewers, r.user_id),
            id: r.id,
            home_id: r.home_id,
            rating: r.rating,
            comment: r.comment,
            created_at: r.created_at,
        })
        .collect();

    Ok(Json(DataResponse::new(ListingReviews { reviews, summary })))
}

/// POST /listings/:id/reviews
pub async fn create_review(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<CreateReviewRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let review = req.validate()?;
    let listing = fetch_listing(&state.db, listing_id).await?;

    let has_paid: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM payments WHERE user_id = $1 AND home_id = $2)",
    )
    .bind(auth.user_id)
    .bind(listing_id)
    .fetch_one(&state.db)
    .await?;

    let already_reviewed: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM reviews WHERE user_id = $1 AND home_id = $2)",
    )
    .bind(auth.user_id)
    .bind(listing_id)
    .fetch_one(&state.db)
    .await?;

    match ReviewEligibility::check(listing.is_owned_by(auth.user_id), has_paid, already_reviewed) {
        ReviewEligibility::Allowed => {}
        ReviewEligibility::OwnListing => {
            return Err(ApiError::forbidden("You cannot review your own listing"))
        }
        ReviewEligibility::NoPayment => {
            return Err(ApiError::forbidden(
                "Only customers who paid for this listing can review it",
            ))
        }
        ReviewEligibility::AlreadyReviewed => {
            return Err(ApiError::conflict("You have already reviewed this listing"))
        }
    }

    ensure_profile(&state.db, &auth).await?;

    // The unique (user_id, home_id) index settles concurrent submissions
    let row = sqlx::query_as::<_, ReviewRow>(
        r#"
        INSERT INTO reviews (user_id, home_id, rating, comment)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (user_id, home_id) DO NOTHING
        RETURNING id, user_id, home_id, rating, comment, created_at
        "#,
    )
    .bind(auth.user_id)
    .bind(listing_id)
    .bind(review.rating)
    .bind(&review.comment)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::conflict("You have already reviewed this listing"))?;
    let review = Review::from(row);

    if let Err(e) = notifications::notify_review_received(
        &state.db,
        listing.user_id,
        listing_id,
        &listing.title,
        review.rating,
    )
    .await
    {
        tracing::warn!(error = %e, "Failed to send review notification");
    }

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %listing_id,
        rating = review.rating,
        "Review created"
    );

    let reviewer = summary_or_placeholder(
        &fetch_summaries(&state.db, &[auth.user_id]).await?,
        auth.user_id,
    );

    Ok(Created(ReviewResponse {
        id: review.id,
        home_id: review.home_id,
        rating: review.rating,
        comment: review.comment,
        reviewer,
        created_at: review.created_at,
    }))
}
