//! Reservation routes
//!
//! Guests request dates on rental listings; owners confirm or cancel.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::reservations::{
    change_status, check_reservable, quote, CreateReservationRequest, ReservableError,
    Reservation, ReservationActor, ReservationResponse, UpdateReservationStatusRequest,
};
use crate::error::ApiError;
use crate::services::notifications;

use super::listings::fetch_listing;
use super::profiles::ensure_profile;

#[derive(Debug, sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    user_id: Uuid,
    home_id: Uuid,
    start_date: NaiveDate,
    end_date: NaiveDate,
    total_price: Decimal,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    owner_id: Uuid,
    home_title: String,
    home_photo: Option<String>,
}

impl ReservationRow {
    fn reservation(&self) -> Reservation {
        Reservation {
            id: self.id,
            user_id: self.user_id,
            home_id: self.home_id,
            start_date: self.start_date,
            end_date: self.end_date,
            total_price: self.total_price,
            status: self.status.clone().into(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

impl From<ReservationRow> for ReservationResponse {
    fn from(row: ReservationRow) -> Self {
        Self {
            reservation: row.reservation(),
            home_title: row.home_title,
            home_photo: row.home_photo,
        }
    }
}

/// Reservation columns as `r`, joined listing as `h`.
const RESERVATION_COLUMNS: &str = r#"
    r.id, r.user_id, r.home_id, r.start_date, r.end_date, r.total_price,
    r.status, r.created_at, r.updated_at,
    h.user_id AS owner_id, h.title AS home_title, h.photo AS home_photo
"#;

impl From<ReservableError> for ApiError {
    fn from(e: ReservableError) -> Self {
        match e {
            ReservableError::OwnListing => ApiError::forbidden(e.to_string()),
            ReservableError::NotActive | ReservableError::NotForRent => {
                ApiError::bad_request(e.to_string())
            }
        }
    }
}

/// POST /listings/:id/reservations
pub async fn create_reservation(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<CreateReservationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    req.validate(Utc::now().date_naive())?;

    let listing = fetch_listing(&state.db, listing_id).await?;
    check_reservable(&listing, auth.user_id)?;
    ensure_profile(&state.db, &auth).await?;

    let total_price = quote(listing.price, req.start_date, req.end_date)?;

    let mut tx = state.db.begin().await?;

    // Serialize bookings per listing so two overlapping requests cannot both pass
    sqlx::query("SELECT id FROM homes WHERE id = $1 FOR UPDATE")
        .bind(listing_id)
        .execute(&mut *tx)
        .await?;

    let existing = sqlx::query_as::<_, ReservationRow>(&format!(
        r#"
        SELECT {}
        FROM reservations r
        JOIN homes h ON h.id = r.home_id
        WHERE r.home_id = $1 AND r.status IN ('pending', 'confirmed')
        "#,
        RESERVATION_COLUMNS
    ))
    .bind(listing_id)
    .fetch_all(&mut *tx)
    .await?;

    if existing
        .iter()
        .any(|row| row.reservation().overlaps(req.start_date, req.end_date))
    {
        return Err(ApiError::conflict("These dates are already reserved"));
    }

    let row = sqlx::query_as::<_, ReservationRow>(&format!(
        r#"
        WITH r AS (
            INSERT INTO reservations (user_id, home_id, start_date, end_date, total_price, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING *
        )
        SELECT {}
        FROM r
        JOIN homes h ON h.id = r.home_id
        "#,
        RESERVATION_COLUMNS
    ))
    .bind(auth.user_id)
    .bind(listing_id)
    .bind(req.start_date)
    .bind(req.end_date)
    .bind(total_price)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    if let Err(e) =
        notifications::notify_reservation_requested(&state.db, listing.user_id, row.id, &listing.title)
            .await
    {
        tracing::warn!(error = %e, "Failed to send reservation notification");
    }

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %listing_id,
        reservation_id = %row.id,
        total_price = %total_price,
        "Reservation requested"
    );

    Ok(Created(ReservationResponse::from(row)))
}

/// GET /me/reservations
pub async fn my_reservations(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let reservations: Vec<ReservationResponse> = sqlx::query_as::<_, ReservationRow>(&format!(
        r#"
        SELECT {}
        FROM reservations r
        JOIN homes h ON h.id = r.home_id
        WHERE r.user_id = $1
        ORDER BY r.start_date DESC
        "#,
        RESERVATION_COLUMNS
    ))
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(ReservationResponse::from)
    .collect();

    Ok(Json(DataResponse::new(reservations)))
}

/// GET /listings/:id/reservations
///
/// Every reservation on one of the caller's listings.
pub async fn listing_reservations(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = fetch_listing(&state.db, listing_id).await?;
    if !listing.is_owned_by(auth.user_id) {
        return Err(ApiError::forbidden("Only the owner can view reservations for this listing"));
    }

    let reservations: Vec<ReservationResponse> = sqlx::query_as::<_, ReservationRow>(&format!(
        r#"
        SELECT {}
        FROM reservations r
        JOIN homes h ON h.id = r.home_id
        WHERE r.home_id = $1
        ORDER BY r.start_date ASC
        "#,
        RESERVATION_COLUMNS
    ))
    .bind(listing_id)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(ReservationResponse::from)
    .collect();

    Ok(Json(DataResponse::new(reservations)))
}

/// POST /reservations/:id/status
pub async fn update_reservation_status(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(reservation_id): Path<Uuid>,
    Json(req): Json<UpdateReservationStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let row = sqlx::query_as::<_, ReservationRow>(&format!(
        r#"
        SELECT {}
        FROM reservations r
        JOIN homes h ON h.id = r.home_id
        WHERE r.id = $1
        "#,
        RESERVATION_COLUMNS
    ))
    .bind(reservation_id)
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::not_found("Reservation not found"))?;

    let actor = if row.owner_id == auth.user_id {
        ReservationActor::Owner
    } else if row.user_id == auth.user_id {
        ReservationActor::Guest
    } else {
        return Err(ApiError::not_found("Reservation not found"));
    };

    let current = row.reservation().status;
    let next = change_status(current, req.status, actor).map_err(ApiError::conflict)?;

    let updated = sqlx::query_as::<_, ReservationRow>(&format!(
        r#"
        WITH r AS (
            UPDATE reservations SET status = $2, updated_at = NOW()
            WHERE id = $1 AND status = $3
            RETURNING *
        )
        SELECT {}
        FROM r
        JOIN homes h ON h.id = r.home_id
        "#,
        RESERVATION_COLUMNS
    ))
    .bind(reservation_id)
    .bind(next.as_str())
    .bind(current.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::conflict("Reservation changed, reload and try again"))?;

    // Tell the other side
    let notify = match actor {
        ReservationActor::Owner => updated.user_id,
        ReservationActor::Guest => updated.owner_id,
    };
    if let Err(e) = notifications::notify_reservation_status(
        &state.db,
        notify,
        reservation_id,
        &updated.home_title,
        next,
    )
    .await
    {
        tracing::warn!(error = %e, "Failed to send reservation status notification");
    }

    tracing::info!(
        user_id = %auth.user_id,
        reservation_id = %reservation_id,
        from = %current,
        to = %next,
        "Reservation status changed"
    );

    Ok(Json(DataResponse::new(ReservationResponse::from(updated))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use rstest::rstest;

    #[rstest]
    #[case(ReservableError::OwnListing, StatusCode::FORBIDDEN)]
    #[case(ReservableError::NotActive, StatusCode::BAD_REQUEST)]
    #[case(ReservableError::NotForRent, StatusCode::BAD_REQUEST)]
    fn reservable_errors_map_to_status(#[case] error: ReservableError, #[case] status: StatusCode) {
        assert_eq!(ApiError::from(error).status_code(), status);
    }
}
