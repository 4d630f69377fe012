//! Payment routes
//!
//! Records only; no money moves through this service.

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::payments::{CreatePaymentRequest, Payment, PaymentResponse};
use crate::error::ApiError;
use crate::services::notifications;

use super::listings::fetch_listing;
use super::profiles::ensure_profile;

#[derive(Debug, sqlx::FromRow)]
struct PaymentRow {
    id: Uuid,
    user_id: Uuid,
    home_id: Uuid,
    amount: Decimal,
    payment_date: DateTime<Utc>,
    home_title: String,
}

impl From<PaymentRow> for PaymentResponse {
    fn from(row: PaymentRow) -> Self {
        Self {
            payment: Payment {
                id: row.id,
                user_id: row.user_id,
                home_id: row.home_id,
                amount: row.amount,
                payment_date: row.payment_date,
            },
            home_title: row.home_title,
        }
    }
}

/// POST /listings/:id/payments
pub async fn create_payment(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(listing_id): Path<Uuid>,
    Json(req): Json<CreatePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let amount = req.validate()?;

    let listing = fetch_listing(&state.db, listing_id).await?;
    if !listing.status.is_public() {
        return Err(ApiError::bad_request("Payments can only be made for active listings"));
    }

    ensure_profile(&state.db, &auth).await?;

    let (id, payment_date): (Uuid, DateTime<Utc>) = sqlx::query_as(
        r#"
        INSERT INTO payments (user_id, home_id, amount)
        VALUES ($1, $2, $3)
        RETURNING id, payment_date
        "#,
    )
    .bind(auth.user_id)
    .bind(listing_id)
    .bind(amount)
    .fetch_one(&state.db)
    .await?;

    if !listing.is_owned_by(auth.user_id) {
        if let Err(e) = notifications::notify_payment_received(
            &state.db,
            listing.user_id,
            id,
            &listing.title,
            amount,
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to send payment notification");
        }
    }

    tracing::info!(
        user_id = %auth.user_id,
        listing_id = %listing_id,
        payment_id = %id,
        amount = %amount,
        "Payment recorded"
    );

    Ok(Created(PaymentResponse {
        payment: Payment {
            id,
            user_id: auth.user_id,
            home_id: listing_id,
            amount,
            payment_date,
        },
        home_title: listing.title,
    }))
}

/// GET /me/payments
pub async fn my_payments(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let payments: Vec<PaymentResponse> = sqlx::query_as::<_, PaymentRow>(
        r#"
        SELECT p.id, p.user_id, p.home_id, p.amount, p.payment_date, h.title AS home_title
        FROM payments p
        JOIN homes h ON h.id = p.home_id
        WHERE p.user_id = $1
        ORDER BY p.payment_date DESC
        "#,
    )
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(PaymentResponse::from)
    .collect();

    Ok(Json(DataResponse::new(payments)))
}
