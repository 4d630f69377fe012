//! Notification service
//!
//! Routes call these helpers when an event should reach a user's inbox.
//! Failures are the caller's to log; a missed notification never fails
//! the request that triggered it.

use rust_decimal::Decimal;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::notifications::NotificationType;
use crate::domain::reservations::ReservationStatus;

/// Create a notification for a user
pub async fn create_notification(
    db: &PgPool,
    user_id: Uuid,
    notification_type: NotificationType,
    title: &str,
    message: Option<&str>,
    data: serde_json::Value,
) -> Result<Uuid, sqlx::Error> {
    let id = Uuid::new_v4();
    let type_str = notification_type.to_string();

    sqlx::query(
        r#"
        INSERT INTO notifications (id, user_id, type, title, message, data)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(id)
    .bind(user_id)
    .bind(&type_str)
    .bind(title)
    .bind(message)
    .bind(&data)
    .execute(db)
    .await?;

    tracing::info!(
        user_id = %user_id,
        notification_type = %type_str,
        notification_id = %id,
        "Notification created"
    );

    Ok(id)
}

pub async fn notify_listing_approved(
    db: &PgPool,
    owner_id: Uuid,
    listing_id: Uuid,
    listing_title: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        owner_id,
        NotificationType::ListingApproved,
        "Your listing is live",
        Some(&format!("'{}' has been approved and is now visible.", listing_title)),
        serde_json::json!({ "home_id": listing_id, "title": listing_title }),
    )
    .await
}

pub async fn notify_listing_rejected(
    db: &PgPool,
    owner_id: Uuid,
    listing_id: Uuid,
    listing_title: &str,
    reason: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        owner_id,
        NotificationType::ListingRejected,
        "Your listing was not approved",
        Some(&format!(
            "'{}' was rejected: {}. Edit the listing to submit it again.",
            listing_title, reason
        )),
        serde_json::json!({ "home_id": listing_id, "title": listing_title, "reason": reason }),
    )
    .await
}

pub async fn notify_listing_deactivated(
    db: &PgPool,
    owner_id: Uuid,
    listing_id: Uuid,
    listing_title: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        owner_id,
        NotificationType::ListingDeactivated,
        "Your listing was deactivated",
        Some(&format!("'{}' is no longer visible to browsers.", listing_title)),
        serde_json::json!({ "home_id": listing_id, "title": listing_title }),
    )
    .await
}

pub async fn notify_listing_reactivated(
    db: &PgPool,
    owner_id: Uuid,
    listing_id: Uuid,
    listing_title: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        owner_id,
        NotificationType::ListingReactivated,
        "Your listing is live again",
        Some(&format!("'{}' has been reactivated.", listing_title)),
        serde_json::json!({ "home_id": listing_id, "title": listing_title }),
    )
    .await
}

pub async fn notify_new_message(
    db: &PgPool,
    recipient_id: Uuid,
    message_id: Uuid,
    sender_name: &str,
    preview: &str,
) -> Result<Uuid, sqlx::Error> {
    let preview: String = preview.chars().take(100).collect();
    let sender = if sender_name.is_empty() {
        "Someone"
    } else {
        sender_name
    };
    create_notification(
        db,
        recipient_id,
        NotificationType::NewMessage,
        &format!("New message from {}", sender),
        Some(&preview),
        serde_json::json!({ "message_id": message_id }),
    )
    .await
}

pub async fn notify_review_received(
    db: &PgPool,
    owner_id: Uuid,
    listing_id: Uuid,
    listing_title: &str,
    rating: i16,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        owner_id,
        NotificationType::ReviewReceived,
        "New review",
        Some(&format!("'{}' received a {}-star review.", listing_title, rating)),
        serde_json::json!({ "home_id": listing_id, "rating": rating }),
    )
    .await
}

pub async fn notify_reservation_requested(
    db: &PgPool,
    owner_id: Uuid,
    reservation_id: Uuid,
    listing_title: &str,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        owner_id,
        NotificationType::ReservationRequested,
        "New reservation request",
        Some(&format!("Someone wants to reserve '{}'.", listing_title)),
        serde_json::json!({ "reservation_id": reservation_id }),
    )
    .await
}

pub async fn notify_reservation_status(
    db: &PgPool,
    user_id: Uuid,
    reservation_id: Uuid,
    listing_title: &str,
    status: ReservationStatus,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        user_id,
        NotificationType::ReservationStatusChanged,
        &format!("Reservation {}", status),
        Some(&format!("Your reservation for '{}' is now {}.", listing_title, status)),
        serde_json::json!({ "reservation_id": reservation_id, "status": status }),
    )
    .await
}

pub async fn notify_payment_received(
    db: &PgPool,
    owner_id: Uuid,
    payment_id: Uuid,
    listing_title: &str,
    amount: Decimal,
) -> Result<Uuid, sqlx::Error> {
    create_notification(
        db,
        owner_id,
        NotificationType::PaymentReceived,
        "Payment recorded",
        Some(&format!("A payment of {} was recorded for '{}'.", amount, listing_title)),
        serde_json::json!({ "payment_id": payment_id, "amount": amount }),
    )
    .await
}
