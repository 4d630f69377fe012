//! Notification domain types
//!
//! In-app alerts raised by moderation, messaging, reviews, reservations
//! and payments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Notification type enum
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    // Moderation
    ListingApproved,
    ListingRejected,
    ListingDeactivated,
    ListingReactivated,

    NewMessage,
    ReviewReceived,

    // Reservations and payments
    ReservationRequested,
    ReservationStatusChanged,
    PaymentReceived,

    System,
}

impl std::fmt::Display for NotificationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", s.trim_matches('"'))
    }
}

impl From<String> for NotificationType {
    fn from(s: String) -> Self {
        serde_json::from_str(&format!("\"{}\"", s)).unwrap_or(NotificationType::System)
    }
}

/// Notification entity
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(rename = "type")]
    pub notification_type: String,
    pub title: String,
    pub message: Option<String>,
    pub data: sqlx::types::Json<serde_json::Value>,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Query params for listing notifications
#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: Option<bool>,
    #[serde(default)]
    pub notification_type: Option<String>,
}

/// Response DTO for notification
#[derive(Debug, Clone, Serialize)]
pub struct NotificationResponse {
    pub id: Uuid,
    pub notification_type: String,
    pub title: String,
    pub message: Option<String>,
    pub data: serde_json::Value,
    pub is_read: bool,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl From<Notification> for NotificationResponse {
    fn from(n: Notification) -> Self {
        Self {
            id: n.id,
            notification_type: n.notification_type,
            title: n.title,
            message: n.message,
            data: n.data.0,
            is_read: n.is_read,
            read_at: n.read_at,
            created_at: n.created_at,
        }
    }
}

/// Unread count response
#[derive(Debug, Clone, Serialize)]
pub struct UnreadCountResponse {
    pub count: i64,
}

/// Mark notifications as read request; no ids means all of them
#[derive(Debug, Clone, Deserialize, Default)]
pub struct MarkReadRequest {
    #[serde(default)]
    pub notification_ids: Option<Vec<Uuid>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(NotificationType::ListingApproved, "listing_approved")]
    #[case(NotificationType::ReservationStatusChanged, "reservation_status_changed")]
    #[case(NotificationType::NewMessage, "new_message")]
    fn type_column_values(#[case] kind: NotificationType, #[case] column: &str) {
        assert_eq!(kind.to_string(), column);
        assert_eq!(NotificationType::from(column.to_string()), kind);
    }

    #[test]
    fn unknown_type_falls_back_to_system() {
        assert_eq!(
            NotificationType::from("weekly_digest".to_string()),
            NotificationType::System
        );
    }
}
