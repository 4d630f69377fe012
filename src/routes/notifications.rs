//! Notification routes
//!
//! In-app notifications for the current user: list, count, mark read, delete.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::notifications::*;
use crate::error::ApiError;

/// GET /notifications?unread_only=&notification_type=
///
/// Newest first.
pub async fn list_notifications(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(filter): Query<NotificationQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let unread_only = filter.unread_only.unwrap_or(false);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM notifications
        WHERE user_id = $1
        AND ($2::bool = false OR is_read = false)
        AND ($3::text IS NULL OR type = $3)
        "#,
    )
    .bind(auth.user_id)
    .bind(unread_only)
    .bind(&filter.notification_type)
    .fetch_one(&state.db)
    .await?;

    let data: Vec<NotificationResponse> = sqlx::query_as::<_, Notification>(
        r#"
        SELECT id, user_id, type, title, message, data, is_read, read_at, created_at
        FROM notifications
        WHERE user_id = $1
        AND ($2::bool = false OR is_read = false)
        AND ($3::text IS NULL OR type = $3)
        ORDER BY created_at DESC
        LIMIT $4 OFFSET $5
        "#,
    )
    .bind(auth.user_id)
    .bind(unread_only)
    .bind(&filter.notification_type)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(NotificationResponse::from)
    .collect();

    Ok(Paginated::new(data, &pagination, total as u64))
}

/// GET /notifications/unread-count
pub async fn get_unread_count(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM notifications WHERE user_id = $1 AND is_read = false",
    )
    .bind(auth.user_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(DataResponse::new(UnreadCountResponse { count })))
}

/// POST /notifications/read
///
/// Mark the listed notifications read, or every unread one when no ids
/// are given.
pub async fn mark_read(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(input): Json<MarkReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = match input.notification_ids.filter(|ids| !ids.is_empty()) {
        Some(ids) => {
            sqlx::query(
                r#"
                UPDATE notifications
                SET is_read = true, read_at = NOW()
                WHERE user_id = $1 AND id = ANY($2) AND is_read = false
                "#,
            )
            .bind(auth.user_id)
            .bind(&ids)
            .execute(&state.db)
            .await?
        }
        None => {
            sqlx::query(
                r#"
                UPDATE notifications
                SET is_read = true, read_at = NOW()
                WHERE user_id = $1 AND is_read = false
                "#,
            )
            .bind(auth.user_id)
            .execute(&state.db)
            .await?
        }
    };

    tracing::debug!(
        user_id = %auth.user_id,
        marked = result.rows_affected(),
        "Notifications marked read"
    );

    Ok(Json(DataResponse::new(serde_json::json!({
        "marked_count": result.rows_affected()
    }))))
}

/// DELETE /notifications/:id
pub async fn delete_notification(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(notification_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = $1 AND user_id = $2")
        .bind(notification_id)
        .bind(auth.user_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }

    Ok(NoContent)
}
