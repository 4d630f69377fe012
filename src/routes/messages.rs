//! Message routes
//!
//! Direct messages between users. Every write is pushed to the change feed
//! so both participants' open streams update.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{Created, DataResponse, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::messages::{
    Message, MessageBox, MessageQuery, MessageResponse, PropertySummary, SendMessageRequest,
    UnreadMessagesResponse,
};
use crate::domain::profiles::{display_name, ProfileSummary};
use crate::domain::realtime::{ChangeEvent, ChangeKind};
use crate::error::{ApiError, ApiResult};
use crate::services::notifications;

use super::listings::fetch_listing;
use super::profiles::ensure_profile;

#[derive(Debug, sqlx::FromRow)]
struct MessageRow {
    id: Uuid,
    sender_id: Uuid,
    recipient_id: Uuid,
    property_id: Option<Uuid>,
    content: String,
    read: bool,
    created_at: DateTime<Utc>,
    sender_first_name: Option<String>,
    sender_last_name: Option<String>,
    sender_avatar_url: Option<String>,
    recipient_first_name: Option<String>,
    recipient_last_name: Option<String>,
    recipient_avatar_url: Option<String>,
    property_title: Option<String>,
    property_photo: Option<String>,
}

impl MessageRow {
    fn message(&self) -> Message {
        Message {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            property_id: self.property_id,
            content: self.content.clone(),
            read: self.read,
            created_at: self.created_at,
        }
    }
}

impl From<MessageRow> for MessageResponse {
    fn from(row: MessageRow) -> Self {
        let property = match (row.property_id, row.property_title) {
            (Some(id), Some(title)) => Some(PropertySummary {
                id,
                title,
                photo: row.property_photo,
            }),
            _ => None,
        };

        Self {
            id: row.id,
            content: row.content,
            read: row.read,
            created_at: row.created_at,
            sender: ProfileSummary {
                id: row.sender_id,
                first_name: row.sender_first_name,
                last_name: row.sender_last_name,
                avatar_url: row.sender_avatar_url,
            },
            recipient: ProfileSummary {
                id: row.recipient_id,
                first_name: row.recipient_first_name,
                last_name: row.recipient_last_name,
                avatar_url: row.recipient_avatar_url,
            },
            property,
        }
    }
}

const MESSAGE_SELECT: &str = r#"
    SELECT m.id, m.sender_id, m.recipient_id, m.property_id, m.content, m.read, m.created_at,
           s.first_name AS sender_first_name, s.last_name AS sender_last_name,
           s.avatar_url AS sender_avatar_url,
           rc.first_name AS recipient_first_name, rc.last_name AS recipient_last_name,
           rc.avatar_url AS recipient_avatar_url,
           h.title AS property_title, h.photo AS property_photo
    FROM messages m
    LEFT JOIN profiles s ON s.id = m.sender_id
    LEFT JOIN profiles rc ON rc.id = m.recipient_id
    LEFT JOIN homes h ON h.id = m.property_id
"#;

/// `WHERE` clause selecting one side of the caller's mailbox (`$1`).
fn mailbox_clause(mailbox: MessageBox) -> &'static str {
    match mailbox {
        MessageBox::Inbox => "m.recipient_id = $1",
        MessageBox::Sent => "m.sender_id = $1",
        MessageBox::All => "(m.recipient_id = $1 OR m.sender_id = $1)",
    }
}

async fn fetch_message(db: &PgPool, message_id: Uuid) -> ApiResult<MessageRow> {
    sqlx::query_as::<_, MessageRow>(&format!("{} WHERE m.id = $1", MESSAGE_SELECT))
        .bind(message_id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Message not found"))
}

fn message_event(kind: ChangeKind, message: &Message) -> ChangeEvent {
    ChangeEvent::message(
        kind,
        message.id,
        message.sender_id,
        message.recipient_id,
        serde_json::json!({
            "sender_id": message.sender_id,
            "recipient_id": message.recipient_id,
            "property_id": message.property_id,
            "read": message.read,
        }),
    )
}

/// Mark a received message read and tell both participants.
async fn mark_read(state: &AppState, row: &mut MessageRow) -> ApiResult<()> {
    if row.read {
        return Ok(());
    }

    sqlx::query("UPDATE messages SET read = TRUE WHERE id = $1")
        .bind(row.id)
        .execute(&state.db)
        .await?;
    row.read = true;

    state
        .change_feed
        .publish(message_event(ChangeKind::Update, &row.message()));
    Ok(())
}

/// POST /messages
pub async fn send_message(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let new_message = req.validate(auth.user_id)?;

    let recipient_exists: bool =
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM profiles WHERE id = $1)")
            .bind(new_message.recipient_id)
            .fetch_one(&state.db)
            .await?;
    if !recipient_exists {
        return Err(ApiError::not_found("Recipient not found"));
    }

    if let Some(property_id) = new_message.property_id {
        fetch_listing(&state.db, property_id)
            .await
            .map_err(|e| match e {
                ApiError::NotFound(_) => ApiError::not_found("Property not found"),
                other => other,
            })?;
    }

    ensure_profile(&state.db, &auth).await?;

    let id: Uuid = sqlx::query_scalar(
        r#"
        INSERT INTO messages (sender_id, recipient_id, property_id, content)
        VALUES ($1, $2, $3, $4)
        RETURNING id
        "#,
    )
    .bind(auth.user_id)
    .bind(new_message.recipient_id)
    .bind(new_message.property_id)
    .bind(&new_message.content)
    .fetch_one(&state.db)
    .await?;

    let row = fetch_message(&state.db, id).await?;
    let message = row.message();
    state
        .change_feed
        .publish(message_event(ChangeKind::Insert, &message));

    let sender_name = display_name(
        row.sender_first_name.as_deref(),
        row.sender_last_name.as_deref(),
    );
    if let Err(e) = notifications::notify_new_message(
        &state.db,
        message.recipient_id,
        message.id,
        &sender_name,
        &message.content,
    )
    .await
    {
        tracing::warn!(error = %e, "Failed to send message notification");
    }

    tracing::info!(
        sender_id = %auth.user_id,
        recipient_id = %message.recipient_id,
        message_id = %message.id,
        "Message sent"
    );

    Ok(Created(MessageResponse::from(row)))
}

/// GET /messages?box=inbox|sent|all&search=
pub async fn list_messages(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Query(query): Query<MessageQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let rows = sqlx::query_as::<_, MessageRow>(&format!(
        "{} WHERE {} ORDER BY m.created_at DESC",
        MESSAGE_SELECT,
        mailbox_clause(query.mailbox)
    ))
    .bind(auth.user_id)
    .fetch_all(&state.db)
    .await?;

    let matched: Vec<MessageResponse> = rows
        .into_iter()
        .map(MessageResponse::from)
        .filter(|m| {
            query
                .search
                .as_deref()
                .map_or(true, |search| m.matches_search(search))
        })
        .collect();

    let total = matched.len() as u64;
    let page = pagination.slice(&matched).to_vec();

    Ok(Paginated::new(page, &pagination, total))
}

/// GET /messages/:id
///
/// Opening a message as its recipient marks it read.
pub async fn get_message(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(message_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut row = fetch_message(&state.db, message_id).await?;
    let message = row.message();
    if !message.involves(auth.user_id) {
        return Err(ApiError::not_found("Message not found"));
    }

    if message.recipient_id == auth.user_id {
        mark_read(&state, &mut row).await?;
    }

    tracing::debug!(
        user_id = %auth.user_id,
        counterpart = %message.counterpart(auth.user_id),
        "Message opened"
    );

    Ok(Json(DataResponse::new(MessageResponse::from(row))))
}

/// POST /messages/:id/read
pub async fn mark_message_read(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(message_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let mut row = fetch_message(&state.db, message_id).await?;
    let message = row.message();
    if !message.involves(auth.user_id) {
        return Err(ApiError::not_found("Message not found"));
    }
    if message.recipient_id != auth.user_id {
        return Err(ApiError::forbidden("Only the recipient can mark a message read"));
    }

    mark_read(&state, &mut row).await?;

    Ok(Json(DataResponse::new(MessageResponse::from(row))))
}

/// GET /messages/unread-count
pub async fn unread_count(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
) -> Result<impl IntoResponse, ApiError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM messages WHERE recipient_id = $1 AND read = FALSE",
    )
    .bind(auth.user_id)
    .fetch_one(&state.db)
    .await?;

    Ok(Json(DataResponse::new(UnreadMessagesResponse { count })))
}

/// GET /messages/thread/:user_id
///
/// The conversation with one counterpart, oldest first.
pub async fn get_thread(
    State(state): State<Arc<AppState>>,
    auth: RequireAuth,
    Path(other_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if other_id == auth.user_id {
        return Err(ApiError::bad_request("A thread needs two different users"));
    }

    let messages: Vec<MessageResponse> = sqlx::query_as::<_, MessageRow>(&format!(
        r#"
        {}
        WHERE (m.sender_id = $1 AND m.recipient_id = $2)
           OR (m.sender_id = $2 AND m.recipient_id = $1)
        ORDER BY m.created_at ASC
        "#,
        MESSAGE_SELECT
    ))
    .bind(auth.user_id)
    .bind(other_id)
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(MessageResponse::from)
    .collect();

    Ok(Json(DataResponse::new(messages)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn row(property_title: Option<&str>) -> MessageRow {
        MessageRow {
            id: Uuid::new_v4(),
            sender_id: Uuid::new_v4(),
            recipient_id: Uuid::new_v4(),
            property_id: Some(Uuid::new_v4()),
            content: "Is it still available?".to_string(),
            read: false,
            created_at: Utc::now(),
            sender_first_name: Some("Chidi".to_string()),
            sender_last_name: None,
            sender_avatar_url: None,
            recipient_first_name: None,
            recipient_last_name: None,
            recipient_avatar_url: None,
            property_title: property_title.map(str::to_string),
            property_photo: None,
        }
    }

    #[test]
    fn deleted_property_is_dropped_from_response() {
        assert!(MessageResponse::from(row(None)).property.is_none());

        let response = MessageResponse::from(row(Some("Duplex in Abuja")));
        assert_eq!(response.property.map(|p| p.title).as_deref(), Some("Duplex in Abuja"));
        assert_eq!(response.sender.display_name(), "Chidi");
    }

    #[test]
    fn message_events_reach_both_participants() {
        let message = row(None).message();
        let event = message_event(ChangeKind::Insert, &message);
        assert!(event.is_visible_to(message.sender_id));
        assert!(event.is_visible_to(message.recipient_id));
        assert!(!event.is_visible_to(Uuid::new_v4()));
        assert_eq!(event.event_name(), "messages.INSERT");
    }

    #[rstest]
    #[case(MessageBox::Inbox, "m.recipient_id = $1")]
    #[case(MessageBox::Sent, "m.sender_id = $1")]
    fn mailbox_selects_one_side(#[case] mailbox: MessageBox, #[case] clause: &str) {
        assert_eq!(mailbox_clause(mailbox), clause);
        assert!(mailbox_clause(MessageBox::All).contains(clause));
    }
}
