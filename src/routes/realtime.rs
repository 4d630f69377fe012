//! Realtime routes
//!
//! Server-sent event streams fed by the in-process change feed.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::Stream;
use std::{convert::Infallible, sync::Arc, time::Duration};
use tokio_stream::{wrappers::BroadcastStream, StreamExt};
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{ensure_admin, AuthError, StreamAuth};
use crate::domain::realtime::{ChangeEvent, ChangeTable};

const KEEP_ALIVE_SECONDS: u64 = 15;

/// Which change events a subscriber receives
#[derive(Debug, Clone, Copy)]
enum Subscription {
    /// Message events the user sent or received
    Messages(Uuid),
    /// Every listing event
    Listings,
}

impl Subscription {
    fn wants(&self, event: &ChangeEvent) -> bool {
        match self {
            Self::Messages(user_id) => {
                event.table == ChangeTable::Messages && event.is_visible_to(*user_id)
            }
            Self::Listings => event.table == ChangeTable::Homes,
        }
    }
}

fn to_sse(event: &ChangeEvent) -> Event {
    Event::default()
        .event(event.event_name())
        .id(event.record_id.to_string())
        .data(serde_json::to_string(event).unwrap_or_default())
}

fn change_stream(
    state: &AppState,
    subscription: Subscription,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.change_feed.subscribe()).filter_map(move |item| {
        match item {
            Ok(event) if subscription.wants(&event) => Some(Ok(to_sse(&event))),
            Ok(_) => None,
            // A slow subscriber misses events but stays connected
            Err(e) => {
                tracing::debug!(error = %e, ?subscription, "Realtime subscriber lagged");
                None
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(KEEP_ALIVE_SECONDS))
            .text("keep-alive"),
    )
}

/// GET /realtime/messages
///
/// Message inserts and read receipts involving the caller. The token may
/// be sent as `?access_token=` instead of a header.
pub async fn stream_messages(
    State(state): State<Arc<AppState>>,
    auth: StreamAuth,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    tracing::debug!(user_id = %auth.user_id, "Message stream opened");
    change_stream(&state, Subscription::Messages(auth.user_id))
}

/// GET /admin/realtime/listings
///
/// Listing inserts, updates and deletes for the moderation dashboard.
pub async fn stream_listings(
    State(state): State<Arc<AppState>>,
    StreamAuth(ctx): StreamAuth,
) -> Result<Sse<impl Stream<Item = Result<Event, Infallible>>>, AuthError> {
    let admin = ensure_admin(&state, ctx).await?;
    tracing::debug!(admin_id = %admin.user_id, "Listing stream opened");
    Ok(change_stream(&state, Subscription::Listings))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::realtime::ChangeKind;

    #[test]
    fn message_subscribers_only_see_their_conversations() {
        let (alice, bob, carol) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let event = ChangeEvent::message(
            ChangeKind::Insert,
            Uuid::new_v4(),
            alice,
            bob,
            serde_json::json!({}),
        );

        assert!(Subscription::Messages(alice).wants(&event));
        assert!(Subscription::Messages(bob).wants(&event));
        assert!(!Subscription::Messages(carol).wants(&event));
        assert!(!Subscription::Listings.wants(&event));
    }

    #[test]
    fn listing_events_reach_the_admin_stream_only() {
        let owner = Uuid::new_v4();
        let event = ChangeEvent::listing(
            ChangeKind::Update,
            Uuid::new_v4(),
            serde_json::json!({ "user_id": owner }),
        );

        assert!(Subscription::Listings.wants(&event));
        assert!(!Subscription::Messages(owner).wants(&event));
    }
}
