//! Change events published to realtime subscribers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ChangeTable {
    Homes,
    Messages,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A row-level change. `audience` lists the users allowed to see it;
/// an empty audience means admins only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChangeEvent {
    pub table: ChangeTable,
    pub kind: ChangeKind,
    pub record_id: Uuid,
    #[serde(default)]
    pub audience: Vec<Uuid>,
    #[serde(default)]
    pub payload: serde_json::Value,
}

impl ChangeEvent {
    pub fn listing(kind: ChangeKind, listing_id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            table: ChangeTable::Homes,
            kind,
            record_id: listing_id,
            audience: Vec::new(),
            payload,
        }
    }

    pub fn message(
        kind: ChangeKind,
        message_id: Uuid,
        sender_id: Uuid,
        recipient_id: Uuid,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            table: ChangeTable::Messages,
            kind,
            record_id: message_id,
            audience: vec![sender_id, recipient_id],
            payload,
        }
    }

    pub fn is_visible_to(&self, user_id: Uuid) -> bool {
        self.audience.contains(&user_id)
    }

    /// SSE event name, e.g. `messages.INSERT`.
    pub fn event_name(&self) -> String {
        let table = match self.table {
            ChangeTable::Homes => "homes",
            ChangeTable::Messages => "messages",
        };
        let kind = match self.kind {
            ChangeKind::Insert => "INSERT",
            ChangeKind::Update => "UPDATE",
            ChangeKind::Delete => "DELETE",
        };
        format!("{}.{}", table, kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_events_reach_both_participants_only() {
        let (sender, recipient) = (Uuid::new_v4(), Uuid::new_v4());
        let event = ChangeEvent::message(
            ChangeKind::Insert,
            Uuid::new_v4(),
            sender,
            recipient,
            serde_json::Value::Null,
        );
        assert!(event.is_visible_to(sender));
        assert!(event.is_visible_to(recipient));
        assert!(!event.is_visible_to(Uuid::new_v4()));
        assert_eq!(event.event_name(), "messages.INSERT");
    }

    #[test]
    fn listing_events_have_no_user_audience() {
        let event = ChangeEvent::listing(ChangeKind::Update, Uuid::new_v4(), serde_json::json!({}));
        assert!(event.audience.is_empty());
        assert_eq!(event.event_name(), "homes.UPDATE");
    }
}
