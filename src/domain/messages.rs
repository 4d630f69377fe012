//! Direct messages between users, optionally about a listing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::profiles::ProfileSummary;
use crate::error::ValidationErrors;

pub const MAX_MESSAGE_CHARS: usize = 5000;

/// Message entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub recipient_id: Uuid,
    pub property_id: Option<Uuid>,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn involves(&self, user_id: Uuid) -> bool {
        self.sender_id == user_id || self.recipient_id == user_id
    }

    /// The participant that is not `user_id`.
    pub fn counterpart(&self, user_id: Uuid) -> Uuid {
        if self.sender_id == user_id {
            self.recipient_id
        } else {
            self.sender_id
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: Uuid,
    #[serde(default)]
    pub property_id: Option<Uuid>,
    #[serde(default)]
    pub content: String,
}

/// A validated outgoing message
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub recipient_id: Uuid,
    pub property_id: Option<Uuid>,
    pub content: String,
}

impl SendMessageRequest {
    pub fn validate(self, sender_id: Uuid) -> Result<NewMessage, ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.recipient_id == sender_id {
            errors.add("recipient_id", "cannot send a message to yourself");
        }

        let content = self.content.trim().to_string();
        if content.is_empty() {
            errors.add("content", "message cannot be empty");
        } else if content.chars().count() > MAX_MESSAGE_CHARS {
            errors.add(
                "content",
                format!("message must be at most {} characters", MAX_MESSAGE_CHARS),
            );
        }

        errors.into_result(NewMessage {
            recipient_id: self.recipient_id,
            property_id: self.property_id,
            content,
        })
    }
}

/// Which side of the conversation to list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MessageBox {
    #[default]
    Inbox,
    Sent,
    All,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct MessageQuery {
    #[serde(default, rename = "box")]
    pub mailbox: MessageBox,
    #[serde(default)]
    pub search: Option<String>,
}

/// Listing a message refers to
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PropertySummary {
    pub id: Uuid,
    pub title: String,
    pub photo: Option<String>,
}

/// Response DTO with both participants resolved
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub sender: ProfileSummary,
    pub recipient: ProfileSummary,
    pub property: Option<PropertySummary>,
}

impl MessageResponse {
    /// Case-insensitive match on either participant's name, the content or
    /// the property title.
    pub fn matches_search(&self, search: &str) -> bool {
        let needle = search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        let haystacks = [
            self.sender.display_name(),
            self.recipient.display_name(),
            self.content.clone(),
            self.property
                .as_ref()
                .map(|p| p.title.clone())
                .unwrap_or_default(),
        ];
        haystacks
            .iter()
            .any(|h| h.to_lowercase().contains(&needle))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UnreadMessagesResponse {
    pub count: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    fn profile(first: &str, last: &str) -> ProfileSummary {
        ProfileSummary {
            id: Uuid::new_v4(),
            first_name: Some(first.to_string()),
            last_name: Some(last.to_string()),
            avatar_url: None,
        }
    }

    #[fixture]
    fn response() -> MessageResponse {
        MessageResponse {
            id: Uuid::new_v4(),
            content: "Is the flat still available?".to_string(),
            read: false,
            created_at: Utc::now(),
            sender: profile("Chidi", "Okafor"),
            recipient: profile("Amaka", "Bello"),
            property: Some(PropertySummary {
                id: Uuid::new_v4(),
                title: "Bungalow in Enugu".to_string(),
                photo: None,
            }),
        }
    }

    #[test]
    fn rejects_self_and_empty_messages() {
        let me = Uuid::new_v4();
        let errors = SendMessageRequest {
            recipient_id: me,
            property_id: None,
            content: "  ".to_string(),
        }
        .validate(me)
        .unwrap_err();
        assert!(errors.has("recipient_id"));
        assert!(errors.has("content"));
    }

    #[test]
    fn caps_message_length() {
        let errors = SendMessageRequest {
            recipient_id: Uuid::new_v4(),
            property_id: None,
            content: "a".repeat(MAX_MESSAGE_CHARS + 1),
        }
        .validate(Uuid::new_v4())
        .unwrap_err();
        assert!(errors.has("content"));
    }

    #[test]
    fn trims_content() {
        let message = SendMessageRequest {
            recipient_id: Uuid::new_v4(),
            property_id: None,
            content: "  hello ".to_string(),
        }
        .validate(Uuid::new_v4())
        .unwrap();
        assert_eq!(message.content, "hello");
    }

    #[rstest]
    #[case("okafor", true)]
    #[case("AMAKA", true)]
    #[case("available", true)]
    #[case("enugu", true)]
    #[case("", true)]
    #[case("duplex", false)]
    fn search_covers_names_content_and_property(
        response: MessageResponse,
        #[case] search: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(response.matches_search(search), expected);
    }

    #[test]
    fn counterpart_is_the_other_side() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let message = Message {
            id: Uuid::new_v4(),
            sender_id: a,
            recipient_id: b,
            property_id: None,
            content: "hi".to_string(),
            read: false,
            created_at: Utc::now(),
        };
        assert_eq!(message.counterpart(a), b);
        assert_eq!(message.counterpart(b), a);
        assert!(message.involves(a));
        assert!(!message.involves(Uuid::new_v4()));
    }

    #[test]
    fn box_defaults_to_inbox() {
        let query: MessageQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.mailbox, MessageBox::Inbox);
        let query: MessageQuery = serde_json::from_str(r#"{"box":"sent"}"#).unwrap();
        assert_eq!(query.mailbox, MessageBox::Sent);
    }
}
