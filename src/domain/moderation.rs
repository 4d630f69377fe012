//! Listing moderation workflow
//!
//! Status changes a listing may go through, whoever triggers them:
//!
//! ```text
//! pending  -> active | rejected
//! active   -> inactive | rejected | pending
//! rejected -> pending
//! inactive -> active | pending
//! ```
//!
//! Owner edits send a listing back to `pending`; everything else is an
//! explicit moderation action.

use thiserror::Error;

use super::listings::ListingStatus;
use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModerationError {
    #[error("cannot move a {from} listing to {to}")]
    InvalidTransition {
        from: ListingStatus,
        to: ListingStatus,
    },

    #[error("a rejection reason is required")]
    MissingReason,
}

impl From<ModerationError> for ApiError {
    fn from(e: ModerationError) -> Self {
        match e {
            ModerationError::InvalidTransition { .. } => ApiError::conflict(e.to_string()),
            ModerationError::MissingReason => ApiError::bad_request(e.to_string()),
        }
    }
}

impl ListingStatus {
    pub fn can_transition_to(self, next: ListingStatus) -> bool {
        use ListingStatus::*;
        matches!(
            (self, next),
            (Pending, Active)
                | (Pending, Rejected)
                | (Active, Inactive)
                | (Active, Rejected)
                | (Active, Pending)
                | (Rejected, Pending)
                | (Inactive, Active)
                | (Inactive, Pending)
        )
    }

    /// Status after the owner edits the listing.
    pub fn after_owner_edit(self) -> ListingStatus {
        ListingStatus::Pending
    }

    /// Whether browsers other than the owner and admins may see the listing.
    pub fn is_public(self) -> bool {
        matches!(self, ListingStatus::Active)
    }
}

/// An action applied to a listing's status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModerationAction {
    Approve,
    Reject { reason: String },
    Deactivate,
    Reactivate,
}

impl ModerationAction {
    pub fn reject(reason: &str) -> Result<Self, ModerationError> {
        let reason = reason.trim();
        if reason.is_empty() {
            return Err(ModerationError::MissingReason);
        }
        Ok(Self::Reject {
            reason: reason.to_string(),
        })
    }

    pub fn target(&self) -> ListingStatus {
        match self {
            Self::Approve | Self::Reactivate => ListingStatus::Active,
            Self::Reject { .. } => ListingStatus::Rejected,
            Self::Deactivate => ListingStatus::Inactive,
        }
    }

    /// Resulting status, or an error when the move is not allowed.
    pub fn apply(&self, current: ListingStatus) -> Result<ListingStatus, ModerationError> {
        let next = self.target();
        // Reactivation only makes sense for parked listings; approval for queued ones
        let allowed = match self {
            Self::Approve => current == ListingStatus::Pending,
            Self::Reactivate => current == ListingStatus::Inactive,
            _ => current.can_transition_to(next),
        };
        if allowed {
            Ok(next)
        } else {
            Err(ModerationError::InvalidTransition {
                from: current,
                to: next,
            })
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            Self::Reject { reason } => Some(reason),
            _ => None,
        }
    }
}
