//! Admin domain types
//!
//! Types for listing moderation, user management and audit logging.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::listings::{Listing, ListingStatus};
use super::profiles::ProfileSummary;

/// Admin action types for audit logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AdminAction {
    ApproveListing,
    RejectListing,
    DeactivateListing,
    ReactivateListing,
    DeleteListing,
    GrantAdmin,
    RevokeAdmin,
    DeleteUser,
}

impl std::fmt::Display for AdminAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// Target types for audit logging
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditTargetType {
    Listing,
    User,
}

impl std::fmt::Display for AuditTargetType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = serde_json::to_string(self).unwrap_or_default();
        write!(f, "{}", s.trim_matches('"'))
    }
}

/// Response DTO for audit log
#[derive(Debug, Clone, Serialize)]
pub struct AdminAuditLogResponse {
    pub id: Uuid,
    pub admin_id: Uuid,
    pub admin_name: Option<String>,
    pub action: String,
    pub target_type: String,
    pub target_id: Option<Uuid>,
    pub details: serde_json::Value,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Listing counts by one dimension
#[derive(Debug, Clone, Serialize, Default, PartialEq)]
pub struct Breakdown {
    pub label: String,
    pub count: i64,
}

/// Admin dashboard stats
#[derive(Debug, Clone, Serialize)]
pub struct AdminDashboardStats {
    pub total_listings: i64,
    pub active_listings: i64,
    pub pending_listings: i64,
    pub rejected_listings: i64,
    pub inactive_listings: i64,
    pub total_users: i64,
    pub new_users_30d: i64,
    pub revenue_30d: rust_decimal::Decimal,
    pub by_type: Vec<Breakdown>,
    pub by_mode: Vec<Breakdown>,
}

/// Status counts as stored in the database, folded into the dashboard shape
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatusCounts {
    pub pending: i64,
    pub active: i64,
    pub rejected: i64,
    pub inactive: i64,
}

impl StatusCounts {
    pub fn from_rows(rows: impl IntoIterator<Item = (String, i64)>) -> Self {
        let mut counts = Self::default();
        for (status, count) in rows {
            match ListingStatus::from(status) {
                ListingStatus::Pending => counts.pending += count,
                ListingStatus::Active => counts.active += count,
                ListingStatus::Rejected => counts.rejected += count,
                ListingStatus::Inactive => counts.inactive += count,
            }
        }
        counts
    }

    pub fn total(&self) -> i64 {
        self.pending + self.active + self.rejected + self.inactive
    }
}

/// Query params for the moderation queue
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminListingQuery {
    #[serde(default)]
    pub status: Option<ListingStatus>,
}

impl AdminListingQuery {
    pub fn status(&self) -> ListingStatus {
        self.status.unwrap_or(ListingStatus::Pending)
    }
}

/// Listing as seen in the moderation queue
#[derive(Debug, Clone, Serialize)]
pub struct AdminListing {
    #[serde(flatten)]
    pub listing: Listing,
    pub owner: Option<ProfileSummary>,
    pub owner_email: Option<String>,
    pub favorite_count: i64,
}

/// Request to reject a listing
#[derive(Debug, Clone, Deserialize)]
pub struct RejectListingRequest {
    #[serde(default)]
    pub reason: String,
}

/// Query params for user management
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AdminUserQuery {
    #[serde(default)]
    pub search: Option<String>,
}

/// Profile joined with its role
#[derive(Debug, Clone, Serialize)]
pub struct AdminUser {
    pub id: Uuid,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub avatar_url: Option<String>,
    pub is_admin: bool,
    pub listing_count: i64,
    pub created_at: DateTime<Utc>,
}

/// Set or toggle the admin flag. Without a value the flag is flipped.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct SetAdminRequest {
    #[serde(default)]
    pub is_admin: Option<bool>,
}

impl SetAdminRequest {
    pub fn resolve(&self, currently_admin: bool) -> bool {
        self.is_admin.unwrap_or(!currently_admin)
    }
}

/// Query params for audit log
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AuditLogQuery {
    #[serde(default)]
    pub admin_id: Option<Uuid>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub target_type: Option<String>,
    #[serde(default)]
    pub target_id: Option<Uuid>,
    #[serde(default)]
    pub from_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub to_date: Option<DateTime<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn action_names_are_snake_case() {
        assert_eq!(AdminAction::ApproveListing.to_string(), "approve_listing");
        assert_eq!(AuditTargetType::User.to_string(), "user");
    }

    #[test]
    fn status_counts_fold_rows() {
        let counts = StatusCounts::from_rows(vec![
            ("active".to_string(), 7),
            ("pending".to_string(), 3),
            ("rejected".to_string(), 1),
        ]);
        assert_eq!(counts.active, 7);
        assert_eq!(counts.pending, 3);
        assert_eq!(counts.inactive, 0);
        assert_eq!(counts.total(), 11);
    }

    #[rstest]
    #[case(None, false, true)]
    #[case(None, true, false)]
    #[case(Some(true), true, true)]
    #[case(Some(false), true, false)]
    fn admin_flag_sets_or_toggles(
        #[case] requested: Option<bool>,
        #[case] current: bool,
        #[case] expected: bool,
    ) {
        assert_eq!(SetAdminRequest { is_admin: requested }.resolve(current), expected);
    }

    #[test]
    fn moderation_queue_defaults_to_pending() {
        assert_eq!(AdminListingQuery::default().status(), ListingStatus::Pending);
        let query: AdminListingQuery = serde_json::from_str(r#"{"status":"rejected"}"#).unwrap();
        assert_eq!(query.status(), ListingStatus::Rejected);
    }
}
