//! Admin routes
//!
//! Protected admin endpoints for:
//! - Dashboard statistics
//! - Listing moderation (approve, reject, deactivate, reactivate)
//! - User management (admin role, account deletion)
//! - Audit log viewing
//!
//! All routes require an admin role row (`user_roles.is_admin`).

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use crate::api::{DataResponse, NoContent, Paginated, PaginationParams};
use crate::app::AppState;
use crate::auth::{is_admin, RequireAdmin};
use crate::domain::admin::*;
use crate::domain::listings::Listing;
use crate::domain::moderation::ModerationAction;
use crate::domain::profiles::ProfileSummary;
use crate::domain::realtime::ChangeKind;
use crate::error::{ApiError, ApiResult};
use crate::middleware::ClientInfo;
use crate::services::cache::keys as cache_keys;
use crate::services::notifications;

use super::listings::{fetch_listing, invalidate_listing, listing_event, ListingRow, LISTING_COLUMNS};

/// Default page size of the user table
const USERS_PER_PAGE: u32 = 10;
const AUDIT_LOG_PER_PAGE: u32 = 50;

// ============================================================================
// Helper Functions
// ============================================================================

/// Log an admin action to the audit log
pub(crate) async fn log_admin_action(
    db: &sqlx::PgPool,
    admin_id: Uuid,
    action: AdminAction,
    target_type: AuditTargetType,
    target_id: Option<Uuid>,
    details: serde_json::Value,
    client: &ClientInfo,
) -> Result<(), sqlx::Error> {
    let id = Uuid::new_v4();
    sqlx::query(
        r#"
        INSERT INTO admin_audit_log (id, admin_id, action, target_type, target_id, details, ip_address, user_agent)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#,
    )
    .bind(id)
    .bind(admin_id)
    .bind(action.to_string())
    .bind(target_type.to_string())
    .bind(target_id)
    .bind(&details)
    .bind(&client.ip_address)
    .bind(&client.user_agent)
    .execute(db)
    .await?;

    tracing::info!(
        admin_id = %admin_id,
        action = %action,
        target_type = %target_type,
        target_id = ?target_id,
        "Admin action logged"
    );

    Ok(())
}

fn audit_action(action: &ModerationAction) -> AdminAction {
    match action {
        ModerationAction::Approve => AdminAction::ApproveListing,
        ModerationAction::Reject { .. } => AdminAction::RejectListing,
        ModerationAction::Deactivate => AdminAction::DeactivateListing,
        ModerationAction::Reactivate => AdminAction::ReactivateListing,
    }
}

// ============================================================================
// Database Row Types
// ============================================================================

#[derive(Debug, sqlx::FromRow)]
struct AdminListingRow {
    #[sqlx(flatten)]
    listing: ListingRow,
    owner_id: Option<Uuid>,
    owner_first_name: Option<String>,
    owner_last_name: Option<String>,
    owner_avatar_url: Option<String>,
    owner_email: Option<String>,
    favorite_count: i64,
}

impl From<AdminListingRow> for AdminListing {
    fn from(row: AdminListingRow) -> Self {
        Self {
            listing: Listing::from(row.listing),
            owner: row.owner_id.map(|id| ProfileSummary {
                id,
                first_name: row.owner_first_name,
                last_name: row.owner_last_name,
                avatar_url: row.owner_avatar_url,
            }),
            owner_email: row.owner_email,
            favorite_count: row.favorite_count,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AdminUserRow {
    id: Uuid,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    avatar_url: Option<String>,
    is_admin: bool,
    listing_count: i64,
    created_at: DateTime<Utc>,
}

impl From<AdminUserRow> for AdminUser {
    fn from(r: AdminUserRow) -> Self {
        Self {
            id: r.id,
            email: r.email,
            first_name: r.first_name,
            last_name: r.last_name,
            avatar_url: r.avatar_url,
            is_admin: r.is_admin,
            listing_count: r.listing_count,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AuditLogRow {
    id: Uuid,
    admin_id: Uuid,
    admin_name: Option<String>,
    action: String,
    target_type: String,
    target_id: Option<Uuid>,
    details: serde_json::Value,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<AuditLogRow> for AdminAuditLogResponse {
    fn from(r: AuditLogRow) -> Self {
        Self {
            id: r.id,
            admin_id: r.admin_id,
            admin_name: r.admin_name,
            action: r.action,
            target_type: r.target_type,
            target_id: r.target_id,
            details: r.details,
            ip_address: r.ip_address,
            user_agent: r.user_agent,
            created_at: r.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct BreakdownRow {
    label: String,
    count: i64,
}

impl From<BreakdownRow> for Breakdown {
    fn from(r: BreakdownRow) -> Self {
        Self {
            label: r.label,
            count: r.count,
        }
    }
}

// ============================================================================
// Admin Dashboard
// ============================================================================

/// GET /admin/check
///
/// 200 for admins, 403 for everyone else.
pub async fn check_admin(_admin: RequireAdmin) -> impl IntoResponse {
    Json(serde_json::json!({ "is_admin": true }))
}

/// GET /admin/stats
pub async fn get_admin_stats(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
) -> Result<impl IntoResponse, ApiError> {
    let status_rows: Vec<(String, i64)> =
        sqlx::query_as("SELECT status, COUNT(*) FROM homes GROUP BY status")
            .fetch_all(&state.db)
            .await?;
    let counts = StatusCounts::from_rows(status_rows);

    let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM profiles")
        .fetch_one(&state.db)
        .await?;

    let new_users_30d: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM profiles WHERE created_at > NOW() - INTERVAL '30 days'",
    )
    .fetch_one(&state.db)
    .await?;

    let revenue_30d: Decimal = sqlx::query_scalar(
        "SELECT COALESCE(SUM(amount), 0) FROM payments WHERE payment_date > NOW() - INTERVAL '30 days'",
    )
    .fetch_one(&state.db)
    .await?;

    let by_type = sqlx::query_as::<_, BreakdownRow>(
        "SELECT type AS label, COUNT(*) AS count FROM homes GROUP BY type ORDER BY type",
    )
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(Breakdown::from)
    .collect();

    let by_mode = sqlx::query_as::<_, BreakdownRow>(
        "SELECT mode AS label, COUNT(*) AS count FROM homes GROUP BY mode ORDER BY mode",
    )
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(Breakdown::from)
    .collect();

    let stats = AdminDashboardStats {
        total_listings: counts.total(),
        active_listings: counts.active,
        pending_listings: counts.pending,
        rejected_listings: counts.rejected,
        inactive_listings: counts.inactive,
        total_users,
        new_users_30d,
        revenue_30d,
        by_type,
        by_mode,
    };

    Ok(Json(DataResponse::new(stats)))
}

// ============================================================================
// Listing Moderation
// ============================================================================

/// GET /admin/listings?status=
///
/// Moderation queue, newest first. Defaults to pending listings.
pub async fn list_admin_listings(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    Query(query): Query<AdminListingQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let status = query.status();

    let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM homes WHERE status = $1")
        .bind(status.as_str())
        .fetch_one(&state.db)
        .await?;

    let data: Vec<AdminListing> = sqlx::query_as::<_, AdminListingRow>(&format!(
        r#"
        SELECT {},
            p.id AS owner_id,
            p.first_name AS owner_first_name,
            p.last_name AS owner_last_name,
            p.avatar_url AS owner_avatar_url,
            p.email AS owner_email,
            (SELECT COUNT(*) FROM favorites f WHERE f.home_id = h.id) AS favorite_count
        FROM homes h
        LEFT JOIN profiles p ON p.id = h.user_id
        WHERE h.status = $1
        ORDER BY h.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        LISTING_COLUMNS
    ))
    .bind(status.as_str())
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(AdminListing::from)
    .collect();

    Ok(Paginated::new(data, &pagination, total as u64))
}

/// Apply a moderation action: status change, audit entry, cache
/// invalidation, owner notification and change event.
async fn moderate(
    state: &AppState,
    admin: &RequireAdmin,
    client: &ClientInfo,
    listing_id: Uuid,
    action: ModerationAction,
) -> ApiResult<Listing> {
    let current = fetch_listing(&state.db, listing_id).await?;
    let next = action.apply(current.status)?;

    let row = sqlx::query_as::<_, ListingRow>(&format!(
        r#"
        UPDATE homes AS h SET
            status = $2,
            reviewed_by = $3,
            rejection_reason = $4,
            updated_at = NOW()
        WHERE h.id = $1 AND h.status = $5
        RETURNING {}
        "#,
        LISTING_COLUMNS
    ))
    .bind(listing_id)
    .bind(next.as_str())
    .bind(admin.user_id)
    .bind(action.rejection_reason())
    .bind(current.status.as_str())
    .fetch_optional(&state.db)
    .await?
    .ok_or_else(|| ApiError::conflict("Listing changed during moderation, reload and try again"))?;
    let listing = Listing::from(row);

    if let Err(e) = log_admin_action(
        &state.db,
        admin.user_id,
        audit_action(&action),
        AuditTargetType::Listing,
        Some(listing_id),
        serde_json::json!({
            "title": listing.title,
            "from": current.status,
            "to": next,
            "reason": action.rejection_reason(),
        }),
        client,
    )
    .await
    {
        tracing::warn!(error = %e, "Failed to write audit log");
    }

    invalidate_listing(state, listing_id).await;

    let notified = match &action {
        ModerationAction::Approve => {
            notifications::notify_listing_approved(&state.db, listing.user_id, listing_id, &listing.title).await
        }
        ModerationAction::Reject { reason } => {
            notifications::notify_listing_rejected(
                &state.db,
                listing.user_id,
                listing_id,
                &listing.title,
                reason,
            )
            .await
        }
        ModerationAction::Deactivate => {
            notifications::notify_listing_deactivated(&state.db, listing.user_id, listing_id, &listing.title)
                .await
        }
        ModerationAction::Reactivate => {
            notifications::notify_listing_reactivated(&state.db, listing.user_id, listing_id, &listing.title)
                .await
        }
    };
    if let Err(e) = notified {
        tracing::warn!(error = %e, "Failed to send moderation notification");
    }

    state
        .change_feed
        .publish(listing_event(ChangeKind::Update, &listing));

    Ok(listing)
}

/// POST /admin/listings/:id/approve
pub async fn approve_listing(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    client: ClientInfo,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = moderate(&state, &admin, &client, listing_id, ModerationAction::Approve).await?;
    Ok(Json(DataResponse::new(listing)))
}

/// POST /admin/listings/:id/reject
pub async fn reject_listing(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    client: ClientInfo,
    Path(listing_id): Path<Uuid>,
    Json(input): Json<RejectListingRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let action = ModerationAction::reject(&input.reason)?;
    let listing = moderate(&state, &admin, &client, listing_id, action).await?;
    Ok(Json(DataResponse::new(listing)))
}

/// POST /admin/listings/:id/deactivate
pub async fn deactivate_listing(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    client: ClientInfo,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = moderate(&state, &admin, &client, listing_id, ModerationAction::Deactivate).await?;
    Ok(Json(DataResponse::new(listing)))
}

/// POST /admin/listings/:id/reactivate
pub async fn reactivate_listing(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    client: ClientInfo,
    Path(listing_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let listing = moderate(&state, &admin, &client, listing_id, ModerationAction::Reactivate).await?;
    Ok(Json(DataResponse::new(listing)))
}

// ============================================================================
// User Management
// ============================================================================

/// GET /admin/users?search=&page=
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    Query(query): Query<AdminUserQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = pagination.with_default_per_page(USERS_PER_PAGE);
    let search = query
        .search
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM profiles p
        WHERE ($1::text IS NULL
            OR p.email ILIKE '%' || $1 || '%'
            OR p.first_name ILIKE '%' || $1 || '%'
            OR p.last_name ILIKE '%' || $1 || '%')
        "#,
    )
    .bind(search)
    .fetch_one(&state.db)
    .await?;

    let data: Vec<AdminUser> = sqlx::query_as::<_, AdminUserRow>(
        r#"
        SELECT
            p.id, p.email, p.first_name, p.last_name, p.avatar_url, p.created_at,
            COALESCE(r.is_admin, FALSE) AS is_admin,
            (SELECT COUNT(*) FROM homes h WHERE h.user_id = p.id) AS listing_count
        FROM profiles p
        LEFT JOIN user_roles r ON r.user_id = p.id
        WHERE ($1::text IS NULL
            OR p.email ILIKE '%' || $1 || '%'
            OR p.first_name ILIKE '%' || $1 || '%'
            OR p.last_name ILIKE '%' || $1 || '%')
        ORDER BY p.created_at DESC
        LIMIT $2 OFFSET $3
        "#,
    )
    .bind(search)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(AdminUser::from)
    .collect();

    Ok(Paginated::new(data, &pagination, total as u64))
}

async fn profile_exists(db: &sqlx::PgPool, user_id: Uuid) -> Result<bool, sqlx::Error> {
    sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM profiles WHERE id = $1)")
        .bind(user_id)
        .fetch_one(db)
        .await
}

/// POST /admin/users/:id/role
///
/// Set the admin flag, or flip it when the body carries no value.
pub async fn set_user_role(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    client: ClientInfo,
    Path(user_id): Path<Uuid>,
    Json(input): Json<SetAdminRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if !profile_exists(&state.db, user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    let current = is_admin(&state.db, user_id).await?;
    let grant = input.resolve(current);

    if user_id == admin.user_id && !grant {
        return Err(ApiError::bad_request("You cannot revoke your own admin role"));
    }

    sqlx::query(
        r#"
        INSERT INTO user_roles (user_id, is_admin)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO UPDATE SET is_admin = EXCLUDED.is_admin
        "#,
    )
    .bind(user_id)
    .bind(grant)
    .execute(&state.db)
    .await?;

    if grant != current {
        let action = if grant {
            AdminAction::GrantAdmin
        } else {
            AdminAction::RevokeAdmin
        };
        if let Err(e) = log_admin_action(
            &state.db,
            admin.user_id,
            action,
            AuditTargetType::User,
            Some(user_id),
            serde_json::json!({ "is_admin": grant }),
            &client,
        )
        .await
        {
            tracing::warn!(error = %e, "Failed to write audit log");
        }
    }

    Ok(Json(DataResponse::new(serde_json::json!({
        "user_id": user_id,
        "is_admin": grant,
    }))))
}

/// DELETE /admin/users/:id
///
/// Removes the Supabase auth user, then the profile and everything that
/// cascades from it.
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    admin: RequireAdmin,
    client: ClientInfo,
    Path(user_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    if user_id == admin.user_id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }
    if !profile_exists(&state.db, user_id).await? {
        return Err(ApiError::not_found("User not found"));
    }

    let response = state
        .http_client
        .delete(format!(
            "{}/auth/v1/admin/users/{}",
            state.settings.supabase_url, user_id
        ))
        .header("apikey", &state.settings.supabase_service_role_key)
        .bearer_auth(&state.settings.supabase_service_role_key)
        .send()
        .await
        .map_err(|e| ApiError::upstream(format!("Failed to reach auth service: {}", e)))?;

    let status = response.status();
    // A missing auth user only means the profile is orphaned
    if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
        let body = response.text().await.unwrap_or_default();
        tracing::error!(status = %status, body = %body, user_id = %user_id, "Auth user deletion failed");
        return Err(ApiError::upstream(format!("Auth service returned {}", status)));
    }

    sqlx::query("DELETE FROM profiles WHERE id = $1")
        .bind(user_id)
        .execute(&state.db)
        .await?;

    if let Err(e) = log_admin_action(
        &state.db,
        admin.user_id,
        AdminAction::DeleteUser,
        AuditTargetType::User,
        Some(user_id),
        serde_json::json!({ "auth_user_found": status.is_success() }),
        &client,
    )
    .await
    {
        tracing::warn!(error = %e, "Failed to write audit log");
    }

    // Their listings went with the profile
    state
        .cache
        .invalidate(&[cache_keys::active_listings(), cache_keys::profile(user_id)])
        .await;
    if let Err(e) = state.cache.delete_pattern(cache_keys::listing_pattern()).await {
        tracing::warn!(error = %e, "Failed to clear listing cache");
    }

    Ok(NoContent)
}

// ============================================================================
// Audit Log
// ============================================================================

/// GET /admin/audit-log
///
/// View admin action audit log.
pub async fn list_audit_log(
    State(state): State<Arc<AppState>>,
    _admin: RequireAdmin,
    Query(filter): Query<AuditLogQuery>,
    Query(pagination): Query<PaginationParams>,
) -> Result<impl IntoResponse, ApiError> {
    let pagination = pagination.with_default_per_page(AUDIT_LOG_PER_PAGE);

    let total: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM admin_audit_log a
        WHERE ($1::uuid IS NULL OR a.admin_id = $1)
        AND ($2::text IS NULL OR a.action = $2)
        AND ($3::text IS NULL OR a.target_type = $3)
        AND ($4::uuid IS NULL OR a.target_id = $4)
        AND ($5::timestamptz IS NULL OR a.created_at >= $5)
        AND ($6::timestamptz IS NULL OR a.created_at <= $6)
        "#,
    )
    .bind(filter.admin_id)
    .bind(&filter.action)
    .bind(&filter.target_type)
    .bind(filter.target_id)
    .bind(filter.from_date)
    .bind(filter.to_date)
    .fetch_one(&state.db)
    .await?;

    let data: Vec<AdminAuditLogResponse> = sqlx::query_as::<_, AuditLogRow>(
        r#"
        SELECT
            a.id, a.admin_id,
            NULLIF(TRIM(COALESCE(p.first_name, '') || ' ' || COALESCE(p.last_name, '')), '') AS admin_name,
            a.action, a.target_type, a.target_id, a.details, a.ip_address, a.user_agent, a.created_at
        FROM admin_audit_log a
        LEFT JOIN profiles p ON a.admin_id = p.id
        WHERE ($1::uuid IS NULL OR a.admin_id = $1)
        AND ($2::text IS NULL OR a.action = $2)
        AND ($3::text IS NULL OR a.target_type = $3)
        AND ($4::uuid IS NULL OR a.target_id = $4)
        AND ($5::timestamptz IS NULL OR a.created_at >= $5)
        AND ($6::timestamptz IS NULL OR a.created_at <= $6)
        ORDER BY a.created_at DESC
        LIMIT $7 OFFSET $8
        "#,
    )
    .bind(filter.admin_id)
    .bind(&filter.action)
    .bind(&filter.target_type)
    .bind(filter.target_id)
    .bind(filter.from_date)
    .bind(filter.to_date)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(&state.db)
    .await?
    .into_iter()
    .map(AdminAuditLogResponse::from)
    .collect();

    Ok(Paginated::new(data, &pagination, total as u64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn moderation_actions_have_distinct_audit_entries() {
        let actions = [
            ModerationAction::Approve,
            ModerationAction::reject("duplicate listing").unwrap(),
            ModerationAction::Deactivate,
            ModerationAction::Reactivate,
        ];
        let logged: Vec<String> = actions.iter().map(|a| audit_action(a).to_string()).collect();
        assert_eq!(
            logged,
            vec![
                "approve_listing",
                "reject_listing",
                "deactivate_listing",
                "reactivate_listing"
            ]
        );
    }

    #[test]
    fn missing_owner_profile_leaves_owner_empty() {
        let row = AdminListingRow {
            listing: ListingRow::sample("pending"),
            owner_id: None,
            owner_first_name: None,
            owner_last_name: None,
            owner_avatar_url: None,
            owner_email: None,
            favorite_count: 3,
        };
        let listing = AdminListing::from(row);
        assert!(listing.owner.is_none());
        assert_eq!(listing.favorite_count, 3);
    }
}
