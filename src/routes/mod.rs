pub mod admin;
pub mod auth;
pub mod favorites;
pub mod health;
pub mod listings;
pub mod me;
pub mod messages;
pub mod notifications;
pub mod payments;
pub mod profiles;
pub mod realtime;
pub mod reservations;
pub mod reviews;
pub mod uploads;
pub mod wizard;

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::app::AppState;
use crate::config::Settings;

/// Build the API router with all routes
pub fn api_router(settings: &Settings) -> Router<Arc<AppState>> {
    Router::new()
        // Public routes
        .route("/health", get(health::health_check))
        // Auth proxy
        .route("/auth/signup", post(auth::sign_up))
        .route("/auth/signin", post(auth::sign_in))
        .route("/auth/signout", post(auth::sign_out))
        .route("/auth/session", get(auth::get_session))
        .route("/auth/refresh", post(auth::refresh_token))
        .route("/auth/oauth/:provider", get(auth::oauth_url))
        .route("/auth/callback", post(auth::oauth_callback))
        .route("/auth/verify", post(auth::verify_email))
        // Current user
        .route("/me", get(me::get_me))
        .route("/me/listings", get(listings::my_listings))
        .route("/me/favorites", get(favorites::my_favorites))
        .route("/me/reservations", get(reservations::my_reservations))
        .route("/me/payments", get(payments::my_payments))
        // Listings
        .route(
            "/listings",
            get(listings::list_listings).post(listings::create_listing),
        )
        .route(
            "/listings/:id",
            get(listings::get_listing)
                .put(listings::update_listing)
                .delete(listings::delete_listing),
        )
        .route("/listings/:id/deactivate", post(listings::deactivate_listing))
        .route(
            "/listings/:id/favorite",
            post(favorites::add_favorite).delete(favorites::remove_favorite),
        )
        .route(
            "/listings/:id/reviews",
            get(reviews::list_reviews).post(reviews::create_review),
        )
        .route(
            "/listings/:id/reservations",
            get(reservations::listing_reservations).post(reservations::create_reservation),
        )
        .route("/listings/:id/payments", post(payments::create_payment))
        .route("/categories", get(listings::list_categories))
        // Listing wizard
        .route("/listing-wizard", post(wizard::evaluate_step))
        .route("/listing-wizard/submit", post(wizard::submit_draft))
        // Messages
        .route(
            "/messages",
            get(messages::list_messages).post(messages::send_message),
        )
        .route("/messages/unread-count", get(messages::unread_count))
        .route("/messages/thread/:user_id", get(messages::get_thread))
        .route("/messages/:id", get(messages::get_message))
        .route("/messages/:id/read", post(messages::mark_message_read))
        // Reservations
        .route(
            "/reservations/:id/status",
            post(reservations::update_reservation_status),
        )
        // Profiles
        .route(
            "/profiles/me",
            get(profiles::get_my_profile).put(profiles::update_my_profile),
        )
        .route("/profiles/:id", get(profiles::get_profile))
        // Notifications
        .route("/notifications", get(notifications::list_notifications))
        .route(
            "/notifications/unread-count",
            get(notifications::get_unread_count),
        )
        .route("/notifications/read", post(notifications::mark_read))
        .route(
            "/notifications/:id",
            axum::routing::delete(notifications::delete_notification),
        )
        // Uploads
        .route(
            "/uploads/images",
            uploads::with_upload_limit(post(uploads::upload_images), settings.max_upload_bytes),
        )
        // Realtime
        .route("/realtime/messages", get(realtime::stream_messages))
        .route("/admin/realtime/listings", get(realtime::stream_listings))
        // Admin
        .route("/admin/check", get(admin::check_admin))
        .route("/admin/stats", get(admin::get_admin_stats))
        .route("/admin/listings", get(admin::list_admin_listings))
        .route("/admin/listings/:id/approve", post(admin::approve_listing))
        .route("/admin/listings/:id/reject", post(admin::reject_listing))
        .route(
            "/admin/listings/:id/deactivate",
            post(admin::deactivate_listing),
        )
        .route(
            "/admin/listings/:id/reactivate",
            post(admin::reactivate_listing),
        )
        .route("/admin/users", get(admin::list_users))
        .route("/admin/users/:id", axum::routing::delete(admin::delete_user))
        .route("/admin/users/:id/role", post(admin::set_user_role))
        .route("/admin/audit-log", get(admin::list_audit_log))
}
