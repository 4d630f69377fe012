//! Domain types and DTOs
//!
//! Marketplace entities plus the rules that govern them: listing
//! validation, moderation, the creation wizard and browse filters.

pub mod admin;
pub mod auth;
pub mod favorites;
pub mod filters;
pub mod listings;
pub mod messages;
pub mod moderation;
pub mod money;
pub mod notifications;
pub mod payments;
pub mod profiles;
pub mod realtime;
pub mod reservations;
pub mod reviews;
pub mod wizard;

// Re-export commonly used types
pub use listings::*;
pub use profiles::*;
