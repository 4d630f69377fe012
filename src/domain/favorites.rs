//! Favorite domain types

use serde::Serialize;
use uuid::Uuid;

/// Result of favoriting a listing
#[derive(Debug, Clone, Serialize)]
pub struct FavoriteResponse {
    pub favorite_id: Uuid,
    pub home_id: Uuid,
    /// False when the listing was already a favorite
    pub created: bool,
}
