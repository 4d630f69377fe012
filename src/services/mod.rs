//! Service layer modules for external integrations.
//!
//! Redis caching, Supabase Storage, the realtime change feed and in-app
//! notifications.

pub mod cache;
pub mod change_feed;
pub mod notifications;
pub mod storage;

pub use cache::RedisCache;
pub use change_feed::ChangeFeed;
pub use storage::SupabaseStorage;
