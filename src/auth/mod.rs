pub mod claims;
pub mod context;
pub mod jwks;
pub mod middleware;

pub use claims::Claims;
pub use context::AuthContext;
pub use jwks::JwksCache;
pub use middleware::{
    ensure_admin, is_admin, AuthError, OptionalAuth, RequireAdmin, RequireAuth, StreamAuth,
};
