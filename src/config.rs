use anyhow::{Context, Result};
use std::env;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Dev,
    Staging,
    Prod,
}

impl Environment {
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "prod" | "production" => Self::Prod,
            "staging" => Self::Staging,
            _ => Self::Dev,
        }
    }

    pub fn is_dev(&self) -> bool {
        matches!(self, Self::Dev)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self, Self::Prod)
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub env: Environment,
    pub server_addr: String,

    // Database
    pub database_url: String,
    pub database_max_connections: u32,
    pub run_migrations: bool,

    // Redis
    pub redis_url: String,
    pub redis_cache_ttl_seconds: u64,

    // CORS
    pub cors_allow_origins: Vec<String>,

    // Supabase Auth
    pub supabase_jwt_jwks_url: String,
    pub supabase_jwt_issuer: String,
    pub supabase_jwt_audience: String,
    pub jwks_cache_ttl_seconds: u64,
    pub oauth_redirect_url: String,

    // Supabase API (auth proxy, admin API, storage)
    pub supabase_url: String,
    pub supabase_anon_key: String,
    pub supabase_service_role_key: String,

    // Storage
    pub storage_bucket: String,
    pub max_upload_bytes: usize,

    // Realtime
    pub change_feed_capacity: usize,
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

fn split_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        let env = Environment::parse(&env::var("ENV").unwrap_or_else(|_| "dev".to_string()));
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());

        // Database
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let database_max_connections = parse_or("DATABASE_MAX_CONNECTIONS", 10);
        let run_migrations = parse_or("RUN_MIGRATIONS", false);

        // Redis
        let redis_url =
            env::var("REDIS_URL").unwrap_or_else(|_| "redis://redis:6379/0".to_string());
        let redis_cache_ttl_seconds = parse_or("REDIS_CACHE_TTL_SECONDS", 3600);

        // CORS
        let cors_allow_origins = split_origins(
            &env::var("CORS_ALLOW_ORIGINS").unwrap_or_else(|_| "http://localhost:5173".to_string()),
        );

        // Supabase Auth
        let supabase_jwt_jwks_url =
            env::var("SUPABASE_JWT_JWKS_URL").context("SUPABASE_JWT_JWKS_URL must be set")?;
        let supabase_jwt_issuer =
            env::var("SUPABASE_JWT_ISSUER").context("SUPABASE_JWT_ISSUER must be set")?;
        let supabase_jwt_audience =
            env::var("SUPABASE_JWT_AUDIENCE").unwrap_or_else(|_| "authenticated".to_string());
        let jwks_cache_ttl_seconds = parse_or("JWKS_CACHE_TTL_SECONDS", 1800); // 30 minutes
        let oauth_redirect_url = env::var("OAUTH_REDIRECT_URL")
            .unwrap_or_else(|_| "http://localhost:5173/auth/callback".to_string());

        // Supabase API
        let supabase_url = env::var("SUPABASE_URL")
            .context("SUPABASE_URL must be set")?
            .trim_end_matches('/')
            .to_string();
        let supabase_anon_key =
            env::var("SUPABASE_ANON_KEY").context("SUPABASE_ANON_KEY must be set")?;
        let supabase_service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .context("SUPABASE_SERVICE_ROLE_KEY must be set")?;

        // Storage
        let storage_bucket =
            env::var("STORAGE_BUCKET").unwrap_or_else(|_| "home-images".to_string());
        let max_upload_bytes = parse_or("MAX_UPLOAD_BYTES", 10 * 1024 * 1024);

        let change_feed_capacity = parse_or("CHANGE_FEED_CAPACITY", 256);

        Ok(Settings {
            env,
            server_addr,
            database_url,
            database_max_connections,
            run_migrations,
            redis_url,
            redis_cache_ttl_seconds,
            cors_allow_origins,
            supabase_jwt_jwks_url,
            supabase_jwt_issuer,
            supabase_jwt_audience,
            jwks_cache_ttl_seconds,
            oauth_redirect_url,
            supabase_url,
            supabase_anon_key,
            supabase_service_role_key,
            storage_bucket,
            max_upload_bytes,
            change_feed_capacity,
        })
    }
}
