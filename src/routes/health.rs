use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::app::AppState;
use crate::db;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub services: ServiceHealth,
}

#[derive(Debug, Serialize)]
pub struct ServiceHealth {
    pub database: &'static str,
    pub redis: &'static str,
}

fn check(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "error"
    }
}

/// The database is critical; Redis only degrades latency.
fn overall(db_ok: bool, redis_ok: bool) -> (StatusCode, &'static str) {
    match (db_ok, redis_ok) {
        (true, true) => (StatusCode::OK, "healthy"),
        (true, false) => (StatusCode::OK, "degraded"),
        (false, _) => (StatusCode::SERVICE_UNAVAILABLE, "unhealthy"),
    }
}

/// GET /health
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let (db_ok, redis_result) = tokio::join!(db::health_check(&state.db), state.cache.health_check());
    let redis_ok = redis_result.is_ok();

    let (status_code, status) = overall(db_ok, redis_ok);

    (
        status_code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION"),
            services: ServiceHealth {
                database: check(db_ok),
                redis: check(redis_ok),
            },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(true, true, StatusCode::OK, "healthy")]
    #[case(true, false, StatusCode::OK, "degraded")]
    #[case(false, true, StatusCode::SERVICE_UNAVAILABLE, "unhealthy")]
    #[case(false, false, StatusCode::SERVICE_UNAVAILABLE, "unhealthy")]
    fn database_outage_is_unhealthy(
        #[case] db_ok: bool,
        #[case] redis_ok: bool,
        #[case] code: StatusCode,
        #[case] status: &str,
    ) {
        assert_eq!(overall(db_ok, redis_ok), (code, status));
    }
}
