use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::app::AppState;
use crate::auth::{is_admin, RequireAuth};
use crate::error::ApiResult;

#[derive(Serialize)]
pub struct MeResponse {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub provider: Option<String>,
    pub is_admin: bool,
}

/// GET /me
pub async fn get_me(State(state): State<Arc<AppState>>, auth: RequireAuth) -> ApiResult<Json<MeResponse>> {
    let is_admin = is_admin(&state.db, auth.user_id).await?;

    Ok(Json(MeResponse {
        user_id: auth.user_id,
        email: auth.email.clone(),
        role: auth.role.clone(),
        first_name: auth.first_name().map(str::to_string),
        last_name: auth.last_name().map(str::to_string),
        provider: auth.claims().provider().map(str::to_string),
        is_admin,
    }))
}
