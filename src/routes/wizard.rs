//! Listing creation wizard
//!
//! The client keeps the draft; the server decides where each move lands
//! and what blocks it.

use axum::{extract::State, response::IntoResponse, Json};
use std::sync::Arc;

use crate::api::DataResponse;
use crate::app::AppState;
use crate::auth::RequireAuth;
use crate::domain::wizard::{evaluate, ListingDraft, WizardRequest};
use crate::error::ApiError;

use super::listings::create_listing;

/// POST /listing-wizard
///
/// Apply the draft edits, then evaluate a move from `step` in `direction`.
/// The edited draft is returned with the view.
pub async fn evaluate_step(
    _auth: RequireAuth,
    Json(req): Json<WizardRequest>,
) -> impl IntoResponse {
    let from = req.step;
    let edits = req.edits.len();
    let outcome = evaluate(req);

    tracing::debug!(
        ?from,
        to = ?outcome.view.step,
        edits,
        blocked = outcome.view.blocked,
        "Wizard step evaluated"
    );

    Json(DataResponse::new(outcome))
}

/// POST /listing-wizard/submit
///
/// Submit a finished draft as a new listing.
pub async fn submit_draft(
    state: State<Arc<AppState>>,
    auth: RequireAuth,
    Json(draft): Json<ListingDraft>,
) -> Result<impl IntoResponse, ApiError> {
    create_listing(state, auth, Json(draft.into_request())).await
}
