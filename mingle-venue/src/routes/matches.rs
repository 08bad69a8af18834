use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use mingle_shared::errors::AppResult;
use mingle_shared::types::auth::AuthUser;
use mingle_shared::types::ApiResponse;

use crate::models::Match;
use crate::AppState;

// --- GET /matches ---

pub async fn list_matches(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Match>>>> {
    let matches = state.services.matcher.list_matches(user.id)?;
    Ok(Json(ApiResponse::ok(matches)))
}

// --- DELETE /matches/:id ---

pub async fn unmatch(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(match_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Match>>> {
    let removed = state.services.matcher.unmatch(match_id, user.id)?;
    Ok(Json(ApiResponse::ok_with_message(removed, "match removed")))
}
