use axum::extract::{Path, State};
use axum::Json;
use std::sync::Arc;
use uuid::Uuid;

use mingle_shared::errors::AppResult;
use mingle_shared::types::auth::AuthUser;
use mingle_shared::types::ApiResponse;

use crate::services::ProfileSummary;
use crate::AppState;

// --- GET /venues/:venue_id/feed ---

pub async fn get_feed(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(venue_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<ProfileSummary>>>> {
    let now = state.clock.now();
    state.services.sessions.require_active_session(venue_id, now)?;

    let feed = state.services.feed.build(venue_id, user.id, now)?;
    Ok(Json(ApiResponse::ok(feed)))
}
