use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use mingle_shared::errors::AppResult;
use mingle_shared::types::auth::AuthUser;
use mingle_shared::types::ApiResponse;

use crate::models::Block;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct BlockResponse {
    pub block: Block,
    pub created: bool,
    pub removed_match_id: Option<Uuid>,
}

// --- POST /blocks/:profile_id ---

pub async fn block_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(blocked_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<BlockResponse>>> {
    let outcome = state
        .services
        .matcher
        .block(user.id, blocked_id, state.clock.now())?;

    Ok(Json(ApiResponse::ok(BlockResponse {
        created: outcome.block.created,
        block: outcome.block.row,
        removed_match_id: outcome.removed_match.map(|m| m.id),
    })))
}

// --- DELETE /blocks/:profile_id ---

#[derive(Debug, Serialize)]
pub struct UnblockResponse {
    pub removed: bool,
}

pub async fn unblock_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(blocked_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<UnblockResponse>>> {
    let removed = state.services.matcher.unblock(user.id, blocked_id)?;
    Ok(Json(ApiResponse::ok(UnblockResponse { removed })))
}
