use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use mingle_shared::errors::AppResult;
use mingle_shared::types::auth::AuthUser;
use mingle_shared::types::ApiResponse;

use crate::models::{Interaction, InteractionKind};
use crate::services::{Decision, RespondOutcome};
use crate::AppState;

// --- POST /interactions ---

#[derive(Debug, Deserialize)]
pub struct SendInteractionRequest {
    pub receiver_id: Uuid,
    pub kind: InteractionKind,
    pub attendance_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct SendInteractionResponse {
    pub interaction: Interaction,
    pub created: bool,
}

pub async fn send_interaction(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<SendInteractionRequest>,
) -> AppResult<Json<ApiResponse<SendInteractionResponse>>> {
    let sent = state.services.matcher.send(
        user.id,
        req.receiver_id,
        req.kind,
        req.attendance_id,
        state.clock.now(),
    )?;

    Ok(Json(ApiResponse::ok(SendInteractionResponse {
        created: sent.created,
        interaction: sent.row,
    })))
}

// --- GET /interactions/incoming ---

pub async fn list_incoming(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Vec<Interaction>>>> {
    let pending = state.services.matcher.list_incoming(user.id)?;
    Ok(Json(ApiResponse::ok(pending)))
}

// --- PUT /interactions/:id/respond ---

#[derive(Debug, Deserialize)]
pub struct RespondRequest {
    pub decision: Decision,
}

pub async fn respond_interaction(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(interaction_id): Path<Uuid>,
    Json(req): Json<RespondRequest>,
) -> AppResult<Json<ApiResponse<RespondOutcome>>> {
    let outcome = state.services.matcher.respond(
        user.id,
        interaction_id,
        req.decision,
        state.clock.now(),
    )?;

    if outcome.already_resolved {
        return Ok(Json(ApiResponse::ok_with_message(outcome, "already handled")));
    }
    Ok(Json(ApiResponse::ok(outcome)))
}
