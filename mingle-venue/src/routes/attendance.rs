use axum::extract::{Path, State};
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use mingle_shared::errors::AppResult;
use mingle_shared::types::auth::AuthUser;
use mingle_shared::types::ApiResponse;

use super::profiles::EnsureProfileRequest;
use super::validated;
use crate::models::Attendance;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct EnterResponse {
    pub attendance: Attendance,
    pub created: bool,
}

// --- POST /venues/:venue_id/attendance ---

/// Enter the venue. The body is optional and only used when the caller's
/// profile does not exist yet.
pub async fn enter_venue(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(venue_id): Path<Uuid>,
    body: Option<Json<EnsureProfileRequest>>,
) -> AppResult<Json<ApiResponse<EnterResponse>>> {
    let details = match body {
        Some(Json(req)) => validated(req)?.into(),
        None => Default::default(),
    };
    state
        .services
        .profiles
        .ensure_profile(user.id, user.is_staff(), details)?;

    let attendance = state
        .services
        .sessions
        .ensure_attendance(venue_id, user.id, state.clock.now())?;

    Ok(Json(ApiResponse::ok(EnterResponse {
        created: attendance.created,
        attendance: attendance.row,
    })))
}

// --- DELETE /attendance ---

#[derive(Debug, Serialize)]
pub struct ExitResponse {
    pub exited: bool,
    pub attendance: Option<Attendance>,
}

pub async fn exit_venue(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<ExitResponse>>> {
    let attendance = state
        .services
        .sessions
        .exit_attendance(user.id, state.clock.now())?;

    Ok(Json(ApiResponse::ok(ExitResponse {
        exited: attendance.is_some(),
        attendance,
    })))
}
