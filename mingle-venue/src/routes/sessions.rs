use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use mingle_shared::errors::AppResult;
use mingle_shared::middleware::StaffUser;
use mingle_shared::types::auth::AuthUser;
use mingle_shared::types::ApiResponse;

use super::validated;
use crate::models::SessionMetadata;
use crate::AppState;

// --- GET /venues/:venue_id/session ---

pub async fn get_active_session(
    _user: AuthUser,
    State(state): State<Arc<AppState>>,
    Path(venue_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<SessionMetadata>>> {
    let now = state.clock.now();
    let session = state.services.sessions.require_active_session(venue_id, now)?;
    Ok(Json(ApiResponse::ok(session)))
}

// --- POST /venues/:venue_id/session ---

#[derive(Debug, Deserialize, Validate)]
pub struct StartSessionRequest {
    #[validate(range(min = 1, max = 24, message = "duration_hours must be between 1 and 24"))]
    pub duration_hours: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct StartSessionResponse {
    pub session: SessionMetadata,
    pub created: bool,
}

pub async fn start_session(
    StaffUser(staff): StaffUser,
    State(state): State<Arc<AppState>>,
    Path(venue_id): Path<Uuid>,
    Json(req): Json<StartSessionRequest>,
) -> AppResult<Json<ApiResponse<StartSessionResponse>>> {
    let req = validated(req)?;
    let hours = req.duration_hours.unwrap_or(state.config.default_session_hours);

    let started = state
        .services
        .sessions
        .start_session(venue_id, hours, staff.id, state.clock.now())?;

    let response = StartSessionResponse {
        created: started.created,
        session: started.row,
    };
    if response.created {
        Ok(Json(ApiResponse::ok(response)))
    } else {
        Ok(Json(ApiResponse::ok_with_message(response, "a session is already running")))
    }
}

// --- GET /venues/:venue_id/sessions ---

pub async fn list_sessions(
    StaffUser(_staff): StaffUser,
    State(state): State<Arc<AppState>>,
    Path(venue_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Vec<SessionMetadata>>>> {
    let sessions = state.services.sessions.sessions_for_venue(venue_id)?;
    Ok(Json(ApiResponse::ok(sessions)))
}

// --- POST /sessions/:session_id/extend ---

#[derive(Debug, Deserialize, Validate)]
pub struct ExtendSessionRequest {
    #[validate(range(min = 1, max = 24, message = "extra_hours must be between 1 and 24"))]
    pub extra_hours: i32,
}

pub async fn extend_session(
    StaffUser(_staff): StaffUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
    Json(req): Json<ExtendSessionRequest>,
) -> AppResult<Json<ApiResponse<SessionMetadata>>> {
    let req = validated(req)?;
    let session = state
        .services
        .sessions
        .extend_session(session_id, req.extra_hours, state.clock.now())?;
    Ok(Json(ApiResponse::ok(session)))
}

// --- POST /sessions/:session_id/deactivate ---

#[derive(Debug, Serialize)]
pub struct DeactivateResponse {
    pub session_id: Uuid,
    pub already_closed: bool,
    pub attendances_closed: usize,
    pub profiles_deactivated: usize,
}

pub async fn deactivate_session(
    StaffUser(staff): StaffUser,
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<DeactivateResponse>>> {
    let report = state
        .services
        .sessions
        .deactivate_now(session_id, state.clock.now())?;

    tracing::info!(session_id = %session_id, staff_id = %staff.id, "session deactivated by staff");

    let response = match report {
        Some(report) => DeactivateResponse {
            session_id,
            already_closed: false,
            attendances_closed: report.attendances_closed,
            profiles_deactivated: report.profiles_deactivated,
        },
        None => DeactivateResponse {
            session_id,
            already_closed: true,
            attendances_closed: 0,
            profiles_deactivated: 0,
        },
    };
    Ok(Json(ApiResponse::ok(response)))
}
