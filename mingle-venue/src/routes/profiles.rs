use axum::extract::{Path, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

use mingle_shared::errors::AppResult;
use mingle_shared::middleware::StaffUser;
use mingle_shared::types::auth::AuthUser;
use mingle_shared::types::ApiResponse;

use super::validated;
use crate::models::Profile;
use crate::services::ProfileDetails;
use crate::AppState;

// --- POST /me ---

#[derive(Debug, Default, Deserialize, Validate)]
pub struct EnsureProfileRequest {
    #[validate(length(min = 1, max = 40, message = "display_name must be 1-40 characters"))]
    pub display_name: Option<String>,
    #[validate(length(min = 3, max = 32, message = "phone_number must be 3-32 characters"))]
    pub phone_number: Option<String>,
}

impl From<EnsureProfileRequest> for ProfileDetails {
    fn from(req: EnsureProfileRequest) -> Self {
        Self {
            display_name: req.display_name,
            phone_number: req.phone_number,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct EnsureProfileResponse {
    pub profile: Profile,
    pub created: bool,
}

pub async fn ensure_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<EnsureProfileRequest>,
) -> AppResult<Json<ApiResponse<EnsureProfileResponse>>> {
    let req = validated(req)?;
    let profile = state
        .services
        .profiles
        .ensure_profile(user.id, user.is_staff(), req.into())?;

    Ok(Json(ApiResponse::ok(EnsureProfileResponse {
        created: profile.created,
        profile: profile.row,
    })))
}

// --- GET /me ---

pub async fn get_profile(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = state.services.profiles.get(user.id)?;
    Ok(Json(ApiResponse::ok(profile)))
}

// --- PATCH /me/privacy ---

#[derive(Debug, Deserialize)]
pub struct PrivacyRequest {
    pub is_private: bool,
}

pub async fn set_privacy(
    user: AuthUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<PrivacyRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = state
        .services
        .profiles
        .set_privacy(user.id, req.is_private, state.clock.now())?;
    Ok(Json(ApiResponse::ok(profile)))
}

// --- PATCH /me/feed-visibility ---

#[derive(Debug, Deserialize)]
pub struct FeedVisibilityRequest {
    pub appear_in_feed: bool,
}

pub async fn set_feed_visibility(
    StaffUser(staff): StaffUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<FeedVisibilityRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = state
        .services
        .profiles
        .set_feed_visibility(staff.id, req.appear_in_feed, state.clock.now())?;
    Ok(Json(ApiResponse::ok(profile)))
}

// --- POST /profiles/:id/suspension ---

#[derive(Debug, Deserialize, Validate)]
pub struct SuspendRequest {
    /// Omitted for a permanent suspension.
    pub until: Option<DateTime<Utc>>,
    #[validate(length(min = 1, max = 500, message = "reason must be 1-500 characters"))]
    pub reason: String,
}

pub async fn suspend_profile(
    StaffUser(staff): StaffUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<Uuid>,
    Json(req): Json<SuspendRequest>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let req = validated(req)?;
    let profile = state
        .services
        .profiles
        .suspend(profile_id, req.until, req.reason, state.clock.now())?;

    tracing::info!(profile_id = %profile_id, staff_id = %staff.id, "suspension applied by staff");
    Ok(Json(ApiResponse::ok(profile)))
}

// --- DELETE /profiles/:id/suspension ---

pub async fn lift_suspension(
    StaffUser(_staff): StaffUser,
    State(state): State<Arc<AppState>>,
    Path(profile_id): Path<Uuid>,
) -> AppResult<Json<ApiResponse<Profile>>> {
    let profile = state
        .services
        .profiles
        .lift_suspension(profile_id, state.clock.now())?;
    Ok(Json(ApiResponse::ok(profile)))
}
