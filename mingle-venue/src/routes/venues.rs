use axum::extract::State;
use axum::Json;
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

use mingle_shared::errors::AppResult;
use mingle_shared::middleware::StaffUser;
use mingle_shared::types::ApiResponse;

use super::validated;
use crate::models::Venue;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct CreateVenueRequest {
    #[validate(length(min = 1, max = 120, message = "name must be 1-120 characters"))]
    pub name: String,
}

// --- POST /venues ---

pub async fn create_venue(
    StaffUser(_staff): StaffUser,
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateVenueRequest>,
) -> AppResult<Json<ApiResponse<Venue>>> {
    let req = validated(req)?;
    let venue = state.services.sessions.create_venue(req.name.trim())?;
    Ok(Json(ApiResponse::ok(venue)))
}
