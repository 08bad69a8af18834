use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::types::ApiErrorResponse;

/// Application error codes following the pattern E{area}{sequence}
///
/// Ranges:
/// - E0xxx: Shared/infrastructure errors
/// - E1xxx: Venue session and attendance errors
/// - E2xxx: Interaction and match errors
/// - E3xxx: Access control errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    // Shared (E0xxx)
    InternalError,
    ValidationError,
    NotFound,
    Unauthorized,
    Forbidden,
    ServiceUnavailable,
    BadRequest,
    TokenExpired,
    TokenInvalid,

    // Session (E1xxx)
    NoActiveSession,
    SessionNotFound,
    VenueNotFound,
    AttendanceNotActive,
    InvalidDuration,

    // Interaction (E2xxx)
    InteractionNotFound,
    NotReceiver,
    MatchNotFound,
    NotMatchParticipant,

    // Access (E3xxx)
    ProfileNotFound,
    InvalidTarget,
}

impl ErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            // Shared
            Self::InternalError => "E0001",
            Self::ValidationError => "E0002",
            Self::NotFound => "E0003",
            Self::Unauthorized => "E0004",
            Self::Forbidden => "E0005",
            Self::ServiceUnavailable => "E0006",
            Self::BadRequest => "E0007",
            Self::TokenExpired => "E0008",
            Self::TokenInvalid => "E0009",

            // Session
            Self::NoActiveSession => "E1001",
            Self::SessionNotFound => "E1002",
            Self::VenueNotFound => "E1003",
            Self::AttendanceNotActive => "E1004",
            Self::InvalidDuration => "E1005",

            // Interaction
            Self::InteractionNotFound => "E2001",
            Self::NotReceiver => "E2002",
            Self::MatchNotFound => "E2003",
            Self::NotMatchParticipant => "E2004",

            // Access
            Self::ProfileNotFound => "E3001",
            Self::InvalidTarget => "E3002",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            Self::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::ValidationError | Self::BadRequest | Self::InvalidDuration
            | Self::InvalidTarget => StatusCode::BAD_REQUEST,
            Self::NotFound | Self::SessionNotFound | Self::VenueNotFound
            | Self::InteractionNotFound | Self::MatchNotFound
            | Self::ProfileNotFound => StatusCode::NOT_FOUND,
            Self::Unauthorized | Self::TokenExpired | Self::TokenInvalid => StatusCode::UNAUTHORIZED,
            Self::Forbidden | Self::NotReceiver | Self::NotMatchParticipant => StatusCode::FORBIDDEN,
            Self::NoActiveSession | Self::AttendanceNotActive => StatusCode::CONFLICT,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{message}")]
    Known {
        code: ErrorCode,
        message: String,
        details: Option<serde_json::Value>,
    },

    #[error("internal server error")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(code: ErrorCode, message: impl Into<String>, details: serde_json::Value) -> Self {
        Self::Known {
            code,
            message: message.into(),
            details: Some(details),
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_response) = match &self {
            AppError::Known { code, message, details } => {
                let status = code.status_code();
                let mut resp = ApiErrorResponse::new(code.code(), message);
                if let Some(d) = details {
                    resp = resp.with_details(d.clone());
                }
                (status, resp)
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ApiErrorResponse::new("E0001", "internal server error"),
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;

    async fn body_json(err: AppError) -> serde_json::Value {
        let response = err.into_response();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn known_error_envelope() {
        let value = body_json(AppError::new(ErrorCode::NoActiveSession, "session ended")).await;

        assert_eq!(value["success"], false);
        assert_eq!(value["error"]["code"], "E1001");
        assert_eq!(value["error"]["message"], "session ended");
        assert!(value["error"].get("details").is_none());
    }

    #[tokio::test]
    async fn status_codes_follow_error_kind() {
        let conflict = AppError::new(ErrorCode::NoActiveSession, "x").into_response();
        assert_eq!(conflict.status(), StatusCode::CONFLICT);

        let forbidden = AppError::new(ErrorCode::NotReceiver, "x").into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

        let bad = AppError::new(ErrorCode::InvalidTarget, "x").into_response();
        assert_eq!(bad.status(), StatusCode::BAD_REQUEST);

        let unavailable = AppError::unavailable("try again").into_response();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn internal_error_hides_detail() {
        let err = AppError::Internal(anyhow::anyhow!("connection refused at 10.0.0.3:5432"));
        let value = body_json(err).await;

        assert_eq!(value["error"]["code"], "E0001");
        assert_eq!(value["error"]["message"], "internal server error");
    }

    #[tokio::test]
    async fn details_are_rendered() {
        let err = AppError::with_details(
            ErrorCode::ValidationError,
            "invalid body",
            serde_json::json!({ "field": "duration_hours" }),
        );
        let value = body_json(err).await;

        assert_eq!(value["error"]["details"]["field"], "duration_hours");
    }

    #[test]
    fn codes_are_unique() {
        let all = [
            ErrorCode::InternalError,
            ErrorCode::ValidationError,
            ErrorCode::NotFound,
            ErrorCode::Unauthorized,
            ErrorCode::Forbidden,
            ErrorCode::ServiceUnavailable,
            ErrorCode::BadRequest,
            ErrorCode::TokenExpired,
            ErrorCode::TokenInvalid,
            ErrorCode::NoActiveSession,
            ErrorCode::SessionNotFound,
            ErrorCode::VenueNotFound,
            ErrorCode::AttendanceNotActive,
            ErrorCode::InvalidDuration,
            ErrorCode::InteractionNotFound,
            ErrorCode::NotReceiver,
            ErrorCode::MatchNotFound,
            ErrorCode::NotMatchParticipant,
            ErrorCode::ProfileNotFound,
            ErrorCode::InvalidTarget,
        ];
        let mut codes: Vec<&str> = all.iter().map(|c| c.code()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), all.len());
    }
}
