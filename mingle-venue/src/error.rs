use mingle_shared::errors::{AppError, ErrorCode};

use crate::store::StoreError;

/// Outcomes of the venue core that are not a success.
#[derive(Debug, thiserror::Error)]
pub enum VenueError {
    #[error("no active session")]
    NoActiveSession,

    #[error("session not found")]
    SessionNotFound,

    #[error("venue not found")]
    VenueNotFound,

    #[error("profile not found")]
    ProfileNotFound,

    #[error("interaction not found")]
    InteractionNotFound,

    #[error("only the receiver can respond to this interaction")]
    NotReceiver,

    #[error("invalid target profile")]
    InvalidTarget,

    #[error("attendance is not active")]
    AttendanceNotActive,

    #[error("match not found")]
    MatchNotFound,

    #[error("not a participant of this match")]
    NotMatchParticipant,

    #[error("session duration must be between {min} and {max} hours")]
    InvalidDuration { min: i32, max: i32 },

    #[error("store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),
}

pub type VenueResult<T> = Result<T, VenueError>;

impl VenueError {
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NoActiveSession => ErrorCode::NoActiveSession,
            Self::SessionNotFound => ErrorCode::SessionNotFound,
            Self::VenueNotFound => ErrorCode::VenueNotFound,
            Self::ProfileNotFound => ErrorCode::ProfileNotFound,
            Self::InteractionNotFound => ErrorCode::InteractionNotFound,
            Self::NotReceiver => ErrorCode::NotReceiver,
            Self::InvalidTarget => ErrorCode::InvalidTarget,
            Self::AttendanceNotActive => ErrorCode::AttendanceNotActive,
            Self::MatchNotFound => ErrorCode::MatchNotFound,
            Self::NotMatchParticipant => ErrorCode::NotMatchParticipant,
            Self::InvalidDuration { .. } => ErrorCode::InvalidDuration,
            Self::StoreUnavailable(_) => ErrorCode::ServiceUnavailable,
        }
    }
}

impl From<VenueError> for AppError {
    fn from(err: VenueError) -> Self {
        match err {
            VenueError::StoreUnavailable(source) => {
                tracing::error!(error = %source, "store operation failed");
                AppError::unavailable("try again")
            }
            VenueError::NoActiveSession => AppError::new(ErrorCode::NoActiveSession, "session ended"),
            other => AppError::new(other.code(), other.to_string()),
        }
    }
}
