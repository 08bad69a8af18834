use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// RabbitMQ Event envelope wrapping all domain events.
///
/// Routing key format: `mingle.{domain}.{entity}.{action}`
/// Example: `mingle.venue.match.created`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event<T: Serialize> {
    pub id: Uuid,
    pub source: String,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Option<Uuid>,
    pub user_id: Option<Uuid>,
    pub data: T,
}

impl<T: Serialize> Event<T> {
    pub fn new(source: impl Into<String>, event_type: impl Into<String>, data: T) -> Self {
        Self {
            id: Uuid::now_v7(),
            source: source.into(),
            event_type: event_type.into(),
            timestamp: Utc::now(),
            correlation_id: None,
            user_id: None,
            data,
        }
    }

    pub fn with_user(mut self, user_id: Uuid) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_correlation(mut self, correlation_id: Uuid) -> Self {
        self.correlation_id = Some(correlation_id);
        self
    }
}

/// RabbitMQ routing keys
pub mod routing_keys {
    // Session events
    pub const VENUE_SESSION_STARTED: &str = "mingle.venue.session.started";
    pub const VENUE_SESSION_EXPIRED: &str = "mingle.venue.session.expired";

    // Attendance events
    pub const VENUE_ATTENDANCE_ENTERED: &str = "mingle.venue.attendance.entered";

    // Interaction events
    pub const VENUE_INTERACTION_SENT: &str = "mingle.venue.interaction.sent";
    pub const VENUE_INTERACTION_RESPONDED: &str = "mingle.venue.interaction.responded";

    // Match events
    pub const VENUE_MATCH_CREATED: &str = "mingle.venue.match.created";
    pub const VENUE_MATCH_REMOVED: &str = "mingle.venue.match.removed";
}

/// Common event data payloads
pub mod payloads {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Serialize};
    use uuid::Uuid;

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SessionStarted {
        pub session_id: Uuid,
        pub venue_id: Uuid,
        pub start_time: DateTime<Utc>,
        pub end_time: Option<DateTime<Utc>>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct SessionExpired {
        pub session_id: Uuid,
        pub venue_id: Uuid,
        pub ended_at: DateTime<Utc>,
        pub attendances_closed: usize,
        pub profiles_deactivated: usize,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct AttendanceEntered {
        pub attendance_id: Uuid,
        pub venue_id: Uuid,
        pub profile_id: Uuid,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct InteractionSent {
        pub interaction_id: Uuid,
        pub sender_id: Uuid,
        pub receiver_id: Uuid,
        pub kind: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct InteractionResponded {
        pub interaction_id: Uuid,
        pub sender_id: Uuid,
        pub receiver_id: Uuid,
        pub accepted: bool,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MatchCreated {
        pub match_id: Uuid,
        pub interaction_id: Uuid,
        pub profile_a: Uuid,
        pub profile_b: Uuid,
        pub contact_link: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct MatchRemoved {
        pub match_id: Uuid,
        pub profile_a: Uuid,
        pub profile_b: Uuid,
        pub reason: String,
    }
}
