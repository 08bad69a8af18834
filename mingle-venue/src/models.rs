use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::schema::{attendances, blocks, interactions, matches, profiles, venue_sessions, venues};

// --- Venue ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone)]
#[diesel(table_name = venues)]
pub struct Venue {
    pub id: Uuid,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = venues)]
pub struct NewVenue {
    pub name: String,
}

// --- SessionMetadata ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = venue_sessions)]
pub struct SessionMetadata {
    pub id: Uuid,
    pub venue_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_hours: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl SessionMetadata {
    /// `end_time` when recorded, otherwise `start_time + duration_hours`.
    pub fn effective_end(&self) -> DateTime<Utc> {
        self.end_time
            .unwrap_or_else(|| self.start_time + Duration::hours(i64::from(self.duration_hours)))
    }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = venue_sessions)]
pub struct NewSession {
    pub venue_id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub duration_hours: i32,
}

// --- Attendance ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Active,
    Inactive,
}

impl AttendanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

#[derive(Debug, Queryable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = attendances)]
pub struct Attendance {
    pub id: Uuid,
    pub profile_id: Uuid,
    pub venue_id: Uuid,
    pub session_id: Uuid,
    pub status: String,
    pub entered_at: DateTime<Utc>,
    pub exited_at: Option<DateTime<Utc>>,
}

impl Attendance {
    pub fn is_live(&self) -> bool {
        self.status == AttendanceStatus::Active.as_str() && self.exited_at.is_none()
    }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = attendances)]
pub struct NewAttendance {
    pub profile_id: Uuid,
    pub venue_id: Uuid,
    pub session_id: Uuid,
    pub entered_at: DateTime<Utc>,
}

// --- Profile ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = profiles)]
pub struct Profile {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    #[serde(skip_serializing)]
    pub phone_number: Option<String>,
    pub is_private: bool,
    pub is_staff: bool,
    pub appear_in_feed: bool,
    pub blocked_until: Option<DateTime<Utc>>,
    pub blocked_reason: Option<String>,
    pub is_deactivated: bool,
    pub deactivated_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// A suspension is in force while a reason is recorded and `blocked_until`
    /// is unset (permanent) or still in the future.
    pub fn is_suspended(&self, now: DateTime<Utc>) -> bool {
        if let Some(until) = self.blocked_until {
            return until > now;
        }
        self.blocked_reason.is_some()
    }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = profiles)]
pub struct NewProfile {
    pub id: Uuid,
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
    pub is_staff: bool,
}

// --- Interaction ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionKind {
    Like,
    Invite,
}

impl InteractionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Like => "like",
            Self::Invite => "invite",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InteractionStatus {
    Pending,
    Accepted,
    Declined,
}

impl InteractionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Accepted => "accepted",
            Self::Declined => "declined",
        }
    }
}

#[derive(Debug, Queryable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = interactions)]
pub struct Interaction {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub attendance_id: Uuid,
    pub kind: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

impl Interaction {
    pub fn is_kind(&self, kind: InteractionKind) -> bool {
        self.kind == kind.as_str()
    }

    pub fn has_status(&self, status: InteractionStatus) -> bool {
        self.status == status.as_str()
    }

    /// Pending or accepted: an interaction the two parties are still "in".
    pub fn is_open(&self) -> bool {
        !self.has_status(InteractionStatus::Declined)
    }

    pub fn involves(&self, a: Uuid, b: Uuid) -> bool {
        (self.sender_id == a && self.receiver_id == b) || (self.sender_id == b && self.receiver_id == a)
    }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = interactions)]
pub struct NewInteraction {
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub attendance_id: Uuid,
    pub kind: String,
    pub created_at: DateTime<Utc>,
}

// --- Match ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = matches)]
pub struct Match {
    pub id: Uuid,
    pub interaction_id: Uuid,
    pub profile_a: Uuid,
    pub profile_b: Uuid,
    pub contact_link: String,
    pub created_at: DateTime<Utc>,
}

impl Match {
    pub fn involves(&self, profile_id: Uuid) -> bool {
        self.profile_a == profile_id || self.profile_b == profile_id
    }

    pub fn other_party(&self, profile_id: Uuid) -> Uuid {
        if self.profile_a == profile_id {
            self.profile_b
        } else {
            self.profile_a
        }
    }
}

/// Order two profile ids so the smaller one comes first. The result is the
/// uniqueness key of a match.
pub fn canonical_pair(x: Uuid, y: Uuid) -> (Uuid, Uuid) {
    if x <= y { (x, y) } else { (y, x) }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = matches)]
pub struct NewMatch {
    pub interaction_id: Uuid,
    pub profile_a: Uuid,
    pub profile_b: Uuid,
    pub contact_link: String,
    pub created_at: DateTime<Utc>,
}

impl NewMatch {
    pub fn new(
        interaction_id: Uuid,
        x: Uuid,
        y: Uuid,
        contact_link: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (profile_a, profile_b) = canonical_pair(x, y);
        Self {
            interaction_id,
            profile_a,
            profile_b,
            contact_link,
            created_at,
        }
    }
}

// --- Block ---

#[derive(Debug, Queryable, Identifiable, Serialize, Clone, PartialEq)]
#[diesel(table_name = blocks)]
pub struct Block {
    pub id: Uuid,
    pub blocker_id: Uuid,
    pub blocked_id: Uuid,
    pub created_at: DateTime<Utc>,
}

impl Block {
    /// The profile on the other side of this block from `profile_id`.
    pub fn counterpart(&self, profile_id: Uuid) -> Uuid {
        if self.blocker_id == profile_id {
            self.blocked_id
        } else {
            self.blocker_id
        }
    }
}

#[derive(Debug, Insertable, Clone)]
#[diesel(table_name = blocks)]
pub struct NewBlock {
    pub blocker_id: Uuid,
    pub blocked_id: Uuid,
    pub created_at: DateTime<Utc>,
}
