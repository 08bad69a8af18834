//! Repository interfaces for the venue core.
//!
//! Every method is one bounded transaction. Methods that protect a uniqueness
//! invariant are atomic insert-or-fetch operations: the caller never performs
//! a separate "does it exist?" read before writing.

pub mod memory;
pub mod postgres;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{
    Attendance, Block, Interaction, InteractionStatus, Match, NewAttendance, NewBlock,
    NewInteraction, NewMatch, NewProfile, NewSession, Profile, SessionMetadata, Venue,
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("connection pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("store lock poisoned")]
    Poisoned,

    #[error("conflicting write on {0} did not settle")]
    Contended(&'static str),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Result of an insert-or-fetch: the row now in storage and whether this call
/// inserted it.
#[derive(Debug, Clone, PartialEq)]
pub struct Upserted<T> {
    pub row: T,
    pub created: bool,
}

impl<T> Upserted<T> {
    pub fn created(row: T) -> Self {
        Self { row, created: true }
    }

    pub fn existing(row: T) -> Self {
        Self { row, created: false }
    }
}

/// Side effects of one expiry cascade.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpiryReport {
    pub session: SessionMetadata,
    pub attendances_closed: usize,
    pub profiles_deactivated: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BlockOutcome {
    pub block: Upserted<Block>,
    pub removed_match: Option<Match>,
}

pub trait VenueStore {
    fn create_venue(&self, name: &str) -> StoreResult<Venue>;
    fn find_venue(&self, venue_id: Uuid) -> StoreResult<Option<Venue>>;
}

pub trait SessionStore {
    /// Most recent `is_active` session of the venue, expired or not.
    fn latest_active_session(&self, venue_id: Uuid) -> StoreResult<Option<SessionMetadata>>;

    fn find_session(&self, session_id: Uuid) -> StoreResult<Option<SessionMetadata>>;

    /// All sessions of a venue, newest first.
    fn sessions_for_venue(&self, venue_id: Uuid) -> StoreResult<Vec<SessionMetadata>>;

    /// Inserts `new` unless the venue already has an active session, in which
    /// case the existing one is returned.
    fn insert_session_exclusive(&self, new: NewSession) -> StoreResult<Upserted<SessionMetadata>>;

    /// Moves the end of a still-active session. `None` when the session is
    /// unknown or already closed.
    fn extend_active_session(
        &self,
        session_id: Uuid,
        end_time: DateTime<Utc>,
        duration_hours: i32,
    ) -> StoreResult<Option<SessionMetadata>>;

    /// The expiry cascade, in one transaction gated on `is_active`:
    /// exit every live attendance of the venue, deactivate the non-staff
    /// attendees, close the session with `end_time = now`.
    ///
    /// Returns `None` without side effects when the session was already
    /// closed, so repeated or concurrent calls perform the cascade once.
    fn expire_session(&self, session_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<ExpiryReport>>;
}

pub trait AttendanceStore {
    /// Returns the profile's live attendance at the venue or inserts one, and
    /// clears the profile's deactivation flag in the same transaction. A live
    /// attendance at another venue is closed first.
    ///
    /// Gated on `new.session_id` being active and not yet past its end at
    /// `new.entered_at`, under a lock that a concurrent expiry cascade waits
    /// on. `None` without side effects when the gate fails.
    fn ensure_live_attendance(&self, new: NewAttendance) -> StoreResult<Option<Upserted<Attendance>>>;

    fn find_attendance(&self, attendance_id: Uuid) -> StoreResult<Option<Attendance>>;

    fn live_attendances(&self, venue_id: Uuid) -> StoreResult<Vec<Attendance>>;

    /// Closes the profile's live attendance, if any.
    fn exit_live_attendance(&self, profile_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Attendance>>;
}

pub trait ProfileStore {
    /// Insert-or-fetch. An existing profile keeps its details but takes
    /// `is_staff` from `new`.
    fn ensure_profile(&self, new: NewProfile) -> StoreResult<Upserted<Profile>>;

    fn find_profile(&self, profile_id: Uuid) -> StoreResult<Option<Profile>>;

    fn profiles_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>>;

    fn set_privacy(&self, profile_id: Uuid, is_private: bool, now: DateTime<Utc>) -> StoreResult<Option<Profile>>;

    fn set_feed_visibility(&self, profile_id: Uuid, appear_in_feed: bool, now: DateTime<Utc>) -> StoreResult<Option<Profile>>;

    /// `reason = None` lifts the suspension.
    fn set_suspension(
        &self,
        profile_id: Uuid,
        until: Option<DateTime<Utc>>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Profile>>;
}

pub trait InteractionStore {
    /// Inserts a pending interaction, or returns the pending one already
    /// recorded for `(sender, receiver, kind)`.
    fn insert_pending_interaction(&self, new: NewInteraction) -> StoreResult<Upserted<Interaction>>;

    fn find_interaction(&self, interaction_id: Uuid) -> StoreResult<Option<Interaction>>;

    /// Conditional update from `pending` to `status`. `None` when the
    /// interaction is no longer pending.
    fn resolve_pending(
        &self,
        interaction_id: Uuid,
        status: InteractionStatus,
        responded_at: DateTime<Utc>,
    ) -> StoreResult<Option<Interaction>>;

    /// Latest accepted interaction sent by `sender` to `receiver`, by
    /// `created_at` then id, descending.
    fn latest_accepted_from(&self, sender_id: Uuid, receiver_id: Uuid) -> StoreResult<Option<Interaction>>;

    fn interactions_involving(&self, profile_id: Uuid) -> StoreResult<Vec<Interaction>>;

    /// Pending interactions received by the profile, newest first.
    fn pending_received(&self, profile_id: Uuid) -> StoreResult<Vec<Interaction>>;
}

pub trait MatchStore {
    /// Constraint-backed insert on the canonical pair; returns the existing
    /// match when the pair is already matched.
    fn insert_match(&self, new: NewMatch) -> StoreResult<Upserted<Match>>;

    fn find_match(&self, match_id: Uuid) -> StoreResult<Option<Match>>;

    fn find_match_between(&self, x: Uuid, y: Uuid) -> StoreResult<Option<Match>>;

    fn delete_match(&self, match_id: Uuid) -> StoreResult<bool>;

    fn matches_for(&self, profile_id: Uuid) -> StoreResult<Vec<Match>>;
}

pub trait BlockStore {
    /// Records the block (idempotent) and deletes any match between the two
    /// profiles in the same transaction.
    fn block_and_unmatch(&self, new: NewBlock) -> StoreResult<BlockOutcome>;

    fn remove_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> StoreResult<bool>;

    /// Blocks in either direction that involve the profile.
    fn blocks_involving(&self, profile_id: Uuid) -> StoreResult<Vec<Block>>;

    fn is_blocked_between(&self, x: Uuid, y: Uuid) -> StoreResult<bool>;
}

/// Everything the venue core persists.
pub trait Store:
    VenueStore
    + SessionStore
    + AttendanceStore
    + ProfileStore
    + InteractionStore
    + MatchStore
    + BlockStore
    + Send
    + Sync
{
    fn health_check(&self) -> StoreResult<()>;
}
