//! Diesel-backed store.
//!
//! Uniqueness invariants live in partial unique indexes (see migrations):
//! inserts use `ON CONFLICT DO NOTHING` and fall back to reading the row that
//! won, so a losing writer never surfaces a constraint violation.

use chrono::{DateTime, Utc};
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use uuid::Uuid;

use super::{
    AttendanceStore, BlockOutcome, BlockStore, ExpiryReport, InteractionStore, MatchStore,
    ProfileStore, SessionStore, Store, StoreError, StoreResult, Upserted, VenueStore,
};
use crate::models::{
    canonical_pair, Attendance, AttendanceStatus, Block, Interaction, InteractionStatus, Match,
    NewAttendance, NewBlock, NewInteraction, NewMatch, NewProfile, NewSession, NewVenue, Profile,
    SessionMetadata, Venue,
};
use crate::schema::{attendances, blocks, interactions, matches, profiles, venue_sessions, venues};

pub type DbPool = Pool<ConnectionManager<PgConnection>>;

// A conflicting row can disappear between our insert and our read (resolved,
// unmatched); a fresh insert attempt then succeeds.
const UPSERT_ATTEMPTS: usize = 3;

pub fn create_pool(database_url: &str, max_size: u32) -> Result<DbPool, diesel::r2d2::PoolError> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool = Pool::builder()
        .max_size(max_size)
        .min_idle(Some(2))
        .test_on_check_out(true)
        .build(manager)?;

    tracing::info!(max_size, "database connection pool created");
    Ok(pool)
}

#[derive(Clone)]
pub struct PgStore {
    pool: DbPool,
}

impl PgStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn conn(&self) -> StoreResult<PooledConnection<ConnectionManager<PgConnection>>> {
        Ok(self.pool.get()?)
    }
}

fn live_attendance_at(conn: &mut PgConnection, profile_id: Uuid, venue_id: Uuid) -> QueryResult<Option<Attendance>> {
    attendances::table
        .filter(attendances::profile_id.eq(profile_id))
        .filter(attendances::venue_id.eq(venue_id))
        .filter(attendances::status.eq(AttendanceStatus::Active.as_str()))
        .filter(attendances::exited_at.is_null())
        .first::<Attendance>(conn)
        .optional()
}

fn close_live_elsewhere(conn: &mut PgConnection, new: &NewAttendance) -> QueryResult<usize> {
    diesel::update(
        attendances::table
            .filter(attendances::profile_id.eq(new.profile_id))
            .filter(attendances::venue_id.ne(new.venue_id))
            .filter(attendances::status.eq(AttendanceStatus::Active.as_str()))
            .filter(attendances::exited_at.is_null()),
    )
    .set((
        attendances::status.eq(AttendanceStatus::Inactive.as_str()),
        attendances::exited_at.eq(Some(new.entered_at)),
    ))
    .execute(conn)
}

impl VenueStore for PgStore {
    fn create_venue(&self, name: &str) -> StoreResult<Venue> {
        let mut conn = self.conn()?;
        let venue = diesel::insert_into(venues::table)
            .values(&NewVenue { name: name.to_string() })
            .get_result::<Venue>(&mut conn)?;
        Ok(venue)
    }

    fn find_venue(&self, venue_id: Uuid) -> StoreResult<Option<Venue>> {
        let mut conn = self.conn()?;
        Ok(venues::table.find(venue_id).first::<Venue>(&mut conn).optional()?)
    }
}

impl SessionStore for PgStore {
    fn latest_active_session(&self, venue_id: Uuid) -> StoreResult<Option<SessionMetadata>> {
        let mut conn = self.conn()?;
        Ok(venue_sessions::table
            .filter(venue_sessions::venue_id.eq(venue_id))
            .filter(venue_sessions::is_active.eq(true))
            .order((venue_sessions::start_time.desc(), venue_sessions::id.desc()))
            .first::<SessionMetadata>(&mut conn)
            .optional()?)
    }

    fn find_session(&self, session_id: Uuid) -> StoreResult<Option<SessionMetadata>> {
        let mut conn = self.conn()?;
        Ok(venue_sessions::table
            .find(session_id)
            .first::<SessionMetadata>(&mut conn)
            .optional()?)
    }

    fn sessions_for_venue(&self, venue_id: Uuid) -> StoreResult<Vec<SessionMetadata>> {
        let mut conn = self.conn()?;
        Ok(venue_sessions::table
            .filter(venue_sessions::venue_id.eq(venue_id))
            .order((venue_sessions::start_time.desc(), venue_sessions::id.desc()))
            .load::<SessionMetadata>(&mut conn)?)
    }

    fn insert_session_exclusive(&self, new: NewSession) -> StoreResult<Upserted<SessionMetadata>> {
        let mut conn = self.conn()?;
        for _ in 0..UPSERT_ATTEMPTS {
            let inserted = diesel::insert_into(venue_sessions::table)
                .values(&new)
                .on_conflict_do_nothing()
                .get_result::<SessionMetadata>(&mut conn)
                .optional()?;
            if let Some(row) = inserted {
                return Ok(Upserted::created(row));
            }

            let winner = venue_sessions::table
                .filter(venue_sessions::venue_id.eq(new.venue_id))
                .filter(venue_sessions::is_active.eq(true))
                .first::<SessionMetadata>(&mut conn)
                .optional()?;
            if let Some(row) = winner {
                return Ok(Upserted::existing(row));
            }
        }
        Err(StoreError::Contended("venue_sessions"))
    }

    fn extend_active_session(
        &self,
        session_id: Uuid,
        end_time: DateTime<Utc>,
        duration_hours: i32,
    ) -> StoreResult<Option<SessionMetadata>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            venue_sessions::table
                .filter(venue_sessions::id.eq(session_id))
                .filter(venue_sessions::is_active.eq(true)),
        )
        .set((
            venue_sessions::end_time.eq(Some(end_time)),
            venue_sessions::duration_hours.eq(duration_hours),
        ))
        .get_result::<SessionMetadata>(&mut conn)
        .optional()?)
    }

    fn expire_session(&self, session_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<ExpiryReport>> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            // The row lock taken here serializes concurrent cascades; the
            // loser re-evaluates `is_active` and updates nothing.
            let closed = diesel::update(
                venue_sessions::table
                    .filter(venue_sessions::id.eq(session_id))
                    .filter(venue_sessions::is_active.eq(true)),
            )
            .set((
                venue_sessions::is_active.eq(false),
                venue_sessions::end_time.eq(Some(now)),
            ))
            .get_result::<SessionMetadata>(conn)
            .optional()?;

            let Some(session) = closed else {
                return Ok(None);
            };

            let exited: Vec<Uuid> = diesel::update(
                attendances::table
                    .filter(attendances::venue_id.eq(session.venue_id))
                    .filter(attendances::status.eq(AttendanceStatus::Active.as_str()))
                    .filter(attendances::exited_at.is_null()),
            )
            .set((
                attendances::status.eq(AttendanceStatus::Inactive.as_str()),
                attendances::exited_at.eq(Some(now)),
            ))
            .returning(attendances::profile_id)
            .get_results(conn)?;

            let profiles_deactivated = diesel::update(
                profiles::table
                    .filter(profiles::id.eq_any(&exited))
                    .filter(profiles::is_staff.eq(false)),
            )
            .set((
                profiles::is_deactivated.eq(true),
                profiles::deactivated_at.eq(Some(now)),
                profiles::updated_at.eq(now),
            ))
            .execute(conn)?;

            Ok(Some(ExpiryReport {
                session,
                attendances_closed: exited.len(),
                profiles_deactivated,
            }))
        })
    }
}

impl AttendanceStore for PgStore {
    fn ensure_live_attendance(&self, new: NewAttendance) -> StoreResult<Option<Upserted<Attendance>>> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            // Held until commit; `expire_session` updates this row and so
            // waits for us, then closes what we inserted.
            let session = venue_sessions::table
                .filter(venue_sessions::id.eq(new.session_id))
                .filter(venue_sessions::is_active.eq(true))
                .for_share()
                .first::<SessionMetadata>(conn)
                .optional()?;
            if !session.is_some_and(|s| s.effective_end() > new.entered_at) {
                return Ok(None);
            }

            let mut outcome = None;
            for _ in 0..UPSERT_ATTEMPTS {
                // re-run each attempt: a concurrent entry elsewhere may have
                // committed the row we conflicted with
                close_live_elsewhere(conn, &new)?;

                let inserted = diesel::insert_into(attendances::table)
                    .values(&new)
                    .on_conflict_do_nothing()
                    .get_result::<Attendance>(conn)
                    .optional()?;
                if let Some(row) = inserted {
                    outcome = Some(Upserted::created(row));
                    break;
                }
                if let Some(row) = live_attendance_at(conn, new.profile_id, new.venue_id)? {
                    outcome = Some(Upserted::existing(row));
                    break;
                }
            }
            let outcome = outcome.ok_or(StoreError::Contended("attendances"))?;

            diesel::update(profiles::table.find(new.profile_id))
                .set((
                    profiles::is_deactivated.eq(false),
                    profiles::deactivated_at.eq(None::<DateTime<Utc>>),
                    profiles::updated_at.eq(new.entered_at),
                ))
                .execute(conn)?;

            Ok(Some(outcome))
        })
    }

    fn find_attendance(&self, attendance_id: Uuid) -> StoreResult<Option<Attendance>> {
        let mut conn = self.conn()?;
        Ok(attendances::table
            .find(attendance_id)
            .first::<Attendance>(&mut conn)
            .optional()?)
    }

    fn live_attendances(&self, venue_id: Uuid) -> StoreResult<Vec<Attendance>> {
        let mut conn = self.conn()?;
        Ok(attendances::table
            .filter(attendances::venue_id.eq(venue_id))
            .filter(attendances::status.eq(AttendanceStatus::Active.as_str()))
            .filter(attendances::exited_at.is_null())
            .load::<Attendance>(&mut conn)?)
    }

    fn exit_live_attendance(&self, profile_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Attendance>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            attendances::table
                .filter(attendances::profile_id.eq(profile_id))
                .filter(attendances::status.eq(AttendanceStatus::Active.as_str()))
                .filter(attendances::exited_at.is_null()),
        )
        .set((
            attendances::status.eq(AttendanceStatus::Inactive.as_str()),
            attendances::exited_at.eq(Some(now)),
        ))
        .get_result::<Attendance>(&mut conn)
        .optional()?)
    }
}

impl ProfileStore for PgStore {
    fn ensure_profile(&self, new: NewProfile) -> StoreResult<Upserted<Profile>> {
        let mut conn = self.conn()?;
        let inserted = diesel::insert_into(profiles::table)
            .values(&new)
            .on_conflict_do_nothing()
            .get_result::<Profile>(&mut conn)
            .optional()?;
        match inserted {
            Some(row) => Ok(Upserted::created(row)),
            None => {
                let row = diesel::update(profiles::table.find(new.id))
                    .set(profiles::is_staff.eq(new.is_staff))
                    .get_result::<Profile>(&mut conn)?;
                Ok(Upserted::existing(row))
            }
        }
    }

    fn find_profile(&self, profile_id: Uuid) -> StoreResult<Option<Profile>> {
        let mut conn = self.conn()?;
        Ok(profiles::table.find(profile_id).first::<Profile>(&mut conn).optional()?)
    }

    fn profiles_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn()?;
        Ok(profiles::table
            .filter(profiles::id.eq_any(ids))
            .load::<Profile>(&mut conn)?)
    }

    fn set_privacy(&self, profile_id: Uuid, is_private: bool, now: DateTime<Utc>) -> StoreResult<Option<Profile>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(profiles::table.find(profile_id))
            .set((profiles::is_private.eq(is_private), profiles::updated_at.eq(now)))
            .get_result::<Profile>(&mut conn)
            .optional()?)
    }

    fn set_feed_visibility(&self, profile_id: Uuid, appear_in_feed: bool, now: DateTime<Utc>) -> StoreResult<Option<Profile>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(profiles::table.find(profile_id))
            .set((profiles::appear_in_feed.eq(appear_in_feed), profiles::updated_at.eq(now)))
            .get_result::<Profile>(&mut conn)
            .optional()?)
    }

    fn set_suspension(
        &self,
        profile_id: Uuid,
        until: Option<DateTime<Utc>>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Profile>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(profiles::table.find(profile_id))
            .set((
                profiles::blocked_until.eq(until),
                profiles::blocked_reason.eq(reason),
                profiles::updated_at.eq(now),
            ))
            .get_result::<Profile>(&mut conn)
            .optional()?)
    }
}

impl InteractionStore for PgStore {
    fn insert_pending_interaction(&self, new: NewInteraction) -> StoreResult<Upserted<Interaction>> {
        let mut conn = self.conn()?;
        for _ in 0..UPSERT_ATTEMPTS {
            let inserted = diesel::insert_into(interactions::table)
                .values(&new)
                .on_conflict_do_nothing()
                .get_result::<Interaction>(&mut conn)
                .optional()?;
            if let Some(row) = inserted {
                return Ok(Upserted::created(row));
            }

            let pending = interactions::table
                .filter(interactions::sender_id.eq(new.sender_id))
                .filter(interactions::receiver_id.eq(new.receiver_id))
                .filter(interactions::kind.eq(&new.kind))
                .filter(interactions::status.eq(InteractionStatus::Pending.as_str()))
                .first::<Interaction>(&mut conn)
                .optional()?;
            if let Some(row) = pending {
                return Ok(Upserted::existing(row));
            }
        }
        Err(StoreError::Contended("interactions"))
    }

    fn find_interaction(&self, interaction_id: Uuid) -> StoreResult<Option<Interaction>> {
        let mut conn = self.conn()?;
        Ok(interactions::table
            .find(interaction_id)
            .first::<Interaction>(&mut conn)
            .optional()?)
    }

    fn resolve_pending(
        &self,
        interaction_id: Uuid,
        status: InteractionStatus,
        responded_at: DateTime<Utc>,
    ) -> StoreResult<Option<Interaction>> {
        let mut conn = self.conn()?;
        Ok(diesel::update(
            interactions::table
                .filter(interactions::id.eq(interaction_id))
                .filter(interactions::status.eq(InteractionStatus::Pending.as_str())),
        )
        .set((
            interactions::status.eq(status.as_str()),
            interactions::responded_at.eq(Some(responded_at)),
        ))
        .get_result::<Interaction>(&mut conn)
        .optional()?)
    }

    fn latest_accepted_from(&self, sender_id: Uuid, receiver_id: Uuid) -> StoreResult<Option<Interaction>> {
        let mut conn = self.conn()?;
        Ok(interactions::table
            .filter(interactions::sender_id.eq(sender_id))
            .filter(interactions::receiver_id.eq(receiver_id))
            .filter(interactions::status.eq(InteractionStatus::Accepted.as_str()))
            .order((interactions::created_at.desc(), interactions::id.desc()))
            .first::<Interaction>(&mut conn)
            .optional()?)
    }

    fn interactions_involving(&self, profile_id: Uuid) -> StoreResult<Vec<Interaction>> {
        let mut conn = self.conn()?;
        Ok(interactions::table
            .filter(
                interactions::sender_id
                    .eq(profile_id)
                    .or(interactions::receiver_id.eq(profile_id)),
            )
            .load::<Interaction>(&mut conn)?)
    }

    fn pending_received(&self, profile_id: Uuid) -> StoreResult<Vec<Interaction>> {
        let mut conn = self.conn()?;
        Ok(interactions::table
            .filter(interactions::receiver_id.eq(profile_id))
            .filter(interactions::status.eq(InteractionStatus::Pending.as_str()))
            .order((interactions::created_at.desc(), interactions::id.desc()))
            .load::<Interaction>(&mut conn)?)
    }
}

impl MatchStore for PgStore {
    fn insert_match(&self, new: NewMatch) -> StoreResult<Upserted<Match>> {
        let mut conn = self.conn()?;
        for _ in 0..UPSERT_ATTEMPTS {
            let inserted = diesel::insert_into(matches::table)
                .values(&new)
                .on_conflict_do_nothing()
                .get_result::<Match>(&mut conn)
                .optional()?;
            if let Some(row) = inserted {
                return Ok(Upserted::created(row));
            }

            let winner = matches::table
                .filter(matches::profile_a.eq(new.profile_a))
                .filter(matches::profile_b.eq(new.profile_b))
                .first::<Match>(&mut conn)
                .optional()?;
            if let Some(row) = winner {
                return Ok(Upserted::existing(row));
            }
        }
        Err(StoreError::Contended("matches"))
    }

    fn find_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        let mut conn = self.conn()?;
        Ok(matches::table.find(match_id).first::<Match>(&mut conn).optional()?)
    }

    fn find_match_between(&self, x: Uuid, y: Uuid) -> StoreResult<Option<Match>> {
        let (a, b) = canonical_pair(x, y);
        let mut conn = self.conn()?;
        Ok(matches::table
            .filter(matches::profile_a.eq(a))
            .filter(matches::profile_b.eq(b))
            .first::<Match>(&mut conn)
            .optional()?)
    }

    fn delete_match(&self, match_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(matches::table.find(match_id)).execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn matches_for(&self, profile_id: Uuid) -> StoreResult<Vec<Match>> {
        let mut conn = self.conn()?;
        Ok(matches::table
            .filter(matches::profile_a.eq(profile_id).or(matches::profile_b.eq(profile_id)))
            .order(matches::created_at.desc())
            .load::<Match>(&mut conn)?)
    }
}

impl BlockStore for PgStore {
    fn block_and_unmatch(&self, new: NewBlock) -> StoreResult<BlockOutcome> {
        let mut conn = self.conn()?;
        conn.transaction::<_, StoreError, _>(|conn| {
            let inserted = diesel::insert_into(blocks::table)
                .values(&new)
                .on_conflict_do_nothing()
                .get_result::<Block>(conn)
                .optional()?;
            let block = match inserted {
                Some(row) => Upserted::created(row),
                None => Upserted::existing(
                    blocks::table
                        .filter(blocks::blocker_id.eq(new.blocker_id))
                        .filter(blocks::blocked_id.eq(new.blocked_id))
                        .first::<Block>(conn)?,
                ),
            };

            let (a, b) = canonical_pair(new.blocker_id, new.blocked_id);
            let removed_match = diesel::delete(
                matches::table
                    .filter(matches::profile_a.eq(a))
                    .filter(matches::profile_b.eq(b)),
            )
            .get_result::<Match>(conn)
            .optional()?;

            Ok(BlockOutcome { block, removed_match })
        })
    }

    fn remove_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let deleted = diesel::delete(
            blocks::table
                .filter(blocks::blocker_id.eq(blocker_id))
                .filter(blocks::blocked_id.eq(blocked_id)),
        )
        .execute(&mut conn)?;
        Ok(deleted > 0)
    }

    fn blocks_involving(&self, profile_id: Uuid) -> StoreResult<Vec<Block>> {
        let mut conn = self.conn()?;
        Ok(blocks::table
            .filter(blocks::blocker_id.eq(profile_id).or(blocks::blocked_id.eq(profile_id)))
            .load::<Block>(&mut conn)?)
    }

    fn is_blocked_between(&self, x: Uuid, y: Uuid) -> StoreResult<bool> {
        let mut conn = self.conn()?;
        let count: i64 = blocks::table
            .filter(
                blocks::blocker_id
                    .eq(x)
                    .and(blocks::blocked_id.eq(y))
                    .or(blocks::blocker_id.eq(y).and(blocks::blocked_id.eq(x))),
            )
            .count()
            .get_result(&mut conn)?;
        Ok(count > 0)
    }
}

impl Store for PgStore {
    fn health_check(&self) -> StoreResult<()> {
        let mut conn = self.conn()?;
        diesel::sql_query("SELECT 1").execute(&mut conn)?;
        Ok(())
    }
}
