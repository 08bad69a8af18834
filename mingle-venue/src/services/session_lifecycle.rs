use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{VenueError, VenueResult};
use crate::events::EventPublisher;
use crate::models::{Attendance, NewAttendance, NewSession, SessionMetadata, Venue};
use crate::store::{ExpiryReport, Store, Upserted};

pub const MIN_SESSION_HOURS: i32 = 1;
pub const MAX_SESSION_HOURS: i32 = 24;

/// True once `now` has reached the session's effective end.
pub fn is_expired(session: &SessionMetadata, now: DateTime<Utc>) -> bool {
    now >= session.effective_end()
}

fn check_duration(hours: i32) -> VenueResult<()> {
    if (MIN_SESSION_HOURS..=MAX_SESSION_HOURS).contains(&hours) {
        Ok(())
    } else {
        Err(VenueError::InvalidDuration {
            min: MIN_SESSION_HOURS,
            max: MAX_SESSION_HOURS,
        })
    }
}

/// Timed venue sessions and the attendance rows that live inside them.
///
/// Expiry is lazy: every read of the active session checks the clock and
/// runs the cascade when the window has passed. Manual deactivation goes
/// through the same cascade.
#[derive(Clone)]
pub struct SessionLifecycle {
    store: Arc<dyn Store>,
    events: EventPublisher,
}

impl SessionLifecycle {
    pub fn new(store: Arc<dyn Store>, events: EventPublisher) -> Self {
        Self { store, events }
    }

    pub fn create_venue(&self, name: &str) -> VenueResult<Venue> {
        let venue = self.store.create_venue(name)?;
        tracing::info!(venue_id = %venue.id, name = %venue.name, "venue created");
        Ok(venue)
    }

    /// The venue's live session, or `None` when there is none or it just
    /// expired (in which case the cascade has run).
    pub fn get_active_session(&self, venue_id: Uuid, now: DateTime<Utc>) -> VenueResult<Option<SessionMetadata>> {
        let Some(session) = self.store.latest_active_session(venue_id)? else {
            return Ok(None);
        };

        if is_expired(&session, now) {
            self.cascade(session.id, now)?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    pub fn require_active_session(&self, venue_id: Uuid, now: DateTime<Utc>) -> VenueResult<SessionMetadata> {
        self.get_active_session(venue_id, now)?
            .ok_or(VenueError::NoActiveSession)
    }

    /// Idempotent entry: the profile's live attendance at this venue, created
    /// on first call.
    pub fn ensure_attendance(
        &self,
        venue_id: Uuid,
        profile_id: Uuid,
        now: DateTime<Utc>,
    ) -> VenueResult<Upserted<Attendance>> {
        let session = self.require_active_session(venue_id, now)?;
        if self.store.find_profile(profile_id)?.is_none() {
            return Err(VenueError::ProfileNotFound);
        }

        let attendance = self
            .store
            .ensure_live_attendance(NewAttendance {
                profile_id,
                venue_id,
                session_id: session.id,
                entered_at: now,
            })?
            // closed between the read above and the gated insert
            .ok_or(VenueError::NoActiveSession)?;

        if attendance.created {
            tracing::info!(
                attendance_id = %attendance.row.id,
                venue_id = %venue_id,
                profile_id = %profile_id,
                "attendance started"
            );
            self.events.attendance_entered(&attendance.row);
        }

        Ok(attendance)
    }

    /// Closes the caller's live attendance. `None` when nothing was live.
    pub fn exit_attendance(&self, profile_id: Uuid, now: DateTime<Utc>) -> VenueResult<Option<Attendance>> {
        let exited = self.store.exit_live_attendance(profile_id, now)?;
        if let Some(attendance) = &exited {
            tracing::info!(attendance_id = %attendance.id, profile_id = %profile_id, "attendance exited");
        }
        Ok(exited)
    }

    /// Manual end of a session. Already closed sessions succeed with `None`.
    pub fn deactivate_now(&self, session_id: Uuid, now: DateTime<Utc>) -> VenueResult<Option<ExpiryReport>> {
        if self.store.find_session(session_id)?.is_none() {
            return Err(VenueError::SessionNotFound);
        }
        self.cascade(session_id, now)
    }

    /// Opens a session for the venue. A live session already in place is
    /// returned with `created = false`.
    pub fn start_session(
        &self,
        venue_id: Uuid,
        duration_hours: i32,
        started_by: Uuid,
        now: DateTime<Utc>,
    ) -> VenueResult<Upserted<SessionMetadata>> {
        check_duration(duration_hours)?;
        if self.store.find_venue(venue_id)?.is_none() {
            return Err(VenueError::VenueNotFound);
        }

        if let Some(live) = self.get_active_session(venue_id, now)? {
            return Ok(Upserted::existing(live));
        }

        let session = self.store.insert_session_exclusive(NewSession {
            venue_id,
            start_time: now,
            end_time: Some(now + Duration::hours(i64::from(duration_hours))),
            duration_hours,
        })?;

        if session.created {
            tracing::info!(
                session_id = %session.row.id,
                venue_id = %venue_id,
                duration_hours,
                "session started"
            );
            self.events.session_started(&session.row, started_by);
        }

        Ok(session)
    }

    pub fn extend_session(
        &self,
        session_id: Uuid,
        extra_hours: i32,
        now: DateTime<Utc>,
    ) -> VenueResult<SessionMetadata> {
        check_duration(extra_hours)?;
        let session = self
            .store
            .find_session(session_id)?
            .filter(|s| s.is_active)
            .ok_or(VenueError::SessionNotFound)?;

        if is_expired(&session, now) {
            self.cascade(session.id, now)?;
            return Err(VenueError::NoActiveSession);
        }

        let end_time = session.effective_end() + Duration::hours(i64::from(extra_hours));
        let extended = self
            .store
            .extend_active_session(session.id, end_time, session.duration_hours + extra_hours)?
            .ok_or(VenueError::SessionNotFound)?;

        tracing::info!(session_id = %extended.id, end_time = %end_time, "session extended");
        Ok(extended)
    }

    /// Session history of a venue, newest first.
    pub fn sessions_for_venue(&self, venue_id: Uuid) -> VenueResult<Vec<SessionMetadata>> {
        if self.store.find_venue(venue_id)?.is_none() {
            return Err(VenueError::VenueNotFound);
        }
        Ok(self.store.sessions_for_venue(venue_id)?)
    }

    fn cascade(&self, session_id: Uuid, now: DateTime<Utc>) -> VenueResult<Option<ExpiryReport>> {
        let report = self.store.expire_session(session_id, now)?;
        match &report {
            Some(report) => {
                metrics::counter!("venue_sessions_expired_total").increment(1);
                tracing::info!(
                    session_id = %session_id,
                    venue_id = %report.session.venue_id,
                    attendances_closed = report.attendances_closed,
                    profiles_deactivated = report.profiles_deactivated,
                    "session expired"
                );
                self.events.session_expired(report);
            }
            None => tracing::debug!(session_id = %session_id, "session already closed"),
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::Fixture;
    use crate::store::{AttendanceStore, ProfileStore, SessionStore};

    #[test]
    fn expiry_is_a_pure_function_of_now() {
        let start = Utc::now();
        let session = SessionMetadata {
            id: Uuid::new_v4(),
            venue_id: Uuid::new_v4(),
            start_time: start,
            end_time: None,
            duration_hours: 2,
            is_active: true,
            created_at: start,
        };
        assert!(!is_expired(&session, start + Duration::minutes(119)));
        assert!(is_expired(&session, start + Duration::hours(2)));
    }

    #[test]
    fn duration_outside_range_is_rejected() {
        let fx = Fixture::new();
        let venue = fx.venue();
        for hours in [0, 25, -3] {
            let err = fx.sessions.start_session(venue, hours, fx.staff, fx.now).unwrap_err();
            assert!(matches!(err, VenueError::InvalidDuration { .. }));
        }
    }

    #[test]
    fn unknown_venue_cannot_start() {
        let fx = Fixture::new();
        let err = fx.sessions.start_session(Uuid::new_v4(), 4, fx.staff, fx.now).unwrap_err();
        assert!(matches!(err, VenueError::VenueNotFound));
    }

    #[test]
    fn re_entry_returns_same_attendance() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let guest = fx.guest();

        let first = fx.sessions.ensure_attendance(venue, guest, fx.now).unwrap();
        let second = fx
            .sessions
            .ensure_attendance(venue, guest, fx.now + Duration::minutes(5))
            .unwrap();

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(first.row.id, second.row.id);
        assert_eq!(second.row.entered_at, fx.now);
        assert_eq!(fx.store.live_attendances(venue).unwrap().len(), 1);
    }

    #[test]
    fn concurrent_re_entry_creates_one_row() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let guest = fx.guest();

        let ids: Vec<Uuid> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..8)
                .map(|_| s.spawn(|| fx.sessions.ensure_attendance(venue, guest, fx.now).unwrap().row.id))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert!(ids.iter().all(|id| *id == ids[0]));
        assert_eq!(fx.store.live_attendances(venue).unwrap().len(), 1);
    }

    #[test]
    fn attendance_needs_a_live_session() {
        let fx = Fixture::new();
        let venue = fx.venue();
        let guest = fx.guest();
        let err = fx.sessions.ensure_attendance(venue, guest, fx.now).unwrap_err();
        assert!(matches!(err, VenueError::NoActiveSession));
    }

    #[test]
    fn entry_against_a_closed_session_is_refused() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let guest = fx.guest();
        let session = fx.sessions.require_active_session(venue, fx.now).unwrap();
        fx.sessions.deactivate_now(session.id, fx.now).unwrap();

        let late = fx
            .store
            .ensure_live_attendance(NewAttendance {
                profile_id: guest,
                venue_id: venue,
                session_id: session.id,
                entered_at: fx.now,
            })
            .unwrap();
        assert!(late.is_none());
        assert!(fx.store.live_attendances(venue).unwrap().is_empty());

        let err = fx.sessions.ensure_attendance(venue, guest, fx.now).unwrap_err();
        assert!(matches!(err, VenueError::NoActiveSession));
    }

    #[test]
    fn entries_racing_deactivation_leave_nothing_live() {
        for _ in 0..20 {
            let fx = Fixture::new();
            let venue = fx.venue_with_session(4);
            let session = fx.sessions.require_active_session(venue, fx.now).unwrap();
            let guests: Vec<Uuid> = (0..4).map(|_| fx.guest()).collect();

            let fx = &fx;
            std::thread::scope(|s| {
                for guest in &guests {
                    s.spawn(move || match fx.sessions.ensure_attendance(venue, *guest, fx.now) {
                        Ok(_) | Err(VenueError::NoActiveSession) => {}
                        Err(other) => panic!("unexpected error: {other}"),
                    });
                }
                s.spawn(|| fx.sessions.deactivate_now(session.id, fx.now).unwrap());
            });

            assert!(fx.store.live_attendances(venue).unwrap().is_empty());
            assert!(!fx.store.find_session(session.id).unwrap().unwrap().is_active);
        }
    }

    #[test]
    fn session_history_lists_newest_first() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(1);
        let later = fx.now + Duration::hours(2);
        let second = fx.sessions.start_session(venue, 2, fx.staff, later).unwrap().row;

        let history = fx.sessions.sessions_for_venue(venue).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, second.id);
        assert!(!history[1].is_active);

        let err = fx.sessions.sessions_for_venue(Uuid::new_v4()).unwrap_err();
        assert!(matches!(err, VenueError::VenueNotFound));
    }

    #[test]
    fn entry_clears_deactivation() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(1);
        let guest = fx.guest();
        fx.sessions.ensure_attendance(venue, guest, fx.now).unwrap();

        let later = fx.now + Duration::hours(2);
        assert!(fx.sessions.get_active_session(venue, later).unwrap().is_none());
        assert!(fx.store.find_profile(guest).unwrap().unwrap().is_deactivated);

        fx.sessions.start_session(venue, 3, fx.staff, later).unwrap();
        fx.sessions.ensure_attendance(venue, guest, later).unwrap();
        let profile = fx.store.find_profile(guest).unwrap().unwrap();
        assert!(!profile.is_deactivated);
        assert!(profile.deactivated_at.is_none());
    }

    #[test]
    fn lazy_expiry_cascades_once_under_concurrency() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(1);
        let guests: Vec<Uuid> = (0..3).map(|_| fx.guest()).collect();
        for guest in &guests {
            fx.sessions.ensure_attendance(venue, *guest, fx.now).unwrap();
        }
        fx.sessions.ensure_attendance(venue, fx.staff, fx.now).unwrap();

        let later = fx.now + Duration::hours(1) + Duration::minutes(1);
        std::thread::scope(|s| {
            for _ in 0..6 {
                s.spawn(|| assert!(fx.sessions.get_active_session(venue, later).unwrap().is_none()));
            }
        });

        let sessions = fx.store.sessions_for_venue(venue).unwrap();
        assert!(fx.store.expire_session(sessions[0].id, later).unwrap().is_none());
        assert_eq!(sessions.len(), 1);
        assert!(!sessions[0].is_active);
        assert_eq!(sessions[0].end_time, Some(later));
        assert!(fx.store.live_attendances(venue).unwrap().is_empty());

        for guest in &guests {
            let profile = fx.store.find_profile(*guest).unwrap().unwrap();
            assert!(profile.is_deactivated);
            assert_eq!(profile.deactivated_at, Some(later));
        }
        assert!(!fx.store.find_profile(fx.staff).unwrap().unwrap().is_deactivated);
    }

    #[test]
    fn at_most_one_active_session_across_create_and_deactivate() {
        let fx = Fixture::new();
        let venue = fx.venue();

        let first = fx.sessions.start_session(venue, 4, fx.staff, fx.now).unwrap();
        let again = fx.sessions.start_session(venue, 2, fx.staff, fx.now).unwrap();
        assert!(first.created);
        assert!(!again.created);
        assert_eq!(first.row.id, again.row.id);

        let report = fx.sessions.deactivate_now(first.row.id, fx.now).unwrap();
        assert!(report.is_some());
        assert!(fx.sessions.deactivate_now(first.row.id, fx.now).unwrap().is_none());

        let second = fx.sessions.start_session(venue, 4, fx.staff, fx.now).unwrap();
        assert!(second.created);
        assert_ne!(second.row.id, first.row.id);

        let concurrent: Vec<bool> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..4)
                .map(|_| s.spawn(|| fx.sessions.start_session(venue, 3, fx.staff, fx.now).unwrap().created))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        assert!(concurrent.iter().all(|created| !created));

        let active = fx
            .store
            .sessions_for_venue(venue)
            .unwrap()
            .into_iter()
            .filter(|s| s.is_active)
            .count();
        assert_eq!(active, 1);
    }

    #[test]
    fn stale_session_is_replaced_on_start() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(1);
        let later = fx.now + Duration::hours(3);

        let fresh = fx.sessions.start_session(venue, 2, fx.staff, later).unwrap();
        assert!(fresh.created);
        assert_eq!(fresh.row.start_time, later);

        let sessions = fx.store.sessions_for_venue(venue).unwrap();
        assert_eq!(sessions.iter().filter(|s| s.is_active).count(), 1);
    }

    #[test]
    fn deactivating_unknown_session_fails() {
        let fx = Fixture::new();
        let err = fx.sessions.deactivate_now(Uuid::new_v4(), fx.now).unwrap_err();
        assert!(matches!(err, VenueError::SessionNotFound));
    }

    #[test]
    fn extend_moves_end_forward() {
        let fx = Fixture::new();
        let venue = fx.venue();
        let session = fx.sessions.start_session(venue, 2, fx.staff, fx.now).unwrap().row;

        let extended = fx.sessions.extend_session(session.id, 3, fx.now).unwrap();
        assert_eq!(extended.end_time, Some(fx.now + Duration::hours(5)));
        assert_eq!(extended.duration_hours, 5);

        let still_live = fx.sessions.get_active_session(venue, fx.now + Duration::hours(4)).unwrap();
        assert!(still_live.is_some());
    }

    #[test]
    fn extending_an_expired_session_cascades() {
        let fx = Fixture::new();
        let venue = fx.venue();
        let session = fx.sessions.start_session(venue, 1, fx.staff, fx.now).unwrap().row;

        let err = fx
            .sessions
            .extend_session(session.id, 2, fx.now + Duration::hours(2))
            .unwrap_err();
        assert!(matches!(err, VenueError::NoActiveSession));
        assert!(!fx.store.find_session(session.id).unwrap().unwrap().is_active);

        let err = fx.sessions.extend_session(session.id, 2, fx.now).unwrap_err();
        assert!(matches!(err, VenueError::SessionNotFound));
    }

    #[test]
    fn exit_closes_live_attendance_only() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let guest = fx.guest();
        fx.sessions.ensure_attendance(venue, guest, fx.now).unwrap();

        let exited = fx.sessions.exit_attendance(guest, fx.now).unwrap().unwrap();
        assert!(!exited.is_live());
        assert!(fx.sessions.exit_attendance(guest, fx.now).unwrap().is_none());
    }
}
