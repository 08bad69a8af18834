//! In-process store. Each operation runs under one mutex, which gives the same
//! all-or-nothing semantics as the transactional backend.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use super::{
    AttendanceStore, BlockOutcome, BlockStore, ExpiryReport, InteractionStore, MatchStore,
    ProfileStore, SessionStore, Store, StoreError, StoreResult, Upserted, VenueStore,
};
use crate::models::{
    canonical_pair, Attendance, AttendanceStatus, Block, Interaction, InteractionStatus, Match,
    NewAttendance, NewBlock, NewInteraction, NewMatch, NewProfile, NewSession, Profile,
    SessionMetadata, Venue,
};

#[derive(Default)]
struct Tables {
    venues: HashMap<Uuid, Venue>,
    sessions: Vec<SessionMetadata>,
    attendances: Vec<Attendance>,
    profiles: HashMap<Uuid, Profile>,
    interactions: Vec<Interaction>,
    matches: Vec<Match>,
    blocks: Vec<Block>,
}

impl Tables {
    fn close_attendance(attendance: &mut Attendance, now: DateTime<Utc>) {
        attendance.status = AttendanceStatus::Inactive.as_str().to_string();
        attendance.exited_at = Some(now);
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, Tables>> {
        self.tables.lock().map_err(|_| StoreError::Poisoned)
    }
}

impl VenueStore for MemoryStore {
    fn create_venue(&self, name: &str) -> StoreResult<Venue> {
        let mut t = self.lock()?;
        let venue = Venue {
            id: Uuid::now_v7(),
            name: name.to_string(),
            created_at: Utc::now(),
        };
        t.venues.insert(venue.id, venue.clone());
        Ok(venue)
    }

    fn find_venue(&self, venue_id: Uuid) -> StoreResult<Option<Venue>> {
        Ok(self.lock()?.venues.get(&venue_id).cloned())
    }
}

impl SessionStore for MemoryStore {
    fn latest_active_session(&self, venue_id: Uuid) -> StoreResult<Option<SessionMetadata>> {
        let t = self.lock()?;
        Ok(t.sessions
            .iter()
            .filter(|s| s.venue_id == venue_id && s.is_active)
            .max_by_key(|s| (s.start_time, s.id))
            .cloned())
    }

    fn find_session(&self, session_id: Uuid) -> StoreResult<Option<SessionMetadata>> {
        Ok(self.lock()?.sessions.iter().find(|s| s.id == session_id).cloned())
    }

    fn sessions_for_venue(&self, venue_id: Uuid) -> StoreResult<Vec<SessionMetadata>> {
        let t = self.lock()?;
        let mut sessions: Vec<SessionMetadata> = t
            .sessions
            .iter()
            .filter(|s| s.venue_id == venue_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));
        Ok(sessions)
    }

    fn insert_session_exclusive(&self, new: NewSession) -> StoreResult<Upserted<SessionMetadata>> {
        let mut t = self.lock()?;
        if let Some(existing) = t.sessions.iter().find(|s| s.venue_id == new.venue_id && s.is_active) {
            return Ok(Upserted::existing(existing.clone()));
        }
        let session = SessionMetadata {
            id: Uuid::now_v7(),
            venue_id: new.venue_id,
            start_time: new.start_time,
            end_time: new.end_time,
            duration_hours: new.duration_hours,
            is_active: true,
            created_at: new.start_time,
        };
        t.sessions.push(session.clone());
        Ok(Upserted::created(session))
    }

    fn extend_active_session(
        &self,
        session_id: Uuid,
        end_time: DateTime<Utc>,
        duration_hours: i32,
    ) -> StoreResult<Option<SessionMetadata>> {
        let mut t = self.lock()?;
        Ok(t.sessions
            .iter_mut()
            .find(|s| s.id == session_id && s.is_active)
            .map(|s| {
                s.end_time = Some(end_time);
                s.duration_hours = duration_hours;
                s.clone()
            }))
    }

    fn expire_session(&self, session_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<ExpiryReport>> {
        let mut guard = self.lock()?;
        let t = &mut *guard;

        let Some(session) = t.sessions.iter_mut().find(|s| s.id == session_id && s.is_active) else {
            return Ok(None);
        };
        session.is_active = false;
        session.end_time = Some(now);
        let session = session.clone();

        let mut exited = Vec::new();
        for attendance in t
            .attendances
            .iter_mut()
            .filter(|a| a.venue_id == session.venue_id && a.is_live())
        {
            Tables::close_attendance(attendance, now);
            exited.push(attendance.profile_id);
        }

        let mut profiles_deactivated = 0;
        for profile_id in &exited {
            if let Some(profile) = t.profiles.get_mut(profile_id) {
                if !profile.is_staff {
                    profile.is_deactivated = true;
                    profile.deactivated_at = Some(now);
                    profile.updated_at = now;
                    profiles_deactivated += 1;
                }
            }
        }

        Ok(Some(ExpiryReport {
            session,
            attendances_closed: exited.len(),
            profiles_deactivated,
        }))
    }
}

impl AttendanceStore for MemoryStore {
    fn ensure_live_attendance(&self, new: NewAttendance) -> StoreResult<Option<Upserted<Attendance>>> {
        let mut guard = self.lock()?;
        let t = &mut *guard;

        let session_open = t
            .sessions
            .iter()
            .any(|s| s.id == new.session_id && s.is_active && s.effective_end() > new.entered_at);
        if !session_open {
            return Ok(None);
        }

        for other in t
            .attendances
            .iter_mut()
            .filter(|a| a.profile_id == new.profile_id && a.venue_id != new.venue_id && a.is_live())
        {
            Tables::close_attendance(other, new.entered_at);
        }

        let existing = t
            .attendances
            .iter()
            .find(|a| a.profile_id == new.profile_id && a.venue_id == new.venue_id && a.is_live())
            .cloned();
        let outcome = match existing {
            Some(row) => Upserted::existing(row),
            None => {
                let row = Attendance {
                    id: Uuid::now_v7(),
                    profile_id: new.profile_id,
                    venue_id: new.venue_id,
                    session_id: new.session_id,
                    status: AttendanceStatus::Active.as_str().to_string(),
                    entered_at: new.entered_at,
                    exited_at: None,
                };
                t.attendances.push(row.clone());
                Upserted::created(row)
            }
        };

        if let Some(profile) = t.profiles.get_mut(&new.profile_id) {
            profile.is_deactivated = false;
            profile.deactivated_at = None;
            profile.updated_at = new.entered_at;
        }

        Ok(Some(outcome))
    }

    fn find_attendance(&self, attendance_id: Uuid) -> StoreResult<Option<Attendance>> {
        Ok(self.lock()?.attendances.iter().find(|a| a.id == attendance_id).cloned())
    }

    fn live_attendances(&self, venue_id: Uuid) -> StoreResult<Vec<Attendance>> {
        let t = self.lock()?;
        Ok(t.attendances
            .iter()
            .filter(|a| a.venue_id == venue_id && a.is_live())
            .cloned()
            .collect())
    }

    fn exit_live_attendance(&self, profile_id: Uuid, now: DateTime<Utc>) -> StoreResult<Option<Attendance>> {
        let mut t = self.lock()?;
        Ok(t.attendances
            .iter_mut()
            .find(|a| a.profile_id == profile_id && a.is_live())
            .map(|a| {
                Tables::close_attendance(a, now);
                a.clone()
            }))
    }
}

impl ProfileStore for MemoryStore {
    fn ensure_profile(&self, new: NewProfile) -> StoreResult<Upserted<Profile>> {
        let mut t = self.lock()?;
        if let Some(existing) = t.profiles.get_mut(&new.id) {
            if existing.is_staff != new.is_staff {
                existing.is_staff = new.is_staff;
                existing.updated_at = Utc::now();
            }
            return Ok(Upserted::existing(existing.clone()));
        }
        let now = Utc::now();
        let profile = Profile {
            id: new.id,
            display_name: new.display_name,
            bio: None,
            phone_number: new.phone_number,
            is_private: false,
            is_staff: new.is_staff,
            appear_in_feed: false,
            blocked_until: None,
            blocked_reason: None,
            is_deactivated: false,
            deactivated_at: None,
            created_at: now,
            updated_at: now,
        };
        t.profiles.insert(profile.id, profile.clone());
        Ok(Upserted::created(profile))
    }

    fn find_profile(&self, profile_id: Uuid) -> StoreResult<Option<Profile>> {
        Ok(self.lock()?.profiles.get(&profile_id).cloned())
    }

    fn profiles_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Profile>> {
        let t = self.lock()?;
        Ok(ids.iter().filter_map(|id| t.profiles.get(id).cloned()).collect())
    }

    fn set_privacy(&self, profile_id: Uuid, is_private: bool, now: DateTime<Utc>) -> StoreResult<Option<Profile>> {
        let mut t = self.lock()?;
        Ok(t.profiles.get_mut(&profile_id).map(|p| {
            p.is_private = is_private;
            p.updated_at = now;
            p.clone()
        }))
    }

    fn set_feed_visibility(&self, profile_id: Uuid, appear_in_feed: bool, now: DateTime<Utc>) -> StoreResult<Option<Profile>> {
        let mut t = self.lock()?;
        Ok(t.profiles.get_mut(&profile_id).map(|p| {
            p.appear_in_feed = appear_in_feed;
            p.updated_at = now;
            p.clone()
        }))
    }

    fn set_suspension(
        &self,
        profile_id: Uuid,
        until: Option<DateTime<Utc>>,
        reason: Option<String>,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<Profile>> {
        let mut t = self.lock()?;
        Ok(t.profiles.get_mut(&profile_id).map(|p| {
            p.blocked_until = until;
            p.blocked_reason = reason;
            p.updated_at = now;
            p.clone()
        }))
    }
}

impl InteractionStore for MemoryStore {
    fn insert_pending_interaction(&self, new: NewInteraction) -> StoreResult<Upserted<Interaction>> {
        let mut t = self.lock()?;
        let pending = InteractionStatus::Pending.as_str();
        if let Some(existing) = t.interactions.iter().find(|i| {
            i.sender_id == new.sender_id
                && i.receiver_id == new.receiver_id
                && i.kind == new.kind
                && i.status == pending
        }) {
            return Ok(Upserted::existing(existing.clone()));
        }
        let interaction = Interaction {
            id: Uuid::now_v7(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            attendance_id: new.attendance_id,
            kind: new.kind,
            status: pending.to_string(),
            created_at: new.created_at,
            responded_at: None,
        };
        t.interactions.push(interaction.clone());
        Ok(Upserted::created(interaction))
    }

    fn find_interaction(&self, interaction_id: Uuid) -> StoreResult<Option<Interaction>> {
        Ok(self.lock()?.interactions.iter().find(|i| i.id == interaction_id).cloned())
    }

    fn resolve_pending(
        &self,
        interaction_id: Uuid,
        status: InteractionStatus,
        responded_at: DateTime<Utc>,
    ) -> StoreResult<Option<Interaction>> {
        let mut t = self.lock()?;
        Ok(t.interactions
            .iter_mut()
            .find(|i| i.id == interaction_id && i.has_status(InteractionStatus::Pending))
            .map(|i| {
                i.status = status.as_str().to_string();
                i.responded_at = Some(responded_at);
                i.clone()
            }))
    }

    fn latest_accepted_from(&self, sender_id: Uuid, receiver_id: Uuid) -> StoreResult<Option<Interaction>> {
        let t = self.lock()?;
        Ok(t.interactions
            .iter()
            .filter(|i| {
                i.sender_id == sender_id
                    && i.receiver_id == receiver_id
                    && i.has_status(InteractionStatus::Accepted)
            })
            .max_by_key(|i| (i.created_at, i.id))
            .cloned())
    }

    fn interactions_involving(&self, profile_id: Uuid) -> StoreResult<Vec<Interaction>> {
        let t = self.lock()?;
        Ok(t.interactions
            .iter()
            .filter(|i| i.sender_id == profile_id || i.receiver_id == profile_id)
            .cloned()
            .collect())
    }

    fn pending_received(&self, profile_id: Uuid) -> StoreResult<Vec<Interaction>> {
        let t = self.lock()?;
        let mut pending: Vec<Interaction> = t
            .interactions
            .iter()
            .filter(|i| i.receiver_id == profile_id && i.has_status(InteractionStatus::Pending))
            .cloned()
            .collect();
        pending.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(pending)
    }
}

impl MatchStore for MemoryStore {
    fn insert_match(&self, new: NewMatch) -> StoreResult<Upserted<Match>> {
        let mut t = self.lock()?;
        if let Some(existing) = t
            .matches
            .iter()
            .find(|m| m.profile_a == new.profile_a && m.profile_b == new.profile_b)
        {
            return Ok(Upserted::existing(existing.clone()));
        }
        let row = Match {
            id: Uuid::now_v7(),
            interaction_id: new.interaction_id,
            profile_a: new.profile_a,
            profile_b: new.profile_b,
            contact_link: new.contact_link,
            created_at: new.created_at,
        };
        t.matches.push(row.clone());
        Ok(Upserted::created(row))
    }

    fn find_match(&self, match_id: Uuid) -> StoreResult<Option<Match>> {
        Ok(self.lock()?.matches.iter().find(|m| m.id == match_id).cloned())
    }

    fn find_match_between(&self, x: Uuid, y: Uuid) -> StoreResult<Option<Match>> {
        let (a, b) = canonical_pair(x, y);
        let t = self.lock()?;
        Ok(t.matches.iter().find(|m| m.profile_a == a && m.profile_b == b).cloned())
    }

    fn delete_match(&self, match_id: Uuid) -> StoreResult<bool> {
        let mut t = self.lock()?;
        let before = t.matches.len();
        t.matches.retain(|m| m.id != match_id);
        Ok(t.matches.len() != before)
    }

    fn matches_for(&self, profile_id: Uuid) -> StoreResult<Vec<Match>> {
        let t = self.lock()?;
        let mut matches: Vec<Match> = t.matches.iter().filter(|m| m.involves(profile_id)).cloned().collect();
        matches.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(matches)
    }
}

impl BlockStore for MemoryStore {
    fn block_and_unmatch(&self, new: NewBlock) -> StoreResult<BlockOutcome> {
        let mut t = self.lock()?;

        let existing = t
            .blocks
            .iter()
            .find(|b| b.blocker_id == new.blocker_id && b.blocked_id == new.blocked_id)
            .cloned();
        let block = match existing {
            Some(row) => Upserted::existing(row),
            None => {
                let row = Block {
                    id: Uuid::now_v7(),
                    blocker_id: new.blocker_id,
                    blocked_id: new.blocked_id,
                    created_at: new.created_at,
                };
                t.blocks.push(row.clone());
                Upserted::created(row)
            }
        };

        let (a, b) = canonical_pair(new.blocker_id, new.blocked_id);
        let position = t.matches.iter().position(|m| m.profile_a == a && m.profile_b == b);
        let removed_match = position.map(|idx| t.matches.remove(idx));

        Ok(BlockOutcome { block, removed_match })
    }

    fn remove_block(&self, blocker_id: Uuid, blocked_id: Uuid) -> StoreResult<bool> {
        let mut t = self.lock()?;
        let before = t.blocks.len();
        t.blocks.retain(|b| !(b.blocker_id == blocker_id && b.blocked_id == blocked_id));
        Ok(t.blocks.len() != before)
    }

    fn blocks_involving(&self, profile_id: Uuid) -> StoreResult<Vec<Block>> {
        let t = self.lock()?;
        Ok(t.blocks
            .iter()
            .filter(|b| b.blocker_id == profile_id || b.blocked_id == profile_id)
            .cloned()
            .collect())
    }

    fn is_blocked_between(&self, x: Uuid, y: Uuid) -> StoreResult<bool> {
        let t = self.lock()?;
        Ok(t.blocks.iter().any(|b| {
            (b.blocker_id == x && b.blocked_id == y) || (b.blocker_id == y && b.blocked_id == x)
        }))
    }
}

impl Store for MemoryStore {
    fn health_check(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}
