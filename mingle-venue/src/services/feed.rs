use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

use super::access::AccessControl;
use crate::error::VenueResult;
use crate::models::InteractionKind;
use crate::store::Store;

/// One entry of the "people here now" list.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProfileSummary {
    pub profile_id: Uuid,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub is_staff: bool,
    pub entered_at: DateTime<Utc>,
    pub liked_by_viewer: bool,
    pub invited_by_viewer: bool,
    pub they_liked_viewer: bool,
    pub is_matched: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct Relationship {
    liked_by_viewer: bool,
    invited_by_viewer: bool,
    they_liked_viewer: bool,
    has_open_interaction: bool,
    is_matched: bool,
}

impl Relationship {
    fn is_known(&self) -> bool {
        self.has_open_interaction || self.is_matched
    }
}

#[derive(Clone)]
pub struct FeedBuilder {
    store: Arc<dyn Store>,
    access: AccessControl,
}

impl FeedBuilder {
    pub fn new(store: Arc<dyn Store>, access: AccessControl) -> Self {
        Self { store, access }
    }

    /// Visible attendees of the venue for `viewer_id`, most recent entry
    /// first. Read-only.
    pub fn build(&self, venue_id: Uuid, viewer_id: Uuid, now: DateTime<Utc>) -> VenueResult<Vec<ProfileSummary>> {
        let blocked = self.access.blocked_counterparts(viewer_id)?;

        // one entry per profile, keeping the latest entry time
        let mut entered: HashMap<Uuid, DateTime<Utc>> = HashMap::new();
        for attendance in self.store.live_attendances(venue_id)? {
            if attendance.profile_id == viewer_id || blocked.contains(&attendance.profile_id) {
                continue;
            }
            entered
                .entry(attendance.profile_id)
                .and_modify(|at| *at = (*at).max(attendance.entered_at))
                .or_insert(attendance.entered_at);
        }
        if entered.is_empty() {
            return Ok(Vec::new());
        }

        let relationships = self.relationships(viewer_id, &entered)?;
        let ids: Vec<Uuid> = entered.keys().copied().collect();

        let mut feed: Vec<ProfileSummary> = self
            .store
            .profiles_by_ids(&ids)?
            .into_iter()
            .filter_map(|profile| {
                let rel = relationships.get(&profile.id).copied().unwrap_or_default();
                if !self.access.admits(&profile, rel.is_known(), now) {
                    return None;
                }
                let entered_at = *entered.get(&profile.id)?;
                Some(ProfileSummary {
                    profile_id: profile.id,
                    display_name: profile.display_name,
                    bio: profile.bio,
                    is_staff: profile.is_staff,
                    entered_at,
                    liked_by_viewer: rel.liked_by_viewer,
                    invited_by_viewer: rel.invited_by_viewer,
                    they_liked_viewer: rel.they_liked_viewer,
                    is_matched: rel.is_matched,
                })
            })
            .collect();

        feed.sort_by(|a, b| {
            b.entered_at
                .cmp(&a.entered_at)
                .then_with(|| a.profile_id.cmp(&b.profile_id))
        });

        Ok(feed)
    }

    fn relationships(
        &self,
        viewer_id: Uuid,
        candidates: &HashMap<Uuid, DateTime<Utc>>,
    ) -> VenueResult<HashMap<Uuid, Relationship>> {
        let mut relationships: HashMap<Uuid, Relationship> = HashMap::new();

        for interaction in self.store.interactions_involving(viewer_id)? {
            if !interaction.is_open() {
                continue;
            }
            let sent = interaction.sender_id == viewer_id;
            let other = if sent { interaction.receiver_id } else { interaction.sender_id };
            if !candidates.contains_key(&other) {
                continue;
            }

            let rel = relationships.entry(other).or_default();
            rel.has_open_interaction = true;
            let is_like = interaction.is_kind(InteractionKind::Like);
            if sent && is_like {
                rel.liked_by_viewer = true;
            } else if sent && interaction.is_kind(InteractionKind::Invite) {
                rel.invited_by_viewer = true;
            } else if !sent && is_like {
                rel.they_liked_viewer = true;
            }
        }

        let matched: HashSet<Uuid> = self
            .store
            .matches_for(viewer_id)?
            .iter()
            .map(|m| m.other_party(viewer_id))
            .collect();
        for other in matched.into_iter().filter(|id| candidates.contains_key(id)) {
            relationships.entry(other).or_default().is_matched = true;
        }

        Ok(relationships)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::access::FeedPrivacy;
    use crate::services::matcher::Decision;
    use crate::services::testing::Fixture;
    use crate::store::ProfileStore;
    use chrono::Duration;

    #[test]
    fn excludes_self_private_blocked_and_suspended() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let viewer = fx.guest();
        let (public, private, blocked, suspended) = (fx.guest(), fx.guest(), fx.guest(), fx.guest());
        for p in [viewer, public, private, blocked, suspended] {
            fx.sessions.ensure_attendance(venue, p, fx.now).unwrap();
        }
        fx.store.set_privacy(private, true, fx.now).unwrap();
        fx.matcher.block(viewer, blocked, fx.now).unwrap();
        fx.profiles
            .suspend(suspended, Some(fx.now + Duration::hours(1)), "spam".into(), fx.now)
            .unwrap();

        let feed = fx.feed.build(venue, viewer, fx.now).unwrap();
        let ids: Vec<Uuid> = feed.iter().map(|s| s.profile_id).collect();
        assert_eq!(ids, vec![public]);
    }

    #[test]
    fn blocked_viewer_does_not_see_blocker() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let (viewer, blocker) = (fx.guest(), fx.guest());
        for p in [viewer, blocker] {
            fx.sessions.ensure_attendance(venue, p, fx.now).unwrap();
        }
        fx.matcher.block(blocker, viewer, fx.now).unwrap();

        assert!(fx.feed.build(venue, viewer, fx.now).unwrap().is_empty());
    }

    #[test]
    fn staff_appear_only_when_opted_in() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let viewer = fx.guest();
        fx.sessions.ensure_attendance(venue, viewer, fx.now).unwrap();
        fx.sessions.ensure_attendance(venue, fx.staff, fx.now).unwrap();

        assert!(fx.feed.build(venue, viewer, fx.now).unwrap().is_empty());

        fx.profiles.set_feed_visibility(fx.staff, true, fx.now).unwrap();
        fx.sessions.exit_attendance(fx.staff, fx.now).unwrap();
        fx.sessions.ensure_attendance(venue, fx.staff, fx.now + Duration::minutes(1)).unwrap();

        let feed = fx.feed.build(venue, viewer, fx.now + Duration::minutes(2)).unwrap();
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].profile_id, fx.staff);
        assert!(feed[0].is_staff);
    }

    #[test]
    fn newest_entries_first() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let viewer = fx.guest();
        let (early, late) = (fx.guest(), fx.guest());
        fx.sessions.ensure_attendance(venue, viewer, fx.now).unwrap();
        fx.sessions.ensure_attendance(venue, early, fx.now + Duration::minutes(1)).unwrap();
        fx.sessions.ensure_attendance(venue, late, fx.now + Duration::minutes(9)).unwrap();

        let feed = fx.feed.build(venue, viewer, fx.now + Duration::minutes(10)).unwrap();
        let ids: Vec<Uuid> = feed.iter().map(|s| s.profile_id).collect();
        assert_eq!(ids, vec![late, early]);
    }

    #[test]
    fn annotations_reflect_interactions_and_matches() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let (viewer, liked, admirer, matched) = (fx.guest(), fx.guest(), fx.guest(), fx.guest());
        let mut attendance = HashMap::new();
        for p in [viewer, liked, admirer, matched] {
            attendance.insert(p, fx.sessions.ensure_attendance(venue, p, fx.now).unwrap().row.id);
        }

        fx.matcher
            .send(viewer, liked, InteractionKind::Like, attendance[&viewer], fx.now)
            .unwrap();
        fx.matcher
            .send(viewer, liked, InteractionKind::Invite, attendance[&viewer], fx.now)
            .unwrap();
        fx.matcher
            .send(admirer, viewer, InteractionKind::Like, attendance[&admirer], fx.now)
            .unwrap();
        fx.mutual_match(viewer, matched, attendance[&viewer], attendance[&matched]);

        let feed = fx.feed.build(venue, viewer, fx.now).unwrap();
        let by_id: HashMap<Uuid, &ProfileSummary> = feed.iter().map(|s| (s.profile_id, s)).collect();

        assert!(by_id[&liked].liked_by_viewer);
        assert!(by_id[&liked].invited_by_viewer);
        assert!(!by_id[&liked].they_liked_viewer);
        assert!(by_id[&admirer].they_liked_viewer);
        assert!(!by_id[&admirer].liked_by_viewer);
        assert!(by_id[&matched].is_matched);
        assert!(!by_id[&liked].is_matched);
    }

    #[test]
    fn declined_interactions_are_not_annotated() {
        let fx = Fixture::new();
        let venue = fx.venue_with_session(4);
        let (viewer, other) = (fx.guest(), fx.guest());
        let viewer_att = fx.sessions.ensure_attendance(venue, viewer, fx.now).unwrap().row.id;
        fx.sessions.ensure_attendance(venue, other, fx.now).unwrap();

        let like = fx
            .matcher
            .send(viewer, other, InteractionKind::Like, viewer_att, fx.now)
            .unwrap()
            .row;
        fx.matcher.respond(other, like.id, Decision::Decline, fx.now).unwrap();

        let feed = fx.feed.build(venue, viewer, fx.now).unwrap();
        assert!(!feed[0].liked_by_viewer);
    }

    #[test]
    fn reveal_known_keeps_private_contacts_visible() {
        let fx = Fixture::with_privacy(FeedPrivacy::RevealKnown);
        let venue = fx.venue_with_session(4);
        let (viewer, known, stranger) = (fx.guest(), fx.guest(), fx.guest());
        let viewer_att = fx.sessions.ensure_attendance(venue, viewer, fx.now).unwrap().row.id;
        for p in [known, stranger] {
            fx.sessions.ensure_attendance(venue, p, fx.now).unwrap();
            fx.store.set_privacy(p, true, fx.now).unwrap();
        }
        fx.matcher
            .send(viewer, known, InteractionKind::Like, viewer_att, fx.now)
            .unwrap();

        let feed = fx.feed.build(venue, viewer, fx.now).unwrap();
        let ids: Vec<Uuid> = feed.iter().map(|s| s.profile_id).collect();
        assert_eq!(ids, vec![known]);

        let hide_all = Fixture::new();
        assert_eq!(hide_all.access.privacy(), FeedPrivacy::HideAll);
    }
}
