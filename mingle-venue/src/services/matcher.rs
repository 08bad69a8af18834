use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::access::AccessControl;
use crate::contact::ContactLinkBuilder;
use crate::error::{VenueError, VenueResult};
use crate::events::EventPublisher;
use crate::models::{
    Interaction, InteractionKind, InteractionStatus, Match, NewBlock, NewInteraction, NewMatch,
};
use crate::store::{BlockOutcome, Store, Upserted};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    Accept,
    Decline,
}

impl Decision {
    fn status(self) -> InteractionStatus {
        match self {
            Self::Accept => InteractionStatus::Accepted,
            Self::Decline => InteractionStatus::Declined,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RespondOutcome {
    pub interaction: Interaction,
    pub matched: Option<Match>,
    /// The interaction was no longer pending; nothing changed.
    pub already_resolved: bool,
}

/// Likes and invites, reciprocity detection, and the match lifecycle.
#[derive(Clone)]
pub struct Matcher {
    store: Arc<dyn Store>,
    access: AccessControl,
    links: Arc<dyn ContactLinkBuilder>,
    contact_message: String,
    events: EventPublisher,
}

impl Matcher {
    pub fn new(
        store: Arc<dyn Store>,
        access: AccessControl,
        links: Arc<dyn ContactLinkBuilder>,
        contact_message: impl Into<String>,
        events: EventPublisher,
    ) -> Self {
        Self {
            store,
            access,
            links,
            contact_message: contact_message.into(),
            events,
        }
    }

    /// Records interest from `sender_id`. A pending interaction of the same
    /// kind toward the same receiver is returned as is.
    pub fn send(
        &self,
        sender_id: Uuid,
        receiver_id: Uuid,
        kind: InteractionKind,
        attendance_id: Uuid,
        now: DateTime<Utc>,
    ) -> VenueResult<Upserted<Interaction>> {
        if sender_id == receiver_id {
            return Err(VenueError::InvalidTarget);
        }
        if self.store.find_profile(receiver_id)?.is_none() {
            return Err(VenueError::ProfileNotFound);
        }

        let attendance = self
            .store
            .find_attendance(attendance_id)?
            .filter(|a| a.profile_id == sender_id && a.is_live())
            .ok_or(VenueError::AttendanceNotActive)?;

        self.access.may_interact(sender_id, receiver_id)?;

        let interaction = self.store.insert_pending_interaction(NewInteraction {
            sender_id,
            receiver_id,
            attendance_id: attendance.id,
            kind: kind.as_str().to_string(),
            created_at: now,
        })?;

        if interaction.created {
            tracing::info!(
                interaction_id = %interaction.row.id,
                sender_id = %sender_id,
                receiver_id = %receiver_id,
                kind = kind.as_str(),
                "interaction sent"
            );
            self.events.interaction_sent(&interaction.row);
        }

        Ok(interaction)
    }

    pub fn respond(
        &self,
        receiver_id: Uuid,
        interaction_id: Uuid,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> VenueResult<RespondOutcome> {
        let interaction = self
            .store
            .find_interaction(interaction_id)?
            .ok_or(VenueError::InteractionNotFound)?;
        if interaction.receiver_id != receiver_id {
            return Err(VenueError::NotReceiver);
        }
        if !interaction.has_status(InteractionStatus::Pending) {
            return self.already_resolved(interaction);
        }

        let responded_at = now.max(interaction.created_at);
        let Some(resolved) = self
            .store
            .resolve_pending(interaction.id, decision.status(), responded_at)?
        else {
            // a concurrent response won
            let current = self
                .store
                .find_interaction(interaction_id)?
                .ok_or(VenueError::InteractionNotFound)?;
            return self.already_resolved(current);
        };

        tracing::info!(
            interaction_id = %resolved.id,
            status = %resolved.status,
            "interaction resolved"
        );
        self.events.interaction_responded(&resolved);

        let matched = match decision {
            Decision::Accept => self.match_if_reciprocal(&resolved, now)?,
            Decision::Decline => None,
        };

        Ok(RespondOutcome {
            interaction: resolved,
            matched,
            already_resolved: false,
        })
    }

    fn already_resolved(&self, interaction: Interaction) -> VenueResult<RespondOutcome> {
        let matched = if interaction.has_status(InteractionStatus::Accepted) {
            self.store
                .find_match_between(interaction.sender_id, interaction.receiver_id)?
        } else {
            None
        };
        Ok(RespondOutcome {
            interaction,
            matched,
            already_resolved: true,
        })
    }

    /// Runs after the accept is committed. Any accepted interaction sent back
    /// by the receiver completes the pair; the canonical pair key keeps the
    /// match unique when both sides accept at once.
    fn match_if_reciprocal(&self, accepted: &Interaction, now: DateTime<Utc>) -> VenueResult<Option<Match>> {
        let Some(reverse) = self
            .store
            .latest_accepted_from(accepted.receiver_id, accepted.sender_id)?
        else {
            return Ok(None);
        };
        tracing::debug!(interaction_id = %accepted.id, reverse_id = %reverse.id, "reciprocal accept found");
        if self.access.may_interact(accepted.sender_id, accepted.receiver_id).is_err() {
            tracing::debug!(interaction_id = %accepted.id, "pair is blocked, no match");
            return Ok(None);
        }

        let phone_number = self
            .store
            .find_profile(accepted.sender_id)?
            .and_then(|p| p.phone_number);
        let contact_link = self.links.build(&self.contact_message, phone_number.as_deref());

        let matched = self.store.insert_match(NewMatch::new(
            accepted.id,
            accepted.sender_id,
            accepted.receiver_id,
            contact_link,
            now,
        ))?;

        if matched.created {
            metrics::counter!("venue_matches_created_total").increment(1);
            tracing::info!(
                match_id = %matched.row.id,
                profile_a = %matched.row.profile_a,
                profile_b = %matched.row.profile_b,
                "match created"
            );
            self.events.match_created(&matched.row);
        }

        Ok(Some(matched.row))
    }

    /// Deletes the match. Interaction history stays.
    pub fn unmatch(&self, match_id: Uuid, requester_id: Uuid) -> VenueResult<Match> {
        let matched = self
            .store
            .find_match(match_id)?
            .ok_or(VenueError::MatchNotFound)?;
        if !matched.involves(requester_id) {
            return Err(VenueError::NotMatchParticipant);
        }

        if self.store.delete_match(match_id)? {
            tracing::info!(match_id = %match_id, requester_id = %requester_id, "match removed");
            self.events.match_removed(&matched, requester_id, "unmatched");
        }

        Ok(matched)
    }

    pub fn block(&self, blocker_id: Uuid, blocked_id: Uuid, now: DateTime<Utc>) -> VenueResult<BlockOutcome> {
        if blocker_id == blocked_id {
            return Err(VenueError::InvalidTarget);
        }
        if self.store.find_profile(blocked_id)?.is_none() {
            return Err(VenueError::ProfileNotFound);
        }

        let outcome = self.store.block_and_unmatch(NewBlock {
            blocker_id,
            blocked_id,
            created_at: now,
        })?;

        if outcome.block.created {
            tracing::info!(blocker_id = %blocker_id, blocked_id = %blocked_id, "profile blocked");
        }
        if let Some(removed) = &outcome.removed_match {
            self.events.match_removed(removed, blocker_id, "blocked");
        }

        Ok(outcome)
    }

    /// `false` when there was no such block.
    pub fn unblock(&self, blocker_id: Uuid, blocked_id: Uuid) -> VenueResult<bool> {
        let removed = self.store.remove_block(blocker_id, blocked_id)?;
        if removed {
            tracing::info!(blocker_id = %blocker_id, blocked_id = %blocked_id, "profile unblocked");
        }
        Ok(removed)
    }

    pub fn list_matches(&self, profile_id: Uuid) -> VenueResult<Vec<Match>> {
        Ok(self.store.matches_for(profile_id)?)
    }

    pub fn list_incoming(&self, profile_id: Uuid) -> VenueResult<Vec<Interaction>> {
        Ok(self.store.pending_received(profile_id)?)
    }
}
