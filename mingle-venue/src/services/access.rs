use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{VenueError, VenueResult};
use crate::models::Profile;
use crate::store::Store;

/// How private profiles are treated in a viewer's feed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedPrivacy {
    /// Private profiles never appear.
    #[default]
    HideAll,
    /// Private profiles stay visible to viewers who already have an open
    /// interaction or a match with them.
    RevealKnown,
}

/// Block lists, privacy flags and suspensions.
#[derive(Clone)]
pub struct AccessControl {
    store: Arc<dyn Store>,
    privacy: FeedPrivacy,
}

impl AccessControl {
    pub fn new(store: Arc<dyn Store>, privacy: FeedPrivacy) -> Self {
        Self { store, privacy }
    }

    pub fn privacy(&self) -> FeedPrivacy {
        self.privacy
    }

    /// Fails with `InvalidTarget` for self-targeting and for pairs with a
    /// block in either direction.
    pub fn may_interact(&self, a: Uuid, b: Uuid) -> VenueResult<()> {
        if a == b || self.store.is_blocked_between(a, b)? {
            return Err(VenueError::InvalidTarget);
        }
        Ok(())
    }

    /// Everyone the viewer blocked or was blocked by.
    pub fn blocked_counterparts(&self, viewer_id: Uuid) -> VenueResult<HashSet<Uuid>> {
        Ok(self
            .store
            .blocks_involving(viewer_id)?
            .iter()
            .map(|block| block.counterpart(viewer_id))
            .collect())
    }

    /// Privacy, suspension and staff opt-in checks for one candidate.
    /// `known` tells whether the viewer already has an open interaction or a
    /// match with the candidate.
    pub fn admits(&self, candidate: &Profile, known: bool, now: DateTime<Utc>) -> bool {
        if candidate.is_private && !(self.privacy == FeedPrivacy::RevealKnown && known) {
            return false;
        }
        if candidate.is_suspended(now) {
            return false;
        }
        !candidate.is_staff || candidate.appear_in_feed
    }
}
