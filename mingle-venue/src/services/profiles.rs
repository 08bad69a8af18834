use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{VenueError, VenueResult};
use crate::models::{NewProfile, Profile};
use crate::store::{Store, Upserted};

/// Identity details recorded when a principal is first seen.
#[derive(Debug, Clone, Default)]
pub struct ProfileDetails {
    pub display_name: Option<String>,
    pub phone_number: Option<String>,
}

#[derive(Clone)]
pub struct ProfileService {
    store: Arc<dyn Store>,
}

impl ProfileService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// Insert-or-fetch for the authenticated principal. Details only apply
    /// to a new profile; `is_staff` follows the identity on every call.
    pub fn ensure_profile(&self, profile_id: Uuid, is_staff: bool, details: ProfileDetails) -> VenueResult<Upserted<Profile>> {
        let profile = self.store.ensure_profile(NewProfile {
            id: profile_id,
            display_name: details.display_name,
            phone_number: details.phone_number,
            is_staff,
        })?;
        if profile.created {
            tracing::info!(profile_id = %profile_id, is_staff, "profile created");
        }
        Ok(profile)
    }

    pub fn get(&self, profile_id: Uuid) -> VenueResult<Profile> {
        self.store
            .find_profile(profile_id)?
            .ok_or(VenueError::ProfileNotFound)
    }

    pub fn set_privacy(&self, profile_id: Uuid, is_private: bool, now: DateTime<Utc>) -> VenueResult<Profile> {
        self.store
            .set_privacy(profile_id, is_private, now)?
            .ok_or(VenueError::ProfileNotFound)
    }

    /// Staff opt in to being listed in venue feeds.
    pub fn set_feed_visibility(&self, profile_id: Uuid, appear_in_feed: bool, now: DateTime<Utc>) -> VenueResult<Profile> {
        let profile = self
            .store
            .set_feed_visibility(profile_id, appear_in_feed, now)?
            .ok_or(VenueError::ProfileNotFound)?;
        tracing::info!(profile_id = %profile_id, appear_in_feed, "feed visibility changed");
        Ok(profile)
    }

    /// `until = None` suspends until lifted.
    pub fn suspend(
        &self,
        profile_id: Uuid,
        until: Option<DateTime<Utc>>,
        reason: String,
        now: DateTime<Utc>,
    ) -> VenueResult<Profile> {
        let profile = self
            .store
            .set_suspension(profile_id, until, Some(reason), now)?
            .ok_or(VenueError::ProfileNotFound)?;
        tracing::warn!(profile_id = %profile_id, until = ?until, "profile suspended");
        Ok(profile)
    }

    pub fn lift_suspension(&self, profile_id: Uuid, now: DateTime<Utc>) -> VenueResult<Profile> {
        let profile = self
            .store
            .set_suspension(profile_id, None, None, now)?
            .ok_or(VenueError::ProfileNotFound)?;
        tracing::info!(profile_id = %profile_id, "suspension lifted");
        Ok(profile)
    }
}
