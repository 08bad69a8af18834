pub mod access;
pub mod feed;
pub mod matcher;
pub mod profiles;
pub mod session_lifecycle;

use std::sync::Arc;

use crate::contact::ContactLinkBuilder;
use crate::events::EventPublisher;
use crate::store::Store;

pub use access::{AccessControl, FeedPrivacy};
pub use feed::{FeedBuilder, ProfileSummary};
pub use matcher::{Decision, Matcher, RespondOutcome};
pub use profiles::{ProfileDetails, ProfileService};
pub use session_lifecycle::{is_expired, SessionLifecycle};

/// The venue core wired over one store.
#[derive(Clone)]
pub struct Services {
    pub sessions: SessionLifecycle,
    pub access: AccessControl,
    pub feed: FeedBuilder,
    pub matcher: Matcher,
    pub profiles: ProfileService,
}

impl Services {
    pub fn new(
        store: Arc<dyn Store>,
        events: EventPublisher,
        links: Arc<dyn ContactLinkBuilder>,
        privacy: FeedPrivacy,
        contact_message: &str,
    ) -> Self {
        let access = AccessControl::new(store.clone(), privacy);
        Self {
            sessions: SessionLifecycle::new(store.clone(), events.clone()),
            feed: FeedBuilder::new(store.clone(), access.clone()),
            matcher: Matcher::new(store.clone(), access.clone(), links, contact_message, events),
            profiles: ProfileService::new(store),
            access,
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use chrono::{DateTime, Utc};
    use std::ops::Deref;
    use std::sync::Arc;
    use uuid::Uuid;

    use super::*;
    use crate::contact::ChatLinkBuilder;
    use crate::models::{InteractionKind, Match};
    use crate::store::MemoryStore;

    /// Services over a fresh in-memory store, with one staff profile.
    pub struct Fixture {
        pub store: Arc<MemoryStore>,
        pub services: Services,
        pub now: DateTime<Utc>,
        pub staff: Uuid,
    }

    impl Deref for Fixture {
        type Target = Services;

        fn deref(&self) -> &Services {
            &self.services
        }
    }

    impl Fixture {
        pub fn new() -> Self {
            Self::with_privacy(FeedPrivacy::HideAll)
        }

        pub fn with_privacy(privacy: FeedPrivacy) -> Self {
            let store = Arc::new(MemoryStore::new());
            let links = Arc::new(ChatLinkBuilder::new("https://wa.me").unwrap());
            let services = Services::new(
                store.clone(),
                EventPublisher::disabled(),
                links,
                privacy,
                "We matched at the venue!",
            );
            let staff = Uuid::new_v4();
            services
                .profiles
                .ensure_profile(staff, true, ProfileDetails::default())
                .unwrap();

            Self {
                store,
                services,
                now: Utc::now(),
                staff,
            }
        }

        pub fn venue(&self) -> Uuid {
            self.sessions.create_venue("The Lantern").unwrap().id
        }

        pub fn venue_with_session(&self, hours: i32) -> Uuid {
            let venue = self.venue();
            self.sessions.start_session(venue, hours, self.staff, self.now).unwrap();
            venue
        }

        pub fn guest(&self) -> Uuid {
            let id = Uuid::new_v4();
            self.profiles
                .ensure_profile(id, false, ProfileDetails::default())
                .unwrap();
            id
        }

        pub fn guest_with_phone(&self, phone: &str) -> Uuid {
            let id = Uuid::new_v4();
            let details = ProfileDetails {
                display_name: None,
                phone_number: Some(phone.to_string()),
            };
            self.profiles.ensure_profile(id, false, details).unwrap();
            id
        }

        /// Both sides like each other and both accept.
        pub fn mutual_match(&self, a: Uuid, b: Uuid, a_att: Uuid, b_att: Uuid) -> Match {
            let ab = self.matcher.send(a, b, InteractionKind::Like, a_att, self.now).unwrap().row;
            let ba = self.matcher.send(b, a, InteractionKind::Like, b_att, self.now).unwrap().row;
            self.matcher.respond(a, ba.id, Decision::Accept, self.now).unwrap();
            self.matcher
                .respond(b, ab.id, Decision::Accept, self.now)
                .unwrap()
                .matched
                .unwrap()
        }
    }
}
