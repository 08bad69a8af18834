use serde::Serialize;
use uuid::Uuid;

use mingle_shared::clients::rabbitmq::RabbitMQClient;
use mingle_shared::types::event::{payloads, routing_keys, Event};

use crate::models::{Attendance, Interaction, InteractionStatus, Match, SessionMetadata};
use crate::store::ExpiryReport;

const SOURCE: &str = "mingle-venue";

/// Fire-and-forget domain event publishing. Failures are logged and never
/// reach the caller. Without a broker every event is dropped.
#[derive(Clone, Default)]
pub struct EventPublisher {
    rabbitmq: Option<RabbitMQClient>,
}

impl EventPublisher {
    pub fn new(rabbitmq: RabbitMQClient) -> Self {
        Self { rabbitmq: Some(rabbitmq) }
    }

    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_connected(&self) -> Option<bool> {
        self.rabbitmq.as_ref().map(RabbitMQClient::is_connected)
    }

    fn emit<T>(&self, routing_key: &'static str, event: Event<T>)
    where
        T: Serialize + Send + Sync + 'static,
    {
        let Some(client) = self.rabbitmq.clone() else {
            tracing::debug!(routing_key, "no broker configured, event dropped");
            return;
        };
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            tracing::warn!(routing_key, "no async runtime, event dropped");
            return;
        };

        runtime.spawn(async move {
            if let Err(e) = client.publish(routing_key, &event).await {
                tracing::error!(error = %e, routing_key, "failed to publish event");
            }
        });
    }

    pub fn session_started(&self, session: &SessionMetadata, started_by: Uuid) {
        let event = Event::new(
            SOURCE,
            routing_keys::VENUE_SESSION_STARTED,
            payloads::SessionStarted {
                session_id: session.id,
                venue_id: session.venue_id,
                start_time: session.start_time,
                end_time: session.end_time,
            },
        )
        .with_user(started_by);

        self.emit(routing_keys::VENUE_SESSION_STARTED, event);
    }

    pub fn session_expired(&self, report: &ExpiryReport) {
        let event = Event::new(
            SOURCE,
            routing_keys::VENUE_SESSION_EXPIRED,
            payloads::SessionExpired {
                session_id: report.session.id,
                venue_id: report.session.venue_id,
                ended_at: report.session.effective_end(),
                attendances_closed: report.attendances_closed,
                profiles_deactivated: report.profiles_deactivated,
            },
        );

        self.emit(routing_keys::VENUE_SESSION_EXPIRED, event);
    }

    pub fn attendance_entered(&self, attendance: &Attendance) {
        let event = Event::new(
            SOURCE,
            routing_keys::VENUE_ATTENDANCE_ENTERED,
            payloads::AttendanceEntered {
                attendance_id: attendance.id,
                venue_id: attendance.venue_id,
                profile_id: attendance.profile_id,
            },
        )
        .with_user(attendance.profile_id);

        self.emit(routing_keys::VENUE_ATTENDANCE_ENTERED, event);
    }

    pub fn interaction_sent(&self, interaction: &Interaction) {
        let event = Event::new(
            SOURCE,
            routing_keys::VENUE_INTERACTION_SENT,
            payloads::InteractionSent {
                interaction_id: interaction.id,
                sender_id: interaction.sender_id,
                receiver_id: interaction.receiver_id,
                kind: interaction.kind.clone(),
            },
        )
        .with_user(interaction.sender_id)
        .with_correlation(interaction.attendance_id);

        self.emit(routing_keys::VENUE_INTERACTION_SENT, event);
    }

    pub fn interaction_responded(&self, interaction: &Interaction) {
        let event = Event::new(
            SOURCE,
            routing_keys::VENUE_INTERACTION_RESPONDED,
            payloads::InteractionResponded {
                interaction_id: interaction.id,
                sender_id: interaction.sender_id,
                receiver_id: interaction.receiver_id,
                accepted: interaction.has_status(InteractionStatus::Accepted),
            },
        )
        .with_user(interaction.receiver_id)
        .with_correlation(interaction.id);

        self.emit(routing_keys::VENUE_INTERACTION_RESPONDED, event);
    }

    pub fn match_created(&self, matched: &Match) {
        let event = Event::new(
            SOURCE,
            routing_keys::VENUE_MATCH_CREATED,
            payloads::MatchCreated {
                match_id: matched.id,
                interaction_id: matched.interaction_id,
                profile_a: matched.profile_a,
                profile_b: matched.profile_b,
                contact_link: matched.contact_link.clone(),
            },
        )
        .with_correlation(matched.interaction_id);

        self.emit(routing_keys::VENUE_MATCH_CREATED, event);
    }

    pub fn match_removed(&self, matched: &Match, removed_by: Uuid, reason: &str) {
        let event = Event::new(
            SOURCE,
            routing_keys::VENUE_MATCH_REMOVED,
            payloads::MatchRemoved {
                match_id: matched.id,
                profile_a: matched.profile_a,
                profile_b: matched.profile_b,
                reason: reason.to_string(),
            },
        )
        .with_user(removed_by);

        self.emit(routing_keys::VENUE_MATCH_REMOVED, event);
    }
}
