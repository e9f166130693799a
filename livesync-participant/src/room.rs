//! Room-level registry of remote participants
//!
//! Routes signaling snapshots and transport arrivals to the right
//! `RemoteParticipant`, creating participants on first contact.

use crate::config::SubscriptionConfig;
use crate::participant::{RemoteParticipant, SubscribeOutcome};
use crate::proto::{ParticipantInfo, ParticipantState};
use crate::publication::PublicationInfo;
use crate::retry::RetrySource;
use crate::track::{DataChannel, MediaStreamTrack};
use crate::types::{ParticipantSid, TrackSid};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::time::Instant;
use tracing::{debug, info};

type ParticipantListener = Arc<dyn Fn(&RemoteParticipant) + Send + Sync>;

struct RoomInner {
    participants: DashMap<ParticipantSid, RemoteParticipant>,
    config: SubscriptionConfig,
    retry_wakeup: Arc<Notify>,
    on_participant: RwLock<Vec<ParticipantListener>>,
}

/// Remote participants of one session. Cloning shares the registry.
#[derive(Clone)]
pub struct Room {
    inner: Arc<RoomInner>,
}

impl Room {
    #[must_use]
    pub fn new(config: SubscriptionConfig) -> Self {
        Self {
            inner: Arc::new(RoomInner {
                participants: DashMap::new(),
                config,
                retry_wakeup: Arc::new(Notify::new()),
                on_participant: RwLock::new(Vec::new()),
            }),
        }
    }

    /// Called with every participant the room creates, before any of its
    /// tracks are reconciled. Use it to attach event listeners.
    pub fn on_participant_created(&self, listener: impl Fn(&RemoteParticipant) + Send + Sync + 'static) {
        self.inner.on_participant.write().push(Arc::new(listener));
    }

    #[must_use]
    pub fn participant(&self, sid: &ParticipantSid) -> Option<RemoteParticipant> {
        self.inner.participants.get(sid).map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn participants(&self) -> Vec<RemoteParticipant> {
        self.inner
            .participants
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    #[must_use]
    pub fn participant_count(&self) -> usize {
        self.inner.participants.len()
    }

    pub fn get_or_create_participant(
        &self,
        sid: &ParticipantSid,
        identity: &str,
    ) -> RemoteParticipant {
        if let Some(existing) = self.participant(sid) {
            return existing;
        }

        let mut created = false;
        let participant = self
            .inner
            .participants
            .entry(sid.clone())
            .or_insert_with(|| {
                created = true;
                RemoteParticipant::with_retry_wakeup(
                    sid.clone(),
                    identity,
                    self.inner.config.clone(),
                    Arc::clone(&self.inner.retry_wakeup),
                )
            })
            .value()
            .clone();

        if created {
            info!(
                participant_sid = %sid,
                participant_count = self.inner.participants.len(),
                "Remote participant created"
            );
            let listeners = self.inner.on_participant.read().clone();
            for listener in listeners {
                listener(&participant);
            }
        }
        participant
    }

    /// Apply signaling snapshots. Disconnected participants are removed and
    /// their tracks unpublished.
    pub fn handle_participant_updates(&self, updates: Vec<ParticipantInfo>) {
        for update in updates {
            if update.state == ParticipantState::Disconnected {
                self.remove_participant(&update.sid);
                continue;
            }
            let participant = self.get_or_create_participant(&update.sid, &update.identity);
            participant.update_info(update);
        }
    }

    /// Remove a participant, unpublishing its tracks and dropping any
    /// arrivals still waiting for correlation
    pub fn remove_participant(&self, sid: &ParticipantSid) -> Option<RemoteParticipant> {
        let Some((_, participant)) = self.inner.participants.remove(sid) else {
            debug!(participant_sid = %sid, "Participant not found when removing");
            return None;
        };

        let cancelled = participant.cancel_all_retries();
        participant.unpublish_all(true);
        info!(
            participant_sid = %sid,
            cancelled_retries = cancelled,
            "Remote participant disconnected"
        );
        Some(participant)
    }

    /// Route a media track arrival. The participant is created if this is
    /// the first we hear of it.
    pub fn handle_media_track(
        &self,
        participant_sid: &ParticipantSid,
        track: Arc<dyn MediaStreamTrack>,
        track_sid: TrackSid,
    ) -> SubscribeOutcome {
        self.get_or_create_participant(participant_sid, "")
            .add_subscribed_media_track(track, track_sid)
    }

    pub fn handle_data_channel(
        &self,
        participant_sid: &ParticipantSid,
        channel: Arc<dyn DataChannel>,
        track_sid: TrackSid,
        name: &str,
    ) -> Option<PublicationInfo> {
        self.get_or_create_participant(participant_sid, "")
            .add_subscribed_data_track(channel, track_sid, name)
    }
}

impl RetrySource for Room {
    fn next_retry_deadline(&self) -> Option<Instant> {
        self.participants()
            .iter()
            .filter_map(RemoteParticipant::next_retry_deadline)
            .min()
    }

    fn process_due_retries(&self, now: Instant) -> usize {
        // Collected first: listeners may touch the registry while retries run
        self.participants()
            .iter()
            .map(|participant| participant.process_due_retries(now))
            .sum()
    }

    fn retry_wakeup(&self) -> Arc<Notify> {
        Arc::clone(&self.inner.retry_wakeup)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::TrackInfo;
    use crate::test_helpers::{EventLog, FakeMediaTrack};
    use crate::track::{MediaKind, TrackKind};
    use std::time::Duration;

    fn alice() -> ParticipantInfo {
        ParticipantInfo::new("PA_alice", "alice").with_track(TrackInfo::new("TR_mic", TrackKind::Audio, "mic"))
    }

    #[test]
    fn test_snapshot_creates_participant_once() {
        let room = Room::new(SubscriptionConfig::default());
        let created = Arc::new(parking_lot::Mutex::new(0));
        let counter = Arc::clone(&created);
        room.on_participant_created(move |_| *counter.lock() += 1);

        room.handle_participant_updates(vec![alice()]);
        room.handle_participant_updates(vec![alice()]);

        assert_eq!(*created.lock(), 1);
        let participant = room.participant(&ParticipantSid::from("PA_alice")).unwrap();
        assert_eq!(participant.identity(), "alice");
        assert_eq!(participant.tracks().len(), 1);
    }

    #[test]
    fn test_media_before_snapshot_creates_participant() {
        let room = Room::new(SubscriptionConfig::default());
        let sid = ParticipantSid::from("PA_alice");

        let outcome = room.handle_media_track(
            &sid,
            FakeMediaTrack::new("TR_mic", MediaKind::Audio),
            TrackSid::from("TR_mic"),
        );
        assert!(matches!(outcome, SubscribeOutcome::Pending(_)));
        let participant = room.participant(&sid).unwrap();
        assert!(!participant.has_metadata());
        let log = EventLog::attach(&participant);

        // First snapshot for a participant created by media is still silent
        room.handle_participant_updates(vec![alice()]);
        assert!(log.take().is_empty());

        let processed = room.process_due_retries(Instant::now() + Duration::from_secs(1));
        assert_eq!(processed, 1);
        assert_eq!(log.take_names(), vec!["trackSubscribed"]);
    }

    #[test]
    fn test_disconnect_unpublishes_tracks() {
        let room = Room::new(SubscriptionConfig::default());
        let log = Arc::new(parking_lot::Mutex::new(None));
        let slot = Arc::clone(&log);
        room.on_participant_created(move |participant| *slot.lock() = Some(EventLog::attach(participant)));

        room.handle_participant_updates(vec![alice()]);
        room.handle_participant_updates(vec![alice().with_state(ParticipantState::Disconnected)]);

        assert_eq!(room.participant_count(), 0);
        let events = log.lock().take().unwrap();
        assert_eq!(events.take_names(), vec!["trackUnpublished"]);
        assert!(room.remove_participant(&ParticipantSid::from("PA_alice")).is_none());
    }
}
