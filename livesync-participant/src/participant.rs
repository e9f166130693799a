//! Remote participant record and track reconciliation
//!
//! Two independent sources describe a remote participant's tracks:
//! - metadata snapshots from signaling, authoritative for which tracks exist
//! - media arrivals from the transport, authoritative for which are live
//!
//! They arrive in any order. `RemoteParticipant` merges both into one
//! publication set and emits lifecycle events as records are created,
//! attached, detached and removed.
//!
//! ## Publication lifecycle
//!
//! ```text
//! Announced --(media matched)--> Live --(stream ended)--> Announced
//!     |                           |
//!     +------(dropped from snapshot)------> Removed
//! ```
//!
//! `Removed` is terminal: signals from handles that belonged to a removed
//! record are ignored.

use crate::config::SubscriptionConfig;
use crate::error::{Error, Result};
use crate::events::{EventEmitter, ListenerId, ParticipantEvent};
use crate::proto::{ParticipantInfo, TrackInfo};
use crate::publication::{PublicationInfo, PublicationSignal, TrackPublication};
use crate::retry::{PendingSubscription, RetryHandle, RetrySource};
use crate::track::{DataChannel, MediaStreamTrack, RemoteTrack, TrackHandle, TrackKind};
use crate::types::{ParticipantSid, TrackSid};
use bytes::Bytes;
use indexmap::{IndexMap, IndexSet};
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::sync::{Arc, Weak};
use tokio::sync::{mpsc, Notify};
use tokio::time::Instant;
use tracing::{debug, error, trace, warn};

/// Result of handing a media track to the participant
#[derive(Debug)]
pub enum SubscribeOutcome {
    /// Matched and attached immediately
    Subscribed(PublicationInfo),
    /// No publication yet, parked for retry
    Pending(RetryHandle),
    /// No publication and no retry budget
    Failed,
}

struct ParticipantRecord {
    sid: ParticipantSid,
    identity: String,
    metadata: Value,
    audio_level: f32,
    /// Last snapshot applied. `None` until signaling has described us.
    info: Option<ParticipantInfo>,

    /// All publications, in insertion order
    tracks: IndexMap<TrackSid, TrackPublication>,
    audio_tracks: IndexSet<TrackSid>,
    video_tracks: IndexSet<TrackSid>,
    data_tracks: IndexSet<TrackSid>,

    /// Media arrivals waiting for their publication, ordered by arrival
    pending: Vec<PendingSubscription>,
    next_generation: u64,
    next_retry_id: u64,
}

impl ParticipantRecord {
    fn new(sid: ParticipantSid, identity: String) -> Self {
        Self {
            sid,
            identity,
            metadata: Value::Object(Map::new()),
            audio_level: 0.0,
            info: None,
            tracks: IndexMap::new(),
            audio_tracks: IndexSet::new(),
            video_tracks: IndexSet::new(),
            data_tracks: IndexSet::new(),
            pending: Vec::new(),
            next_generation: 0,
            next_retry_id: 0,
        }
    }

    const fn has_metadata(&self) -> bool {
        self.info.is_some()
    }

    fn partition(&self, kind: TrackKind) -> &IndexSet<TrackSid> {
        match kind {
            TrackKind::Audio => &self.audio_tracks,
            TrackKind::Video => &self.video_tracks,
            TrackKind::Data => &self.data_tracks,
        }
    }

    fn partition_mut(&mut self, kind: TrackKind) -> &mut IndexSet<TrackSid> {
        match kind {
            TrackKind::Audio => &mut self.audio_tracks,
            TrackKind::Video => &mut self.video_tracks,
            TrackKind::Data => &mut self.data_tracks,
        }
    }

    fn insert(&mut self, publication: TrackPublication) {
        let sid = publication.sid().clone();
        self.partition_mut(publication.kind()).insert(sid.clone());
        self.tracks.insert(sid, publication);
    }

    fn remove(&mut self, sid: &TrackSid) -> Option<TrackPublication> {
        let publication = self.tracks.shift_remove(sid)?;
        self.partition_mut(publication.kind()).shift_remove(sid);
        Some(publication)
    }

    fn partition_infos(&self, kind: TrackKind) -> Vec<PublicationInfo> {
        self.partition(kind)
            .iter()
            .filter_map(|sid| self.tracks.get(sid))
            .map(TrackPublication::info)
            .collect()
    }

    /// First publication of `kind` with nothing attached
    fn find_unattached(&self, kind: TrackKind) -> Option<TrackSid> {
        self.tracks
            .values()
            .find(|publication| publication.kind() == kind && publication.track().is_none())
            .map(|publication| publication.sid().clone())
    }

    fn allocate_generation(&mut self) -> u64 {
        self.next_generation += 1;
        self.next_generation
    }

    fn set_metadata(&mut self, raw: &str) {
        if raw.is_empty() {
            self.metadata = Value::Object(Map::new());
            return;
        }
        match decode_metadata(raw) {
            Ok(metadata) => self.metadata = metadata,
            Err(err) => {
                // Keep the previous value, a corrupt update must not erase it
                error!(
                    participant_sid = %self.sid,
                    error = %err,
                    "Could not decode participant metadata"
                );
            }
        }
    }
}

fn decode_metadata(raw: &str) -> Result<Value> {
    Ok(serde_json::from_str(raw)?)
}

/// Work that must run after the state lock is released, since transports
/// may call back into the participant synchronously.
#[derive(Default)]
struct Deferred {
    stop: Vec<RemoteTrack>,
    watch_media: Vec<(Arc<dyn MediaStreamTrack>, TrackSid, u64)>,
    watch_data: Vec<(Arc<dyn DataChannel>, TrackSid, u64)>,
}

struct Inner {
    state: Mutex<ParticipantRecord>,
    emitter: Arc<EventEmitter>,
    config: SubscriptionConfig,
    retry_wakeup: Arc<Notify>,
}

/// A participant on the far side of the session.
///
/// Cloning is cheap and yields another handle to the same participant.
#[derive(Clone)]
pub struct RemoteParticipant {
    inner: Arc<Inner>,
}

#[derive(Clone)]
pub(crate) struct WeakParticipant(Weak<Inner>);

impl WeakParticipant {
    pub(crate) fn upgrade(&self) -> Option<RemoteParticipant> {
        self.0.upgrade().map(|inner| RemoteParticipant { inner })
    }
}

impl RemoteParticipant {
    pub fn new(
        sid: impl Into<ParticipantSid>,
        identity: impl Into<String>,
        config: SubscriptionConfig,
    ) -> Self {
        Self::with_retry_wakeup(sid, identity, config, Arc::new(Notify::new()))
    }

    /// Create a participant whose parked retries signal a shared `Notify`
    pub(crate) fn with_retry_wakeup(
        sid: impl Into<ParticipantSid>,
        identity: impl Into<String>,
        config: SubscriptionConfig,
        retry_wakeup: Arc<Notify>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(ParticipantRecord::new(sid.into(), identity.into())),
                emitter: Arc::new(EventEmitter::new()),
                config,
                retry_wakeup,
            }),
        }
    }

    /// Create a participant from its first snapshot. Tracks it lists are
    /// seeded without `TrackPublished` events.
    pub fn from_info(info: ParticipantInfo, config: SubscriptionConfig) -> Self {
        let participant = Self::new(info.sid.clone(), info.identity.clone(), config);
        participant.update_info(info);
        participant
    }

    pub(crate) fn downgrade(&self) -> WeakParticipant {
        WeakParticipant(Arc::downgrade(&self.inner))
    }

    #[must_use]
    pub fn sid(&self) -> ParticipantSid {
        self.inner.state.lock().sid.clone()
    }

    #[must_use]
    pub fn identity(&self) -> String {
        self.inner.state.lock().identity.clone()
    }

    #[must_use]
    pub fn metadata(&self) -> Value {
        self.inner.state.lock().metadata.clone()
    }

    /// Whether at least one snapshot has been applied
    #[must_use]
    pub fn has_metadata(&self) -> bool {
        self.inner.state.lock().has_metadata()
    }

    /// The last snapshot applied
    #[must_use]
    pub fn info(&self) -> Option<ParticipantInfo> {
        self.inner.state.lock().info.clone()
    }

    /// Audio level between 0 and 1, 1 being loudest
    #[must_use]
    pub fn audio_level(&self) -> f32 {
        self.inner.state.lock().audio_level
    }

    pub fn set_audio_level(&self, level: f32) {
        self.inner.state.lock().audio_level = level.clamp(0.0, 1.0);
    }

    #[must_use]
    pub fn config(&self) -> &SubscriptionConfig {
        &self.inner.config
    }

    /// All publications in the order they were first seen
    #[must_use]
    pub fn tracks(&self) -> Vec<PublicationInfo> {
        self.inner
            .state
            .lock()
            .tracks
            .values()
            .map(TrackPublication::info)
            .collect()
    }

    #[must_use]
    pub fn audio_tracks(&self) -> Vec<PublicationInfo> {
        self.inner.state.lock().partition_infos(TrackKind::Audio)
    }

    #[must_use]
    pub fn video_tracks(&self) -> Vec<PublicationInfo> {
        self.inner.state.lock().partition_infos(TrackKind::Video)
    }

    #[must_use]
    pub fn data_tracks(&self) -> Vec<PublicationInfo> {
        self.inner.state.lock().partition_infos(TrackKind::Data)
    }

    #[must_use]
    pub fn get_track_publication(&self, sid: &TrackSid) -> Option<PublicationInfo> {
        self.inner.state.lock().tracks.get(sid).map(TrackPublication::info)
    }

    /// Borrow the live track attached to `sid`.
    ///
    /// The participant is locked while `f` runs; it must not call back into
    /// this participant.
    pub fn with_track<R>(&self, sid: &TrackSid, f: impl FnOnce(&RemoteTrack) -> R) -> Option<R> {
        let state = self.inner.state.lock();
        state.tracks.get(sid).and_then(TrackPublication::track).map(f)
    }

    pub fn on(&self, listener: impl Fn(&ParticipantEvent) + Send + Sync + 'static) -> ListenerId {
        self.inner.emitter.on(listener)
    }

    pub fn off(&self, id: ListenerId) -> bool {
        self.inner.emitter.off(id)
    }

    /// Receive events through a channel instead of a callback
    pub fn events(&self) -> mpsc::UnboundedReceiver<ParticipantEvent> {
        self.inner.emitter.channel()
    }

    /// Replace metadata from its raw JSON form. Empty input resets it to an
    /// empty object; undecodable input is logged and ignored.
    pub fn set_metadata(&self, raw: &str) {
        self.inner.state.lock().set_metadata(raw);
    }

    /// Reconcile against an authoritative snapshot.
    ///
    /// The first snapshot seeds state silently since its tracks were already
    /// published when we joined. Later snapshots emit `TrackPublished` for new
    /// sids. Records missing from any snapshot are unpublished.
    pub fn update_info(&self, info: ParticipantInfo) {
        let mut deferred = Deferred::default();
        {
            let mut state = self.inner.state.lock();
            let already_had_metadata = state.has_metadata();

            state.identity.clone_from(&info.identity);
            state.sid = info.sid.clone();
            state.set_metadata(&info.metadata);

            let mut valid: HashSet<TrackSid> = HashSet::with_capacity(info.tracks.len());
            let mut created = Vec::new();
            for track_info in &info.tracks {
                if let Some(publication) = state.tracks.get_mut(&track_info.sid) {
                    publication.update_info(track_info);
                } else {
                    self.add_publication(&mut state, TrackPublication::from_info(track_info));
                    created.push(track_info.sid.clone());
                }
                valid.insert(track_info.sid.clone());
            }

            if already_had_metadata {
                for sid in &created {
                    if let Some(publication) = state.tracks.get(sid) {
                        self.inner
                            .emitter
                            .queue(ParticipantEvent::TrackPublished(publication.info()));
                    }
                }
            }

            let removed: Vec<TrackSid> = state
                .tracks
                .keys()
                .filter(|sid| !valid.contains(*sid))
                .cloned()
                .collect();
            for sid in &removed {
                self.unpublish_locked(&mut state, sid, true, &mut deferred);
            }

            debug!(
                participant_sid = %state.sid,
                created = created.len(),
                removed = removed.len(),
                seeded = !already_had_metadata,
                "Reconciled participant info"
            );
            state.info = Some(info);
        }
        self.finish(deferred);
    }

    /// Correlate a newly arrived media track with its publication.
    ///
    /// `sid` is the id the transport claims for the track. When no publication
    /// carries it and it does not look server issued, the first unattached
    /// publication of the same kind is used instead. With several unmatched
    /// tracks of one kind this guess follows arrival order and can pair them
    /// wrongly; the transport gives us nothing better to go on.
    ///
    /// If nothing matches yet the arrival is parked and retried until the
    /// budget runs out, then `TrackSubscriptionFailed` is emitted.
    pub fn add_subscribed_media_track(
        &self,
        track: Arc<dyn MediaStreamTrack>,
        sid: TrackSid,
    ) -> SubscribeOutcome {
        let mut deferred = Deferred::default();
        let outcome = {
            let mut state = self.inner.state.lock();
            match self.attach_media(&mut state, &track, &sid, &mut deferred) {
                Ok(info) => SubscribeOutcome::Subscribed(info),
                Err(err) if self.inner.config.retry_budget == 0 => {
                    self.fail_subscription(&state.sid, &sid, &err);
                    SubscribeOutcome::Failed
                }
                Err(err) => {
                    debug!(
                        participant_sid = %state.sid,
                        track_sid = %sid,
                        error = %err,
                        "Publication not available yet, retrying"
                    );
                    let id = state.next_retry_id;
                    state.next_retry_id += 1;
                    state.pending.push(PendingSubscription {
                        id,
                        track,
                        claimed_sid: sid.clone(),
                        retries_left: self.inner.config.retry_budget,
                        due_at: Instant::now() + self.inner.config.retry_interval(),
                    });
                    SubscribeOutcome::Pending(RetryHandle::new(id, sid, self.downgrade()))
                }
            }
        };

        if matches!(outcome, SubscribeOutcome::Pending(_)) {
            self.inner.retry_wakeup.notify_one();
        }
        self.finish(deferred);
        outcome
    }

    /// Attach a data channel, creating its publication if signaling has not
    /// announced it. Returns `None` if `sid` names a non-data publication.
    pub fn add_subscribed_data_track(
        &self,
        channel: Arc<dyn DataChannel>,
        sid: TrackSid,
        name: impl Into<String>,
    ) -> Option<PublicationInfo> {
        let mut deferred = Deferred::default();
        let result = {
            let mut state = self.inner.state.lock();
            let result = self.attach_data(&mut state, channel, &sid, name.into(), &mut deferred);
            if let Err(err) = &result {
                self.fail_subscription(&state.sid, &sid, err);
            }
            result
        };
        self.finish(deferred);
        result.ok()
    }

    /// Remove a publication, releasing any attached track
    pub fn unpublish_track(&self, sid: &TrackSid, send_unpublish: bool) {
        let mut deferred = Deferred::default();
        {
            let mut state = self.inner.state.lock();
            self.unpublish_locked(&mut state, sid, send_unpublish, &mut deferred);
        }
        self.finish(deferred);
    }

    pub fn unpublish_all(&self, send_unpublish: bool) {
        let mut deferred = Deferred::default();
        {
            let mut state = self.inner.state.lock();
            let sids: Vec<TrackSid> = state.tracks.keys().cloned().collect();
            for sid in &sids {
                self.unpublish_locked(&mut state, sid, send_unpublish, &mut deferred);
            }
        }
        self.finish(deferred);
    }

    /// Earliest deadline among parked media arrivals
    #[must_use]
    pub fn next_retry_deadline(&self) -> Option<Instant> {
        self.inner
            .state
            .lock()
            .pending
            .iter()
            .map(|pending| pending.due_at)
            .min()
    }

    #[must_use]
    pub fn pending_retry_count(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Run one correlation attempt for every parked arrival due at `now`
    pub fn process_due_retries(&self, now: Instant) -> usize {
        let mut deferred = Deferred::default();
        let processed = {
            let mut state = self.inner.state.lock();
            let (due, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut state.pending)
                .into_iter()
                .partition(|pending| pending.due_at <= now);
            state.pending = waiting;

            let processed = due.len();
            for mut pending in due {
                pending.retries_left = pending.retries_left.saturating_sub(1);
                match self.attach_media(&mut state, &pending.track, &pending.claimed_sid, &mut deferred) {
                    Ok(info) => {
                        debug!(
                            participant_sid = %state.sid,
                            track_sid = %info.sid,
                            retries_left = pending.retries_left,
                            "Matched media track on retry"
                        );
                    }
                    Err(err) if pending.retries_left == 0 => {
                        self.fail_subscription(&state.sid, &pending.claimed_sid, &err);
                    }
                    Err(_) => {
                        pending.due_at = now + self.inner.config.retry_interval();
                        state.pending.push(pending);
                    }
                }
            }
            state.pending.sort_by_key(|pending| pending.id);
            processed
        };
        self.finish(deferred);
        processed
    }

    /// Drop every parked arrival without emitting failures
    pub fn cancel_all_retries(&self) -> usize {
        let mut state = self.inner.state.lock();
        let cancelled = state.pending.len();
        state.pending.clear();
        cancelled
    }

    pub(crate) fn is_retry_pending(&self, id: u64) -> bool {
        self.inner
            .state
            .lock()
            .pending
            .iter()
            .any(|pending| pending.id == id)
    }

    pub(crate) fn cancel_retry(&self, id: u64) -> bool {
        let mut state = self.inner.state.lock();
        let before = state.pending.len();
        state.pending.retain(|pending| pending.id != id);
        state.pending.len() != before
    }

    /// Insert a publication and forward its mute signals as participant events
    fn add_publication(&self, state: &mut ParticipantRecord, mut publication: TrackPublication) {
        let emitter = Arc::clone(&self.inner.emitter);
        publication.on_signal(move |signal, info| {
            let event = match signal {
                PublicationSignal::Muted => ParticipantEvent::TrackMuted(info.clone()),
                PublicationSignal::Unmuted => ParticipantEvent::TrackUnmuted(info.clone()),
            };
            emitter.queue(event);
        });
        state.insert(publication);
    }

    fn unpublish_locked(
        &self,
        state: &mut ParticipantRecord,
        sid: &TrackSid,
        send_unpublish: bool,
        deferred: &mut Deferred,
    ) {
        let Some(mut publication) = state.remove(sid) else {
            return;
        };
        publication.clear_listeners();

        // Always paired with an unsubscribe, listeners may rely on it
        if let Some(track) = publication.detach() {
            deferred.stop.push(track);
            self.inner
                .emitter
                .queue(ParticipantEvent::TrackUnsubscribed(publication.info()));
        }
        if send_unpublish {
            self.inner
                .emitter
                .queue(ParticipantEvent::TrackUnpublished(publication.info()));
        }
        debug!(participant_sid = %state.sid, track_sid = %sid, "Unpublished track");
    }

    fn attach_media(
        &self,
        state: &mut ParticipantRecord,
        track: &Arc<dyn MediaStreamTrack>,
        claimed_sid: &TrackSid,
        deferred: &mut Deferred,
    ) -> Result<PublicationInfo> {
        let kind = TrackKind::from(track.kind());
        let sid = match state.tracks.get(claimed_sid) {
            Some(publication) if publication.kind() != kind => {
                return Err(Error::KindMismatch {
                    sid: claimed_sid.clone(),
                    expected: publication.kind(),
                    actual: kind,
                });
            }
            Some(_) => claimed_sid.clone(),
            None if !claimed_sid.has_server_prefix(&self.inner.config.server_track_sid_prefix) => {
                let sid = state
                    .find_unattached(kind)
                    .ok_or_else(|| Error::TrackNotFound(claimed_sid.clone()))?;
                warn!(
                    participant_sid = %state.sid,
                    claimed_sid = %claimed_sid,
                    transport_id = %track.id(),
                    track_sid = %sid,
                    "Transport did not keep the server track id, matched by kind"
                );
                sid
            }
            None => return Err(Error::TrackNotFound(claimed_sid.clone())),
        };

        let generation = state.allocate_generation();
        let remote = RemoteTrack::new(
            sid.clone(),
            String::new(),
            TrackHandle::Media(Arc::clone(track)),
            generation,
        );
        let publication = state
            .tracks
            .get_mut(&sid)
            .ok_or_else(|| Error::TrackNotFound(sid.clone()))?;
        let previous = publication.info();
        if let Some(replaced) = publication.attach(remote)? {
            deferred.stop.push(replaced);
            self.inner
                .emitter
                .queue(ParticipantEvent::TrackUnsubscribed(previous));
        }

        let info = publication.info();
        deferred.watch_media.push((Arc::clone(track), sid, generation));
        self.inner
            .emitter
            .queue(ParticipantEvent::TrackSubscribed(info.clone()));
        Ok(info)
    }

    fn attach_data(
        &self,
        state: &mut ParticipantRecord,
        channel: Arc<dyn DataChannel>,
        sid: &TrackSid,
        name: String,
        deferred: &mut Deferred,
    ) -> Result<PublicationInfo> {
        let generation = state.allocate_generation();
        let remote = RemoteTrack::new(
            sid.clone(),
            name.clone(),
            TrackHandle::Data(Arc::clone(&channel)),
            generation,
        );

        let info = if let Some(publication) = state.tracks.get_mut(sid) {
            let previous = publication.info();
            if let Some(replaced) = publication.attach(remote)? {
                deferred.stop.push(replaced);
                self.inner
                    .emitter
                    .queue(ParticipantEvent::TrackUnsubscribed(previous));
            }
            publication.info()
        } else {
            let mut publication =
                TrackPublication::from_info(&TrackInfo::new(sid.clone(), TrackKind::Data, name));
            publication.attach(remote)?;
            let info = publication.info();
            self.add_publication(state, publication);

            // Not snapshot driven, so no first-snapshot suppression. Before any
            // metadata the track is treated as pre-existing.
            if state.has_metadata() {
                self.inner
                    .emitter
                    .queue(ParticipantEvent::TrackPublished(info.clone()));
            }
            info
        };

        debug!(
            participant_sid = %state.sid,
            track_sid = %sid,
            label = %channel.label(),
            "Attached data channel"
        );
        deferred.watch_data.push((channel, sid.clone(), generation));
        self.inner
            .emitter
            .queue(ParticipantEvent::TrackSubscribed(info.clone()));
        Ok(info)
    }

    fn fail_subscription(&self, participant_sid: &ParticipantSid, claimed_sid: &TrackSid, err: &Error) {
        error!(
            participant_sid = %participant_sid,
            track_sid = %claimed_sid,
            error = %err,
            "Could not find published track"
        );
        self.inner
            .emitter
            .queue(ParticipantEvent::TrackSubscriptionFailed(claimed_sid.clone()));
    }

    /// Stream end or channel close for the attachment tagged `generation`
    fn handle_track_ended(&self, sid: &TrackSid, generation: u64) {
        {
            let mut state = self.inner.state.lock();
            let participant_sid = state.sid.clone();
            let Some(publication) = state.tracks.get_mut(sid) else {
                trace!(participant_sid = %participant_sid, track_sid = %sid, "End signal for removed track");
                return;
            };
            if publication.track().map(RemoteTrack::generation) != Some(generation) {
                trace!(participant_sid = %participant_sid, track_sid = %sid, "Stale end signal");
                return;
            }
            publication.detach();
            self.inner
                .emitter
                .queue(ParticipantEvent::TrackUnsubscribed(publication.info()));
        }
        self.flush();
    }

    fn handle_track_message(&self, sid: &TrackSid, generation: u64, payload: Bytes) {
        {
            let state = self.inner.state.lock();
            let live = state
                .tracks
                .get(sid)
                .and_then(TrackPublication::track)
                .is_some_and(|track| track.generation() == generation);
            if !live {
                return;
            }
            self.inner.emitter.queue(ParticipantEvent::TrackMessage {
                payload,
                sid: sid.clone(),
            });
        }
        self.flush();
    }

    /// Release replaced tracks, register observers, then dispatch events
    fn finish(&self, deferred: Deferred) {
        for track in deferred.stop {
            track.stop();
        }

        for (track, sid, generation) in deferred.watch_media {
            let participant = self.downgrade();
            track.on_ended(Box::new(move || {
                if let Some(participant) = participant.upgrade() {
                    participant.handle_track_ended(&sid, generation);
                }
            }));
        }

        for (channel, sid, generation) in deferred.watch_data {
            let participant = self.downgrade();
            let message_sid = sid.clone();
            channel.on_message(Box::new(move |payload| {
                if let Some(participant) = participant.upgrade() {
                    participant.handle_track_message(&message_sid, generation, payload);
                }
            }));

            let participant = self.downgrade();
            channel.on_close(Box::new(move || {
                if let Some(participant) = participant.upgrade() {
                    participant.handle_track_ended(&sid, generation);
                }
            }));
        }

        self.flush();
    }

    fn flush(&self) {
        let sid = self.inner.state.lock().sid.clone();
        self.inner.emitter.flush(&sid);
    }
}

impl RetrySource for RemoteParticipant {
    fn next_retry_deadline(&self) -> Option<Instant> {
        Self::next_retry_deadline(self)
    }

    fn process_due_retries(&self, now: Instant) -> usize {
        Self::process_due_retries(self, now)
    }

    fn retry_wakeup(&self) -> Arc<Notify> {
        Arc::clone(&self.inner.retry_wakeup)
    }
}

impl std::fmt::Debug for RemoteParticipant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("RemoteParticipant")
            .field("sid", &state.sid)
            .field("identity", &state.identity)
            .field("tracks", &state.tracks.len())
            .field("pending", &state.pending.len())
            .finish()
    }
}
