//! Participant lifecycle events
//!
//! Every emission is queued and then dispatched from a single point that
//! logs the event before handing it to listeners. Dispatch happens outside
//! the participant's state lock, so a listener may call back into the
//! participant.
//!
//! Only one caller dispatches at a time. A flush that finds dispatch already
//! running leaves its events queued for the active dispatcher, which drains
//! the queue in FIFO order. Events raised by a listener are therefore
//! delivered after every listener has seen the current event, whichever
//! thread raised them.

use crate::publication::PublicationInfo;
use crate::types::{ParticipantSid, TrackSid};
use bytes::Bytes;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParticipantEvent {
    TrackPublished(PublicationInfo),
    TrackUnpublished(PublicationInfo),
    TrackSubscribed(PublicationInfo),
    TrackUnsubscribed(PublicationInfo),
    /// The claimed sid of a media arrival that could not be correlated
    TrackSubscriptionFailed(TrackSid),
    TrackMuted(PublicationInfo),
    TrackUnmuted(PublicationInfo),
    TrackMessage { payload: Bytes, sid: TrackSid },
}

impl ParticipantEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::TrackPublished(_) => "trackPublished",
            Self::TrackUnpublished(_) => "trackUnpublished",
            Self::TrackSubscribed(_) => "trackSubscribed",
            Self::TrackUnsubscribed(_) => "trackUnsubscribed",
            Self::TrackSubscriptionFailed(_) => "trackSubscriptionFailed",
            Self::TrackMuted(_) => "trackMuted",
            Self::TrackUnmuted(_) => "trackUnmuted",
            Self::TrackMessage { .. } => "trackMessage",
        }
    }

    #[must_use]
    pub fn track_sid(&self) -> &TrackSid {
        match self {
            Self::TrackPublished(info)
            | Self::TrackUnpublished(info)
            | Self::TrackSubscribed(info)
            | Self::TrackUnsubscribed(info)
            | Self::TrackMuted(info)
            | Self::TrackUnmuted(info) => &info.sid,
            Self::TrackSubscriptionFailed(sid) | Self::TrackMessage { sid, .. } => sid,
        }
    }
}

/// Handle returned by `EventEmitter::on`, used to remove the listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Arc<dyn Fn(&ParticipantEvent) + Send + Sync>;

#[derive(Default)]
struct DispatchQueue {
    events: VecDeque<ParticipantEvent>,
    dispatching: bool,
}

/// Releases the dispatcher role if a listener panics mid-flush
struct DispatchGuard<'a>(&'a Mutex<DispatchQueue>);

impl Drop for DispatchGuard<'_> {
    fn drop(&mut self) {
        if std::thread::panicking() {
            self.0.lock().dispatching = false;
        }
    }
}

#[derive(Default)]
pub struct EventEmitter {
    listeners: Mutex<Vec<(ListenerId, Listener)>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<ParticipantEvent>>>,
    queue: Mutex<DispatchQueue>,
    next_id: AtomicU64,
}

impl EventEmitter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, listener: impl Fn(&ParticipantEvent) + Send + Sync + 'static) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.lock().push((id, Arc::new(listener)));
        id
    }

    pub fn off(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.lock();
        let before = listeners.len();
        listeners.retain(|(listener_id, _)| *listener_id != id);
        listeners.len() != before
    }

    /// Forward every event into an unbounded channel. The forwarding stops
    /// once the receiver is dropped.
    pub fn channel(&self) -> mpsc::UnboundedReceiver<ParticipantEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut senders = self.senders.lock();
        senders.retain(|sender| !sender.is_closed());
        senders.push(tx);
        rx
    }

    /// Callback listeners plus channels whose receiver is still alive
    #[must_use]
    pub fn listener_count(&self) -> usize {
        let channels = self
            .senders
            .lock()
            .iter()
            .filter(|sender| !sender.is_closed())
            .count();
        self.listeners.lock().len() + channels
    }

    pub(crate) fn queue(&self, event: ParticipantEvent) {
        self.queue.lock().events.push_back(event);
    }

    /// Deliver queued events in order, unless another flush is already
    /// delivering them
    pub(crate) fn flush(&self, participant_sid: &ParticipantSid) {
        {
            let mut queue = self.queue.lock();
            if queue.dispatching {
                return;
            }
            queue.dispatching = true;
        }
        let _guard = DispatchGuard(&self.queue);

        loop {
            let event = {
                let mut queue = self.queue.lock();
                match queue.events.pop_front() {
                    Some(event) => event,
                    None => {
                        queue.dispatching = false;
                        return;
                    }
                }
            };

            trace!(
                participant_sid = %participant_sid,
                event = event.name(),
                track_sid = %event.track_sid(),
                payload = ?event,
                "participant event"
            );

            // Snapshot so listeners can register or remove listeners re-entrantly
            let listeners: Vec<Listener> = self
                .listeners
                .lock()
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect();
            for listener in listeners {
                listener(&event);
            }

            self.senders
                .lock()
                .retain(|sender| sender.send(event.clone()).is_ok());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failed(sid: &str) -> ParticipantEvent {
        ParticipantEvent::TrackSubscriptionFailed(TrackSid::from(sid))
    }

    #[test]
    fn test_flush_delivers_in_order() {
        let emitter = EventEmitter::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        emitter.on(move |event| sink.lock().push(event.track_sid().to_string()));

        emitter.queue(failed("TR_1"));
        emitter.queue(failed("TR_2"));
        assert!(seen.lock().is_empty());

        emitter.flush(&ParticipantSid::from("PA_1"));
        assert_eq!(*seen.lock(), vec!["TR_1", "TR_2"]);
    }

    #[test]
    fn test_off_removes_listener() {
        let emitter = EventEmitter::new();
        let count = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&count);
        let id = emitter.on(move |_| {
            sink.fetch_add(1, Ordering::Relaxed);
        });

        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        emitter.queue(failed("TR_1"));
        emitter.flush(&ParticipantSid::from("PA_1"));

        assert_eq!(count.load(Ordering::Relaxed), 0);
        assert_eq!(emitter.listener_count(), 0);
    }

    #[tokio::test]
    async fn test_channel_forwards_events() {
        let emitter = EventEmitter::new();
        let mut rx = emitter.channel();

        emitter.queue(failed("TR_9"));
        emitter.flush(&ParticipantSid::from("PA_1"));

        assert_eq!(rx.recv().await, Some(failed("TR_9")));
    }

    #[test]
    fn test_dropped_channels_are_pruned() {
        let emitter = EventEmitter::new();
        for _ in 0..100 {
            drop(emitter.channel());
        }
        assert_eq!(emitter.listener_count(), 0);

        let live = emitter.channel();
        assert_eq!(emitter.listener_count(), 1);
        assert_eq!(emitter.senders.lock().len(), 1);

        drop(live);
        emitter.queue(failed("TR_1"));
        emitter.flush(&ParticipantSid::from("PA_1"));
        assert!(emitter.senders.lock().is_empty());
        assert_eq!(emitter.listener_count(), 0);
    }

    #[test]
    fn test_nested_flush_defers_to_active_dispatcher() {
        let emitter = Arc::new(EventEmitter::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let inner = Arc::clone(&emitter);
        emitter.on(move |event| {
            if event.track_sid().as_str() == "TR_1" {
                inner.queue(failed("TR_2"));
                inner.flush(&ParticipantSid::from("PA_1"));
            }
        });
        let sink = Arc::clone(&seen);
        emitter.on(move |event| sink.lock().push(event.track_sid().to_string()));

        emitter.queue(failed("TR_1"));
        emitter.flush(&ParticipantSid::from("PA_1"));

        // The second listener sees TR_1 before the event raised while handling it
        assert_eq!(*seen.lock(), vec!["TR_1", "TR_2"]);
    }

    #[test]
    fn test_concurrent_flush_keeps_queue_order() {
        let emitter = Arc::new(EventEmitter::new());
        let seen = Arc::new(Mutex::new(Vec::new()));

        emitter.on(|event| {
            if event.track_sid().as_str() == "TR_1" {
                std::thread::sleep(std::time::Duration::from_millis(200));
            }
        });
        let sink = Arc::clone(&seen);
        emitter.on(move |event| sink.lock().push(event.track_sid().to_string()));

        emitter.queue(failed("TR_1"));
        let slow = Arc::clone(&emitter);
        let dispatcher = std::thread::spawn(move || slow.flush(&ParticipantSid::from("PA_1")));

        std::thread::sleep(std::time::Duration::from_millis(50));
        emitter.queue(failed("TR_2"));
        emitter.flush(&ParticipantSid::from("PA_1"));
        dispatcher.join().unwrap();

        assert_eq!(*seen.lock(), vec!["TR_1", "TR_2"]);
    }
}
