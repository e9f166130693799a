//! Fake transport handles and fixtures for unit tests

use crate::config::SubscriptionConfig;
use crate::events::ParticipantEvent;
use crate::participant::RemoteParticipant;
use crate::track::{DataChannel, MediaKind, MediaStreamTrack};
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

type OnceCallback = Box<dyn FnOnce() + Send>;
type MessageCallback = Box<dyn Fn(Bytes) + Send + Sync>;

pub struct FakeMediaTrack {
    id: String,
    kind: MediaKind,
    stops: AtomicUsize,
    ended: Mutex<Option<OnceCallback>>,
}

impl FakeMediaTrack {
    pub fn new(id: &str, kind: MediaKind) -> Arc<Self> {
        Arc::new(Self {
            id: id.to_string(),
            kind,
            stops: AtomicUsize::new(0),
            ended: Mutex::new(None),
        })
    }

    pub fn stop_count(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }

    /// Simulate the remote end of the stream
    pub fn end(&self) {
        let callback = self.ended.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl MediaStreamTrack for FakeMediaTrack {
    fn id(&self) -> String {
        self.id.clone()
    }

    fn kind(&self) -> MediaKind {
        self.kind
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn on_ended(&self, callback: Box<dyn FnOnce() + Send>) {
        *self.ended.lock() = Some(callback);
    }
}

#[derive(Default)]
pub struct FakeDataChannel {
    label: String,
    closes: AtomicUsize,
    message: Mutex<Option<Arc<MessageCallback>>>,
    closed: Mutex<Option<OnceCallback>>,
}

impl FakeDataChannel {
    pub fn new(label: &str) -> Arc<Self> {
        Arc::new(Self {
            label: label.to_string(),
            ..Self::default()
        })
    }

    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn deliver(&self, payload: &'static [u8]) {
        let callback = self.message.lock().clone();
        if let Some(callback) = callback {
            callback(Bytes::from_static(payload));
        }
    }

    /// Simulate the remote side closing the channel
    pub fn close_remote(&self) {
        let callback = self.closed.lock().take();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl DataChannel for FakeDataChannel {
    fn label(&self) -> String {
        self.label.clone()
    }

    fn close(&self) {
        self.closes.fetch_add(1, Ordering::SeqCst);
    }

    fn on_message(&self, callback: Box<dyn Fn(Bytes) + Send + Sync>) {
        *self.message.lock() = Some(Arc::new(callback));
    }

    fn on_close(&self, callback: Box<dyn FnOnce() + Send>) {
        *self.closed.lock() = Some(callback);
    }
}

/// Records every event a participant emits
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<ParticipantEvent>>>);

impl EventLog {
    pub fn attach(participant: &RemoteParticipant) -> Self {
        let log = Self::default();
        let sink = log.clone();
        participant.on(move |event| sink.0.lock().push(event.clone()));
        log
    }

    pub fn take(&self) -> Vec<ParticipantEvent> {
        std::mem::take(&mut *self.0.lock())
    }

    /// Event names in emission order, draining the log
    pub fn take_names(&self) -> Vec<&'static str> {
        self.take().iter().map(ParticipantEvent::name).collect()
    }
}

pub fn test_participant() -> RemoteParticipant {
    RemoteParticipant::new("PA_remote", "remote", SubscriptionConfig::default())
}
