//! Track publication records
//!
//! A publication is the server-side announcement that a track exists. It may
//! or may not currently hold a live `RemoteTrack`.

use crate::error::{Error, Result};
use crate::proto::TrackInfo;
use crate::track::{RemoteTrack, TrackKind};
use crate::types::TrackSid;
use serde::{Deserialize, Serialize};

/// Signals a publication raises on its own state changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublicationSignal {
    Muted,
    Unmuted,
}

type SignalListener = Box<dyn Fn(PublicationSignal, &PublicationInfo) + Send + Sync>;

/// Subscription state of a publication
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationState {
    /// Announced by metadata, no media attached
    Announced,
    /// A live handle is attached
    Live,
}

/// Point-in-time view of a publication, safe to hand to listeners
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationInfo {
    pub sid: TrackSid,
    pub kind: TrackKind,
    pub name: String,
    pub muted: bool,
    pub state: PublicationState,
}

impl PublicationInfo {
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state == PublicationState::Live
    }
}

pub struct TrackPublication {
    sid: TrackSid,
    kind: TrackKind,
    name: String,
    muted: bool,
    track: Option<RemoteTrack>,
    listeners: Vec<SignalListener>,
}

impl TrackPublication {
    /// Create an announced publication from server metadata
    #[must_use]
    pub fn from_info(info: &TrackInfo) -> Self {
        Self {
            sid: info.sid.clone(),
            kind: info.kind,
            name: info.name.clone(),
            muted: info.muted,
            track: None,
            listeners: Vec::new(),
        }
    }

    #[must_use]
    pub fn sid(&self) -> &TrackSid {
        &self.sid
    }

    #[must_use]
    pub const fn kind(&self) -> TrackKind {
        self.kind
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub const fn is_muted(&self) -> bool {
        self.muted
    }

    #[must_use]
    pub const fn track(&self) -> Option<&RemoteTrack> {
        self.track.as_ref()
    }

    #[must_use]
    pub const fn state(&self) -> PublicationState {
        if self.track.is_some() {
            PublicationState::Live
        } else {
            PublicationState::Announced
        }
    }

    #[must_use]
    pub fn info(&self) -> PublicationInfo {
        PublicationInfo {
            sid: self.sid.clone(),
            kind: self.kind,
            name: self.name.clone(),
            muted: self.muted,
            state: self.state(),
        }
    }

    /// Apply mutable metadata fields. Sid, kind and the attached track are
    /// left untouched.
    pub(crate) fn update_info(&mut self, info: &TrackInfo) {
        self.name.clone_from(&info.name);
        self.set_muted(info.muted);
    }

    pub(crate) fn set_muted(&mut self, muted: bool) {
        if self.muted == muted {
            return;
        }
        self.muted = muted;

        let signal = if muted {
            PublicationSignal::Muted
        } else {
            PublicationSignal::Unmuted
        };
        let info = self.info();
        for listener in &self.listeners {
            listener(signal, &info);
        }
    }

    /// Attach a live track, returning the one it replaces.
    ///
    /// The track's display fields are overwritten with the publication's.
    pub(crate) fn attach(&mut self, mut track: RemoteTrack) -> Result<Option<RemoteTrack>> {
        if track.kind() != self.kind {
            return Err(Error::KindMismatch {
                sid: self.sid.clone(),
                expected: self.kind,
                actual: track.kind(),
            });
        }
        track.set_display(self.sid.clone(), self.name.clone());
        Ok(self.track.replace(track))
    }

    pub(crate) fn detach(&mut self) -> Option<RemoteTrack> {
        self.track.take()
    }

    pub(crate) fn on_signal(
        &mut self,
        listener: impl Fn(PublicationSignal, &PublicationInfo) + Send + Sync + 'static,
    ) {
        self.listeners.push(Box::new(listener));
    }

    pub(crate) fn clear_listeners(&mut self) {
        self.listeners.clear();
    }
}

impl std::fmt::Debug for TrackPublication {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackPublication")
            .field("sid", &self.sid)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("muted", &self.muted)
            .field("track", &self.track)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn audio_info() -> TrackInfo {
        TrackInfo::new("TR_audio", TrackKind::Audio, "mic")
    }

    #[test]
    fn test_update_keeps_identity() {
        let mut publication = TrackPublication::from_info(&audio_info());
        publication.update_info(&TrackInfo::new("TR_other", TrackKind::Video, "renamed"));

        assert_eq!(publication.sid().as_str(), "TR_audio");
        assert_eq!(publication.kind(), TrackKind::Audio);
        assert_eq!(publication.name(), "renamed");
        assert_eq!(publication.state(), PublicationState::Announced);
    }

    #[test]
    fn test_mute_signals_only_on_change() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut publication = TrackPublication::from_info(&audio_info());
        let sink = Arc::clone(&seen);
        publication.on_signal(move |signal, _| sink.lock().unwrap().push(signal));

        publication.update_info(&audio_info());
        publication.update_info(&audio_info().muted(true));
        publication.update_info(&audio_info().muted(true));
        publication.update_info(&audio_info());

        assert_eq!(
            *seen.lock().unwrap(),
            vec![PublicationSignal::Muted, PublicationSignal::Unmuted]
        );
    }

    #[test]
    fn test_cleared_listeners_stop_forwarding() {
        let count = Arc::new(Mutex::new(0));
        let mut publication = TrackPublication::from_info(&audio_info());
        let sink = Arc::clone(&count);
        publication.on_signal(move |_, _| *sink.lock().unwrap() += 1);

        publication.clear_listeners();
        publication.set_muted(true);

        assert_eq!(*count.lock().unwrap(), 0);
        assert!(publication.is_muted());
    }
}
