//! Remote track handles
//!
//! The media transport hands us live objects (media stream tracks and data
//! channels). They are modelled as traits so the participant logic does not
//! depend on a concrete WebRTC stack:
//! - `MediaStreamTrack`: a live audio or video track
//! - `DataChannel`: a live data channel
//! - `RemoteTrack`: one attached handle plus the display fields copied from
//!   the publication it belongs to

use crate::types::TrackSid;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Kind of a published track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Audio,
    Video,
    Data,
}

impl TrackKind {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Audio => "audio",
            Self::Video => "video",
            Self::Data => "data",
        }
    }
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind reported by a live media track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Audio,
    Video,
}

impl From<MediaKind> for TrackKind {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Audio => Self::Audio,
            MediaKind::Video => Self::Video,
        }
    }
}

/// Live media track delivered by the transport
pub trait MediaStreamTrack: Send + Sync {
    /// Identifier the transport assigned to this track
    fn id(&self) -> String;

    fn kind(&self) -> MediaKind;

    /// Stop receiving and release the underlying resources
    fn stop(&self);

    /// Register a callback fired once when the stream ends
    fn on_ended(&self, callback: Box<dyn FnOnce() + Send>);
}

/// Live data channel delivered by the transport
pub trait DataChannel: Send + Sync {
    fn label(&self) -> String;

    fn close(&self);

    /// Register a callback fired for every received message
    fn on_message(&self, callback: Box<dyn Fn(Bytes) + Send + Sync>);

    /// Register a callback fired once when the channel closes
    fn on_close(&self, callback: Box<dyn FnOnce() + Send>);
}

/// The transport object backing a `RemoteTrack`
#[derive(Clone)]
pub enum TrackHandle {
    Media(Arc<dyn MediaStreamTrack>),
    Data(Arc<dyn DataChannel>),
}

impl TrackHandle {
    #[must_use]
    pub fn kind(&self) -> TrackKind {
        match self {
            Self::Media(track) => track.kind().into(),
            Self::Data(_) => TrackKind::Data,
        }
    }
}

/// A subscribed track: the live handle attached to a publication
pub struct RemoteTrack {
    sid: TrackSid,
    name: String,
    handle: TrackHandle,
    /// Distinguishes successive attachments on the same publication
    generation: u64,
}

impl RemoteTrack {
    pub(crate) fn new(sid: TrackSid, name: String, handle: TrackHandle, generation: u64) -> Self {
        Self {
            sid,
            name,
            handle,
            generation,
        }
    }

    #[must_use]
    pub fn sid(&self) -> &TrackSid {
        &self.sid
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> TrackKind {
        self.handle.kind()
    }

    #[must_use]
    pub fn handle(&self) -> &TrackHandle {
        &self.handle
    }

    #[must_use]
    pub fn media_track(&self) -> Option<&Arc<dyn MediaStreamTrack>> {
        match &self.handle {
            TrackHandle::Media(track) => Some(track),
            TrackHandle::Data(_) => None,
        }
    }

    #[must_use]
    pub fn data_channel(&self) -> Option<&Arc<dyn DataChannel>> {
        match &self.handle {
            TrackHandle::Data(channel) => Some(channel),
            TrackHandle::Media(_) => None,
        }
    }

    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn set_display(&mut self, sid: TrackSid, name: String) {
        self.sid = sid;
        self.name = name;
    }

    /// Release the transport handle
    pub(crate) fn stop(&self) {
        match &self.handle {
            TrackHandle::Media(track) => track.stop(),
            TrackHandle::Data(channel) => channel.close(),
        }
    }
}

impl fmt::Debug for RemoteTrack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteTrack")
            .field("sid", &self.sid)
            .field("name", &self.name)
            .field("kind", &self.kind())
            .field("generation", &self.generation)
            .finish()
    }
}
