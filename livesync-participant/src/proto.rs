//! Participant snapshots pushed by the signaling server

use crate::track::TrackKind;
use crate::types::{ParticipantSid, TrackSid};
use serde::{Deserialize, Serialize};

/// Connection state reported for a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantState {
    Joining,
    Joined,
    #[default]
    Active,
    Disconnected,
}

/// A published track as announced by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackInfo {
    pub sid: TrackSid,
    #[serde(rename = "type")]
    pub kind: TrackKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub muted: bool,
}

impl TrackInfo {
    pub fn new(sid: impl Into<TrackSid>, kind: TrackKind, name: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            kind,
            name: name.into(),
            muted: false,
        }
    }

    #[must_use]
    pub const fn muted(mut self, muted: bool) -> Self {
        self.muted = muted;
        self
    }
}

/// Authoritative participant state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParticipantInfo {
    pub sid: ParticipantSid,
    pub identity: String,
    #[serde(default)]
    pub state: ParticipantState,
    /// Raw JSON metadata, may be empty
    #[serde(default)]
    pub metadata: String,
    #[serde(default)]
    pub tracks: Vec<TrackInfo>,
}

impl ParticipantInfo {
    pub fn new(sid: impl Into<ParticipantSid>, identity: impl Into<String>) -> Self {
        Self {
            sid: sid.into(),
            identity: identity.into(),
            state: ParticipantState::default(),
            metadata: String::new(),
            tracks: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, metadata: impl Into<String>) -> Self {
        self.metadata = metadata.into();
        self
    }

    #[must_use]
    pub fn with_track(mut self, track: TrackInfo) -> Self {
        self.tracks.push(track);
        self
    }

    #[must_use]
    pub const fn with_state(mut self, state: ParticipantState) -> Self {
        self.state = state;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_participant_info_from_signaling_json() {
        let json = r#"{
            "sid": "PA_1",
            "identity": "alice",
            "metadata": "{\"role\":\"host\"}",
            "tracks": [
                {"sid": "TR_a", "type": "audio", "name": "mic", "muted": true},
                {"sid": "TR_v", "type": "video"}
            ]
        }"#;

        let info: ParticipantInfo = serde_json::from_str(json).unwrap();
        assert_eq!(info.sid.as_str(), "PA_1");
        assert_eq!(info.state, ParticipantState::Active);
        assert_eq!(info.tracks.len(), 2);
        assert_eq!(info.tracks[0].kind, TrackKind::Audio);
        assert!(info.tracks[0].muted);
        assert_eq!(info.tracks[1].name, "");
        assert!(!info.tracks[1].muted);
    }
}
