//! Identifier newtypes shared across the participant model

use serde::{Deserialize, Serialize};
use std::fmt;

/// Server assigned participant identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantSid(String);

impl ParticipantSid {
    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ParticipantSid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for ParticipantSid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for ParticipantSid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Track identifier.
///
/// Server issued sids carry a fixed prefix (`TR_...`). Identifiers handed to
/// us by a local transport stack may not, in which case they cannot be used
/// to look up a publication directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackSid(String);

impl TrackSid {
    pub fn new(sid: impl Into<String>) -> Self {
        Self(sid.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this sid looks like one issued by the server
    #[must_use]
    pub fn has_server_prefix(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }
}

impl fmt::Display for TrackSid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TrackSid {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for TrackSid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_prefix() {
        assert!(TrackSid::from("TR_abc123").has_server_prefix("TR"));
        assert!(!TrackSid::from("{5f1c-local-uuid}").has_server_prefix("TR"));
    }

    #[test]
    fn test_sid_serializes_as_plain_string() {
        let sid = ParticipantSid::from("PA_xyz");
        assert_eq!(serde_json::to_string(&sid).unwrap(), "\"PA_xyz\"");
        assert_eq!(sid.to_string(), "PA_xyz");
    }
}
