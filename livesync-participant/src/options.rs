//! Options for publishing local tracks. Passive configuration, no behavior.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoCodec {
    #[default]
    Vp8,
    H264,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoEncoding {
    /// Bits per second
    pub max_bitrate: u32,
    pub max_framerate: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackPublishOptions {
    pub name: Option<String>,
    /// Chosen automatically from bitrate when absent
    pub video_encoding: Option<VideoEncoding>,
    pub video_codec: VideoCodec,
    /// Publish up to three qualities of the stream
    pub simulcast: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalDataTrackOptions {
    pub name: Option<String>,
    /// Milliseconds
    pub max_packet_life_time: Option<u32>,
    pub max_retransmits: Option<u32>,
    pub ordered: bool,
}

impl Default for LocalDataTrackOptions {
    fn default() -> Self {
        Self {
            name: None,
            max_packet_life_time: None,
            max_retransmits: None,
            ordered: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_options_defaults() {
        let options: TrackPublishOptions = serde_json::from_str("{}").unwrap();
        assert_eq!(options.video_codec, VideoCodec::Vp8);
        assert!(!options.simulcast);
        assert!(options.video_encoding.is_none());
    }

    #[test]
    fn test_data_options_default_to_ordered() {
        let options: LocalDataTrackOptions = serde_json::from_str(r#"{"max_retransmits": 3}"#).unwrap();
        assert!(options.ordered);
        assert_eq!(options.max_retransmits, Some(3));
    }
}
