use crate::track::TrackKind;
use crate::types::TrackSid;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Metadata decode error: {0}")]
    MetadataDecode(#[from] serde_json::Error),

    #[error("Track not found: {0}")]
    TrackNotFound(TrackSid),

    #[error("Track {sid} is {expected}, got a {actual} handle")]
    KindMismatch {
        sid: TrackSid,
        expected: TrackKind,
        actual: TrackKind,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

pub type Result<T> = std::result::Result<T, Error>;
