//! `LiveSync` remote participant tracking
//!
//! Keeps the subscriber-side view of a remote participant's tracks. Signaling
//! says which tracks are published, the media transport delivers the live
//! objects, and the two arrive independently and out of order. This crate
//! reconciles them into one publication set and reports lifecycle events.
//!
//! ## Architecture
//!
//! - **`RemoteParticipant`**: publication records plus the reconciliation logic
//! - **`TrackPublication`**: one announced track and its live handle, if any
//! - **`EventEmitter`**: ordered, synchronous delivery of `ParticipantEvent`s
//! - **`RetryDriver`**: fires deferred correlation attempts on a tokio runtime
//! - **`Room`**: routes snapshots and arrivals to participants
//!
//! ## Usage
//!
//! ```rust,ignore
//! use livesync_participant::{Room, RetryDriver, SubscriptionConfig};
//!
//! let room = Room::new(SubscriptionConfig::default());
//! room.on_participant_created(|participant| {
//!     participant.on(|event| tracing::info!(event = event.name(), "participant event"));
//! });
//! let _driver = RetryDriver::spawn(room.clone());
//!
//! room.handle_participant_updates(snapshot.participants);
//! room.handle_media_track(&participant_sid, track, track_sid);
//! ```

pub mod config;
pub mod error;
mod events;
pub mod logging;
pub mod options;
mod participant;
pub mod proto;
mod publication;
mod retry;
mod room;
mod track;
mod types;

#[cfg(test)]
pub mod test_helpers;

pub use config::{Config, LoggingConfig, SubscriptionConfig};
pub use error::{Error, Result};
pub use events::{EventEmitter, ListenerId, ParticipantEvent};
pub use participant::{RemoteParticipant, SubscribeOutcome};
pub use proto::{ParticipantInfo, ParticipantState, TrackInfo};
pub use publication::{PublicationInfo, PublicationSignal, PublicationState, TrackPublication};
pub use retry::{RetryDriver, RetryHandle, RetrySource};
pub use room::Room;
pub use track::{DataChannel, MediaKind, MediaStreamTrack, RemoteTrack, TrackHandle, TrackKind};
pub use types::{ParticipantSid, TrackSid};
