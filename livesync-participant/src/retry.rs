//! Deferred correlation of media arrivals
//!
//! A media track that cannot be matched to a publication yet is parked as a
//! `PendingSubscription`. Nothing sleeps inside the participant: whoever owns
//! the clock calls `process_due_retries(now)`. Production code uses a
//! `RetryDriver` task for that; tests call it directly with a chosen instant.

use crate::participant::WeakParticipant;
use crate::track::MediaStreamTrack;
use crate::types::TrackSid;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

pub(crate) struct PendingSubscription {
    pub(crate) id: u64,
    pub(crate) track: Arc<dyn MediaStreamTrack>,
    pub(crate) claimed_sid: TrackSid,
    pub(crate) retries_left: u32,
    pub(crate) due_at: Instant,
}

/// Handle to one parked media arrival
#[derive(Clone)]
pub struct RetryHandle {
    id: u64,
    claimed_sid: TrackSid,
    participant: WeakParticipant,
}

impl RetryHandle {
    pub(crate) const fn new(id: u64, claimed_sid: TrackSid, participant: WeakParticipant) -> Self {
        Self {
            id,
            claimed_sid,
            participant,
        }
    }

    #[must_use]
    pub fn claimed_sid(&self) -> &TrackSid {
        &self.claimed_sid
    }

    /// Whether the arrival is still waiting for a matching publication
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.participant
            .upgrade()
            .is_some_and(|participant| participant.is_retry_pending(self.id))
    }

    /// Drop the arrival without emitting a failure. Returns false if it was
    /// already matched, failed or cancelled.
    pub fn cancel(&self) -> bool {
        self.participant
            .upgrade()
            .is_some_and(|participant| participant.cancel_retry(self.id))
    }
}

impl std::fmt::Debug for RetryHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetryHandle")
            .field("id", &self.id)
            .field("claimed_sid", &self.claimed_sid)
            .finish_non_exhaustive()
    }
}

/// Something holding parked arrivals that a `RetryDriver` can pump
pub trait RetrySource: Send + Sync + 'static {
    /// Earliest instant at which a parked arrival is due
    fn next_retry_deadline(&self) -> Option<Instant>;

    /// Run one attempt for every arrival due at `now`, returning how many ran
    fn process_due_retries(&self, now: Instant) -> usize;

    /// Notified whenever a new arrival is parked
    fn retry_wakeup(&self) -> Arc<Notify>;
}

/// Background task that fires parked retries when they fall due
pub struct RetryDriver {
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl RetryDriver {
    /// Spawn the driver on the current tokio runtime
    pub fn spawn<S: RetrySource>(source: S) -> Self {
        let token = CancellationToken::new();
        let task_token = token.clone();
        let handle = tokio::spawn(async move {
            Self::run(source, task_token).await;
        });
        Self { token, handle }
    }

    async fn run<S: RetrySource>(source: S, token: CancellationToken) {
        let wakeup = source.retry_wakeup();
        debug!("Retry driver started");

        loop {
            match source.next_retry_deadline() {
                Some(deadline) => {
                    tokio::select! {
                        () = token.cancelled() => break,
                        () = tokio::time::sleep_until(deadline) => {
                            let processed = source.process_due_retries(Instant::now());
                            debug!(processed, "Processed due subscription retries");
                        }
                        () = wakeup.notified() => {}
                    }
                }
                None => {
                    tokio::select! {
                        () = token.cancelled() => break,
                        () = wakeup.notified() => {}
                    }
                }
            }
        }

        info!("Retry driver stopped");
    }

    pub fn stop(&self) {
        self.token.cancel();
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Stop the driver and wait for the task to exit
    pub async fn shutdown(mut self) {
        self.token.cancel();
        let _ = (&mut self.handle).await;
    }
}

impl Drop for RetryDriver {
    fn drop(&mut self) {
        self.token.cancel();
    }
}
