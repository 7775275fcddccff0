//! Audio sink abstraction.
//!
//! The engine never touches an OS audio device: it drives an [`AudioSink`]
//! and reacts to the [`SinkEvent`]s the device pushes back. Position
//! advancement in particular is event-driven: the engine does not poll;
//! it applies whatever elapsed-time signal the device reports.
//!
//! Host applications supply the implementation (HTML `<audio>`, a native
//! output stack, a test double); the core ships none.

use crate::error::Result;
use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc;

/// What the sink is asked to play.
#[derive(Debug, Clone)]
pub enum SinkSource {
    /// Stream from an absolute URL (remote tracks, radio).
    Url(String),
    /// Play from an in-memory blob (cached or imported payloads).
    Blob(Bytes),
}

/// Notifications pushed by the audio device.
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    /// Elapsed playback time changed.
    PositionChanged(Duration),
    /// The device learned the media duration.
    DurationKnown(Duration),
    /// The current media played to its end.
    Ended,
    /// The device failed; the session is dead.
    Failed(String),
}

/// Channel half the host's sink uses to push events into the engine.
pub type SinkEventSender = mpsc::UnboundedSender<SinkEvent>;

/// Channel half the engine consumes.
pub type SinkEventReceiver = mpsc::UnboundedReceiver<SinkEvent>;

/// Create the sink event channel pair.
pub fn sink_channel() -> (SinkEventSender, SinkEventReceiver) {
    mpsc::unbounded_channel()
}

/// Platform audio device seam.
///
/// Control methods must be fast and non-blocking; heavy work belongs on
/// the device's own thread. `load` replaces any active session, starting
/// playback at `start_at`.
#[async_trait]
pub trait AudioSink: Send + Sync {
    /// Begin playback of a source, replacing the current session.
    async fn load(&self, source: SinkSource, start_at: Duration) -> Result<()>;

    /// Suspend playback, keeping the session and position.
    async fn pause(&self) -> Result<()>;

    /// Resume a paused session.
    async fn resume(&self) -> Result<()>;

    /// Stop and release the active session.
    async fn stop(&self) -> Result<()>;

    /// Jump to an absolute position in the current session.
    async fn seek(&self, position: Duration) -> Result<()>;
}
