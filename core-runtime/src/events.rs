//! # Event Bus
//!
//! Event-driven notification for the player core, built on
//! `tokio::sync::broadcast`. Presentation layers subscribe here instead of
//! polling the core: every state transition, download outcome and store
//! signal is published as a typed [`CoreEvent`].
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{EventBus, CoreEvent, DownloadEvent};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let bus = EventBus::new(100);
//! let mut stream = bus.subscribe();
//!
//! bus.emit(CoreEvent::Download(DownloadEvent::Started {
//!     track_id: "track-1".to_string(),
//! }));
//!
//! let event = stream.recv().await.unwrap();
//! assert!(matches!(event, CoreEvent::Download(_)));
//! # }
//! ```
//!
//! Subscribers that fall behind receive `RecvError::Lagged` and may simply
//! continue; the next [`PlayerEvent::StateChanged`] always carries the full
//! current snapshot, so no incremental state is lost for good.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum encompassing all event categories.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Playback engine events
    Player(PlayerEvent),
    /// Local store events
    Store(StoreEvent),
    /// Download manager events
    Download(DownloadEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Player(e) => e.description(),
            CoreEvent::Store(e) => e.description(),
            CoreEvent::Download(e) => e.description(),
        }
    }
}

// ============================================================================
// Player State Types
// ============================================================================

/// Transport status of the playback engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackStatus {
    /// Nothing loaded; the engine holds no audio session.
    Idle,
    /// An audio session is active and advancing.
    Playing,
    /// An audio session is active but suspended.
    Paused,
}

/// Repeat behavior applied when the engine advances past a track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatMode {
    /// Advance through the queue once, then go idle.
    None,
    /// Wrap from the last queue position back to the first.
    All,
    /// Loop the current track without advancing the queue.
    One,
}

impl RepeatMode {
    /// The cycle applied by the repeat toggle: none → all → one → none.
    pub fn next(self) -> Self {
        match self {
            RepeatMode::None => RepeatMode::All,
            RepeatMode::All => RepeatMode::One,
            RepeatMode::One => RepeatMode::None,
        }
    }
}

/// What the engine currently has loaded. Track playback and radio playback
/// are mutually exclusive by construction: a snapshot carries at most one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum NowPlaying {
    Track {
        id: String,
        title: String,
        artist: String,
        /// Provenance of the audio payload: "remote", "cached" or "imported".
        origin: String,
    },
    Radio {
        id: String,
        name: String,
        genre: String,
    },
}

/// Immutable copy of the full player state, published after every
/// transition. Observers never need to poll: the latest snapshot is always
/// the truth.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlayerSnapshot {
    pub status: PlaybackStatus,
    /// `None` exactly when `status` is [`PlaybackStatus::Idle`].
    pub now_playing: Option<NowPlaying>,
    pub position_secs: f64,
    /// 0.0 while the duration is still unknown (and always for radio).
    pub duration_secs: f64,
    pub repeat: RepeatMode,
    pub shuffle: bool,
}

impl PlayerSnapshot {
    /// The state before any play request: idle, nothing loaded.
    pub fn idle() -> Self {
        Self {
            status: PlaybackStatus::Idle,
            now_playing: None,
            position_secs: 0.0,
            duration_secs: 0.0,
            repeat: RepeatMode::None,
            shuffle: false,
        }
    }
}

// ============================================================================
// Player Events
// ============================================================================

/// Events published by the playback engine.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlayerEvent {
    /// The authoritative state changed; carries the complete new snapshot.
    StateChanged { snapshot: PlayerSnapshot },
    /// A full queue pass found no playable track; the engine went idle.
    NothingPlayable { attempted: usize },
    /// A track failed to resolve or load and was skipped.
    TrackSkipped { track_id: String, reason: String },
    /// A non-fatal playback error surfaced to the user.
    Error { message: String },
}

impl PlayerEvent {
    fn description(&self) -> &str {
        match self {
            PlayerEvent::StateChanged { .. } => "Player state changed",
            PlayerEvent::NothingPlayable { .. } => "Nothing playable in queue",
            PlayerEvent::TrackSkipped { .. } => "Track skipped",
            PlayerEvent::Error { .. } => "Playback error",
        }
    }
}

// ============================================================================
// Store Events
// ============================================================================

/// Outcome of the best-effort persistence grant requested from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DurabilityGrant {
    /// The platform promised not to evict cached payloads under pressure.
    Granted,
    /// The platform refused; cached data may be reclaimed at any time.
    Denied,
    /// The host has no persistence-grant mechanism at all.
    Unsupported,
}

/// Events published by the local store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum StoreEvent {
    /// Result of the durability grant request made at startup.
    DurabilityReported { grant: DurabilityGrant },
    /// Another instance wants to upgrade the schema; this instance should
    /// release the store promptly.
    ReleaseRequested { holder: String },
    /// A payload was committed (download finished or file imported).
    PayloadCommitted { track_id: String, audio_bytes: u64 },
    /// A payload was removed from the store.
    PayloadDeleted { track_id: String },
}

impl StoreEvent {
    fn description(&self) -> &str {
        match self {
            StoreEvent::DurabilityReported { .. } => "Durability grant reported",
            StoreEvent::ReleaseRequested { .. } => "Store release requested",
            StoreEvent::PayloadCommitted { .. } => "Payload committed",
            StoreEvent::PayloadDeleted { .. } => "Payload deleted",
        }
    }
}

// ============================================================================
// Download Events
// ============================================================================

/// Events published by the download manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum DownloadEvent {
    /// A download began fetching.
    Started { track_id: String },
    /// Audio (and possibly cover) bytes were committed to the store.
    Completed { track_id: String, audio_bytes: u64 },
    /// The download failed; the store is exactly as it was before.
    Failed { track_id: String, reason: String },
    /// The download was abandoned before commit.
    Cancelled { track_id: String },
}

impl DownloadEvent {
    fn description(&self) -> &str {
        match self {
            DownloadEvent::Started { .. } => "Download started",
            DownloadEvent::Completed { .. } => "Download completed",
            DownloadEvent::Failed { .. } => "Download failed",
            DownloadEvent::Cancelled { .. } => "Download cancelled",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central broadcast channel for core events.
///
/// Cheap to clone via `Arc`; every subscriber receives every event emitted
/// after its subscription. Emitting never blocks and never fails the
/// producer: an event with no listeners is simply dropped.
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Create a new event bus with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    pub fn emit(&self, event: CoreEvent) {
        tracing::trace!(event = event.description(), "emitting core event");
        // A send error only means nobody is listening right now.
        let _ = self.sender.send(event);
    }

    /// Subscribe to all events emitted from this point on.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_emitted_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();

        bus.emit(CoreEvent::Download(DownloadEvent::Started {
            track_id: "t1".to_string(),
        }));

        let event = rx.recv().await.unwrap();
        assert_eq!(
            event,
            CoreEvent::Download(DownloadEvent::Started {
                track_id: "t1".to_string()
            })
        );
    }

    #[tokio::test]
    async fn emit_without_subscribers_is_not_an_error() {
        let bus = EventBus::new(8);
        bus.emit(CoreEvent::Store(StoreEvent::PayloadDeleted {
            track_id: "t1".to_string(),
        }));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn each_subscriber_sees_every_event() {
        let bus = EventBus::new(8);
        let mut a = bus.subscribe();
        let mut b = bus.subscribe();

        let snapshot = PlayerSnapshot::idle();
        bus.emit(CoreEvent::Player(PlayerEvent::StateChanged {
            snapshot: snapshot.clone(),
        }));

        for rx in [&mut a, &mut b] {
            match rx.recv().await.unwrap() {
                CoreEvent::Player(PlayerEvent::StateChanged { snapshot: s }) => {
                    assert_eq!(s, snapshot)
                }
                other => panic!("unexpected event: {other:?}"),
            }
        }
    }

    #[test]
    fn repeat_mode_cycles() {
        assert_eq!(RepeatMode::None.next(), RepeatMode::All);
        assert_eq!(RepeatMode::All.next(), RepeatMode::One);
        assert_eq!(RepeatMode::One.next(), RepeatMode::None);
    }

    #[test]
    fn events_serialize_with_tagged_layout() {
        let event = CoreEvent::Store(StoreEvent::DurabilityReported {
            grant: DurabilityGrant::Denied,
        });
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Store\""));
        assert!(json.contains("\"denied\""));
    }
}
