//! # Playback Module
//!
//! The playback engine and its queue: the component that owns "what is
//! currently loaded, what state is it in, and what queue order applies".
//!
//! The engine is an actor: commands apply in issue order, superseded
//! loads are discarded on arrival, and every transition publishes a full
//! [`PlayerSnapshot`] to observers. The platform audio device hides
//! behind the [`AudioSink`] trait; the engine only reacts to its events.
//!
//! [`PlayerSnapshot`]: core_runtime::events::PlayerSnapshot

pub mod engine;
pub mod error;
pub mod queue;
pub mod sink;

pub use engine::{PlayerEngine, PlayerHandle};
pub use error::{PlaybackError, Result};
pub use queue::PlaybackQueue;
pub use sink::{
    sink_channel, AudioSink, SinkEvent, SinkEventReceiver, SinkEventSender, SinkSource,
};

// The canonical state types live in core-runtime so events can carry them;
// re-exported here for engine consumers.
pub use core_runtime::events::{NowPlaying, PlaybackStatus, PlayerSnapshot, RepeatMode};
