//! Playback engine: the state machine that turns queue plus user intent
//! into the single authoritative "now playing" state.
//!
//! ## Actor model
//!
//! The engine runs as one task owning all mutable state. Transport
//! commands arrive on a channel and are applied strictly in issue order,
//! which is what makes `next()` immediately followed by `prev()` land on
//! the right track even though the I/O they trigger is asynchronous.
//!
//! Track loading is staged: resolution runs in a spawned task tagged with
//! a load generation, and a result that arrives for a stale generation is
//! discarded on arrival. Two back-to-back `play()` calls therefore settle
//! on the later command, not on whichever resolution happened to finish
//! last.
//!
//! ## Modes
//!
//! Exactly one of idle, track playback or radio playback holds at any
//! time. Entering track or radio mode stops and releases the other's
//! audio session first. Radio is the restricted branch: not seekable, no
//! queue, no repeat/shuffle participation.

use crate::error::{PlaybackError, Result};
use crate::queue::PlaybackQueue;
use crate::sink::{AudioSink, SinkEvent, SinkEventReceiver, SinkSource};
use core_catalog::{
    CatalogError, PlayableAudio, RadioStation, Resolution, ResolvedTrack, Track, TrackId,
    TrackResolver,
};
use core_runtime::events::{
    CoreEvent, NowPlaying, PlaybackStatus, PlayerEvent, PlayerSnapshot,
};
use core_runtime::EventBus;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

// ============================================================================
// Commands & handle
// ============================================================================

#[derive(Debug)]
enum Command {
    Play {
        track: Track,
        context: Vec<Track>,
        resume_at: Option<Duration>,
    },
    PlayRadio {
        station: RadioStation,
    },
    TogglePlayPause,
    Seek {
        position: Duration,
    },
    Next,
    Prev,
    ToggleRepeat,
    ToggleShuffle,
    Stop,
}

#[derive(Debug)]
enum Internal {
    Resolved {
        seq: u64,
        id: TrackId,
        attempts: usize,
        resume_at: Option<Duration>,
        outcome: std::result::Result<Resolution, CatalogError>,
    },
}

/// Cloneable handle to the engine.
///
/// Commands are fire-and-forget: they enqueue in issue order and the
/// resulting state arrives through the event bus (and [`snapshot`]). The
/// only synchronous failures are "engine gone" and the radio seek guard.
///
/// [`snapshot`]: PlayerHandle::snapshot
#[derive(Clone)]
pub struct PlayerHandle {
    commands: mpsc::UnboundedSender<Command>,
    shared: Arc<RwLock<PlayerSnapshot>>,
}

impl PlayerHandle {
    /// Load and play a track, snapshotting its surrounding list as the new
    /// queue. If the track is not part of `context`, it plays as a
    /// single-track queue.
    pub fn play(&self, track: Track, context: Vec<Track>) -> Result<()> {
        self.send(Command::Play {
            track,
            context,
            resume_at: None,
        })
    }

    /// Like [`play`](Self::play), starting from a resume offset.
    pub fn play_from(&self, track: Track, context: Vec<Track>, resume_at: Duration) -> Result<()> {
        self.send(Command::Play {
            track,
            context,
            resume_at: Some(resume_at),
        })
    }

    /// Enter radio mode with the given station.
    pub fn play_radio(&self, station: RadioStation) -> Result<()> {
        self.send(Command::PlayRadio { station })
    }

    /// Flip playing/paused without touching the queue position.
    pub fn toggle_play_pause(&self) -> Result<()> {
        self.send(Command::TogglePlayPause)
    }

    /// Jump to a position in the current track; clamped to the known
    /// duration by the engine.
    ///
    /// # Errors
    ///
    /// [`PlaybackError::SeekUnavailableInRadio`] when radio is playing.
    pub fn seek(&self, position: Duration) -> Result<()> {
        if matches!(
            self.shared.read().now_playing,
            Some(NowPlaying::Radio { .. })
        ) {
            return Err(PlaybackError::SeekUnavailableInRadio);
        }
        self.send(Command::Seek { position })
    }

    pub fn next(&self) -> Result<()> {
        self.send(Command::Next)
    }

    pub fn prev(&self) -> Result<()> {
        self.send(Command::Prev)
    }

    /// Cycle repeat: none → all → one → none.
    pub fn toggle_repeat(&self) -> Result<()> {
        self.send(Command::ToggleRepeat)
    }

    /// Flip shuffle, regenerating the permutation on activation.
    pub fn toggle_shuffle(&self) -> Result<()> {
        self.send(Command::ToggleShuffle)
    }

    /// Stop playback and go idle.
    pub fn stop(&self) -> Result<()> {
        self.send(Command::Stop)
    }

    /// Latest published state.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.shared.read().clone()
    }

    fn send(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| PlaybackError::EngineClosed)
    }
}

// ============================================================================
// Engine
// ============================================================================

enum Mode {
    Idle,
    Track {
        current: ResolvedTrack,
        paused: bool,
    },
    Radio {
        station: RadioStation,
        paused: bool,
    },
}

/// The engine actor. Constructed and spawned via [`PlayerEngine::spawn`];
/// the returned handle is the only way in.
pub struct PlayerEngine {
    resolver: Arc<dyn TrackResolver>,
    sink: Arc<dyn AudioSink>,
    event_bus: Arc<EventBus>,
    queue: PlaybackQueue,
    mode: Mode,
    position: Duration,
    duration: Duration,
    /// Generation counter for in-flight loads; stale resolutions are
    /// dropped on arrival.
    load_seq: u64,
    internal_tx: mpsc::UnboundedSender<Internal>,
    shared: Arc<RwLock<PlayerSnapshot>>,
}

impl PlayerEngine {
    /// Spawn the engine task.
    ///
    /// `sink_events` is the receiving half of the channel the host's audio
    /// device pushes [`SinkEvent`]s into. The engine stops when every
    /// handle is dropped.
    pub fn spawn(
        resolver: Arc<dyn TrackResolver>,
        sink: Arc<dyn AudioSink>,
        sink_events: SinkEventReceiver,
        event_bus: Arc<EventBus>,
    ) -> PlayerHandle {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();
        let shared = Arc::new(RwLock::new(PlayerSnapshot::idle()));

        let engine = Self {
            resolver,
            sink,
            event_bus,
            queue: PlaybackQueue::new(),
            mode: Mode::Idle,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            load_seq: 0,
            internal_tx,
            shared: Arc::clone(&shared),
        };

        tokio::spawn(engine.run(command_rx, internal_rx, sink_events));

        PlayerHandle {
            commands: command_tx,
            shared,
        }
    }

    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut internal: mpsc::UnboundedReceiver<Internal>,
        mut sink_events: SinkEventReceiver,
    ) {
        self.publish();

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    // Every handle dropped: shut down.
                    None => break,
                },
                Some(event) = internal.recv() => self.handle_internal(event).await,
                Some(event) = sink_events.recv() => self.handle_sink_event(event).await,
            }
        }

        let _ = self.sink.stop().await;
        info!("playback engine stopped");
    }

    // ------------------------------------------------------------------
    // Command handling
    // ------------------------------------------------------------------

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Play {
                track,
                context,
                resume_at,
            } => {
                let position = context.iter().position(|t| t.id == track.id);
                let (tracks, start_index) = match position {
                    Some(index) => (context, index),
                    None => (vec![track.clone()], 0),
                };
                self.queue.start(tracks, start_index);
                let id = track.id.clone();
                self.begin_load(id, 0, resume_at);
            }
            Command::PlayRadio { station } => self.start_radio(station).await,
            Command::TogglePlayPause => self.toggle_play_pause().await,
            Command::Seek { position } => self.seek(position).await,
            Command::Next => self.advance(Direction::Forward).await,
            Command::Prev => self.advance(Direction::Backward).await,
            Command::ToggleRepeat => {
                self.queue.set_repeat(self.queue.repeat().next());
                self.publish();
            }
            Command::ToggleShuffle => {
                self.queue.set_shuffle(!self.queue.shuffle());
                self.publish();
            }
            Command::Stop => {
                self.enter_idle().await;
                self.publish();
            }
        }
    }

    async fn start_radio(&mut self, station: RadioStation) {
        // Invalidate pending track loads and release the track session:
        // the two playback branches never overlap.
        self.load_seq += 1;
        if matches!(self.mode, Mode::Track { .. } | Mode::Radio { .. }) {
            let _ = self.sink.stop().await;
        }

        self.position = Duration::ZERO;
        self.duration = Duration::ZERO;

        match self
            .sink
            .load(SinkSource::Url(station.stream_url.clone()), Duration::ZERO)
            .await
        {
            Ok(()) => {
                info!(station = %station.id, "radio session started");
                self.mode = Mode::Radio {
                    station,
                    paused: false,
                };
            }
            Err(e) => {
                warn!(error = %e, "radio load failed");
                self.emit(PlayerEvent::Error {
                    message: format!("radio failed to start: {e}"),
                });
                self.mode = Mode::Idle;
            }
        }
        self.publish();
    }

    async fn toggle_play_pause(&mut self) {
        let result = match &mut self.mode {
            Mode::Idle => return,
            Mode::Track { paused, .. } | Mode::Radio { paused, .. } => {
                let resuming = *paused;
                let call = if resuming {
                    self.sink.resume().await
                } else {
                    self.sink.pause().await
                };
                if call.is_ok() {
                    *paused = !resuming;
                }
                call
            }
        };

        if let Err(e) = result {
            self.emit(PlayerEvent::Error {
                message: format!("pause toggle failed: {e}"),
            });
        }
        self.publish();
    }

    async fn seek(&mut self, position: Duration) {
        match &self.mode {
            Mode::Track { .. } => {
                let clamped = if self.duration > Duration::ZERO {
                    position.min(self.duration)
                } else {
                    position
                };
                match self.sink.seek(clamped).await {
                    Ok(()) => self.position = clamped,
                    Err(e) => self.emit(PlayerEvent::Error {
                        message: format!("seek failed: {e}"),
                    }),
                }
                self.publish();
            }
            // The handle already guards this; a race is answered with an
            // error event instead of a state change.
            Mode::Radio { .. } => self.emit(PlayerEvent::Error {
                message: PlaybackError::SeekUnavailableInRadio.to_string(),
            }),
            Mode::Idle => {}
        }
    }

    async fn advance(&mut self, direction: Direction) {
        if matches!(self.mode, Mode::Radio { .. }) {
            // Queue transport does not apply to radio.
            return;
        }

        // Repeat-one overrides queue advancement entirely: replay the
        // current track rather than consulting positional logic.
        if self.queue.repeat() == core_runtime::events::RepeatMode::One {
            if let Some(current) = self.queue.current() {
                let id = current.id.clone();
                self.begin_load(id, 0, None);
                return;
            }
        }

        let target = match direction {
            Direction::Forward => self.queue.next().cloned(),
            Direction::Backward => self.queue.prev().cloned(),
        };

        match target {
            Some(track) => self.begin_load(track.id, 0, None),
            None => {
                debug!("queue exhausted, going idle");
                self.enter_idle().await;
                self.publish();
            }
        }
    }

    // ------------------------------------------------------------------
    // Load pipeline
    // ------------------------------------------------------------------

    fn begin_load(&mut self, id: TrackId, attempts: usize, resume_at: Option<Duration>) {
        self.load_seq += 1;
        let seq = self.load_seq;
        let resolver = Arc::clone(&self.resolver);
        let tx = self.internal_tx.clone();

        tokio::spawn(async move {
            let outcome = resolver.resolve(&id).await;
            let _ = tx.send(Internal::Resolved {
                seq,
                id,
                attempts,
                resume_at,
                outcome,
            });
        });
    }

    async fn handle_internal(&mut self, event: Internal) {
        let Internal::Resolved {
            seq,
            id,
            attempts,
            resume_at,
            outcome,
        } = event;

        if seq != self.load_seq {
            // A newer command superseded this load; its result is
            // discarded on arrival.
            debug!(%id, seq, current = self.load_seq, "dropping stale resolution");
            return;
        }

        match outcome {
            Ok(Resolution::Playable(resolved)) => self.start_session(resolved, resume_at).await,
            Ok(Resolution::Unavailable) => {
                self.emit(PlayerEvent::TrackSkipped {
                    track_id: id.to_string(),
                    reason: "no playable source".to_string(),
                });
                self.skip_forward(attempts).await;
            }
            Err(e) => {
                self.emit(PlayerEvent::TrackSkipped {
                    track_id: id.to_string(),
                    reason: e.to_string(),
                });
                self.skip_forward(attempts).await;
            }
        }
    }

    /// Try the next queue position after an unplayable track, bounded by
    /// one full queue pass.
    async fn skip_forward(&mut self, attempts: usize) {
        let attempted = attempts + 1;
        if attempted >= self.queue.len().max(1) {
            warn!(attempted, "no playable track in a full queue pass");
            self.emit(PlayerEvent::NothingPlayable { attempted });
            self.enter_idle().await;
            self.publish();
            return;
        }

        match self.queue.force_next().cloned() {
            Some(track) => self.begin_load(track.id, attempted, None),
            None => {
                self.emit(PlayerEvent::NothingPlayable { attempted });
                self.enter_idle().await;
                self.publish();
            }
        }
    }

    async fn start_session(&mut self, resolved: ResolvedTrack, resume_at: Option<Duration>) {
        if matches!(self.mode, Mode::Radio { .. }) {
            let _ = self.sink.stop().await;
        }

        let start_at = resume_at.unwrap_or(Duration::ZERO);
        let source = match &resolved.audio {
            PlayableAudio::Local(bytes) => SinkSource::Blob(bytes.clone()),
            PlayableAudio::Remote(url) => SinkSource::Url(url.clone()),
        };

        match self.sink.load(source, start_at).await {
            Ok(()) => {
                info!(
                    id = %resolved.track.id,
                    origin = resolved.track.source.origin_tag(),
                    "track session started"
                );
                self.position = start_at;
                self.duration = Duration::from_secs(u64::from(resolved.track.duration_secs));
                self.mode = Mode::Track {
                    current: resolved,
                    paused: false,
                };
            }
            Err(e) => {
                warn!(id = %resolved.track.id, error = %e, "sink load failed");
                self.emit(PlayerEvent::Error {
                    message: format!("failed to load track: {e}"),
                });
                self.enter_idle().await;
            }
        }
        self.publish();
    }

    // ------------------------------------------------------------------
    // Sink events
    // ------------------------------------------------------------------

    async fn handle_sink_event(&mut self, event: SinkEvent) {
        match event {
            SinkEvent::PositionChanged(position) => {
                if !matches!(self.mode, Mode::Idle) {
                    self.position = position;
                    self.publish();
                }
            }
            SinkEvent::DurationKnown(duration) => {
                if matches!(self.mode, Mode::Track { .. }) {
                    self.duration = duration;
                    self.publish();
                }
            }
            SinkEvent::Ended => match self.mode {
                // Track end behaves exactly like an explicit next().
                Mode::Track { .. } => self.advance(Direction::Forward).await,
                Mode::Radio { .. } => {
                    self.enter_idle().await;
                    self.publish();
                }
                Mode::Idle => {}
            },
            SinkEvent::Failed(message) => {
                warn!(message, "sink reported failure");
                self.emit(PlayerEvent::Error {
                    message: format!("playback failed: {message}"),
                });
                self.enter_idle().await;
                self.publish();
            }
        }
    }

    // ------------------------------------------------------------------
    // State plumbing
    // ------------------------------------------------------------------

    async fn enter_idle(&mut self) {
        self.load_seq += 1;
        if !matches!(self.mode, Mode::Idle) {
            let _ = self.sink.stop().await;
        }
        self.mode = Mode::Idle;
        self.position = Duration::ZERO;
        self.duration = Duration::ZERO;
    }

    fn emit(&self, event: PlayerEvent) {
        self.event_bus.emit(CoreEvent::Player(event));
    }

    /// Publish the authoritative state: update the shared copy, then
    /// notify observers. Called after every transition.
    fn publish(&self) {
        let (status, now_playing) = match &self.mode {
            Mode::Idle => (PlaybackStatus::Idle, None),
            Mode::Track { current, paused } => {
                let status = if *paused {
                    PlaybackStatus::Paused
                } else {
                    PlaybackStatus::Playing
                };
                let track = &current.track;
                (
                    status,
                    Some(NowPlaying::Track {
                        id: track.id.to_string(),
                        title: track.title.clone(),
                        artist: track.artist.clone(),
                        origin: track.source.origin_tag().to_string(),
                    }),
                )
            }
            Mode::Radio { station, paused } => {
                let status = if *paused {
                    PlaybackStatus::Paused
                } else {
                    PlaybackStatus::Playing
                };
                (
                    status,
                    Some(NowPlaying::Radio {
                        id: station.id.clone(),
                        name: station.name.clone(),
                        genre: station.genre.clone(),
                    }),
                )
            }
        };

        let snapshot = PlayerSnapshot {
            status,
            now_playing,
            position_secs: self.position.as_secs_f64(),
            duration_secs: self.duration.as_secs_f64(),
            repeat: self.queue.repeat(),
            shuffle: self.queue.shuffle(),
        };

        *self.shared.write() = snapshot.clone();
        self.emit(PlayerEvent::StateChanged { snapshot });
    }
}

#[derive(Debug, Clone, Copy)]
enum Direction {
    Forward,
    Backward,
}
