//! Integration tests driving the playback engine end to end with a
//! scripted resolver and a recording audio sink.

use async_trait::async_trait;
use core_catalog::{
    AudioSource, CatalogError, PlayableAudio, RadioStation, Resolution, ResolvedTrack, Track,
    TrackId, TrackResolver,
};
use core_playback::{
    sink_channel, AudioSink, NowPlaying, PlaybackStatus, PlayerEngine, PlayerHandle,
    PlayerSnapshot, RepeatMode, SinkEvent, SinkEventSender, SinkSource,
};
use core_runtime::events::{CoreEvent, PlayerEvent};
use core_runtime::EventBus;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

// ----------------------------------------------------------------------
// Test doubles
// ----------------------------------------------------------------------

#[derive(Clone)]
enum Behavior {
    Remote { delay: Duration },
    Unavailable,
    Fail,
}

struct FakeResolver {
    behaviors: Mutex<HashMap<String, Behavior>>,
}

impl FakeResolver {
    fn new() -> Self {
        Self {
            behaviors: Mutex::new(HashMap::new()),
        }
    }

    fn set(&self, id: &str, behavior: Behavior) {
        self.behaviors.lock().insert(id.to_string(), behavior);
    }
}

#[async_trait]
impl TrackResolver for FakeResolver {
    async fn resolve(&self, id: &TrackId) -> core_catalog::Result<Resolution> {
        let behavior = self
            .behaviors
            .lock()
            .get(id.as_str())
            .cloned()
            .unwrap_or(Behavior::Remote {
                delay: Duration::ZERO,
            });

        match behavior {
            Behavior::Remote { delay } => {
                if delay > Duration::ZERO {
                    tokio::time::sleep(delay).await;
                }
                Ok(Resolution::Playable(ResolvedTrack {
                    track: track(id.as_str()),
                    audio: PlayableAudio::Remote(format!("https://cdn/{id}.mp3")),
                }))
            }
            Behavior::Unavailable => Ok(Resolution::Unavailable),
            Behavior::Fail => Err(CatalogError::UnexpectedStatus {
                status: 502,
                detail: "bad gateway".to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Load(String),
    Pause,
    Resume,
    Stop,
    Seek(Duration),
}

#[derive(Default)]
struct RecordingSink {
    calls: Mutex<Vec<Call>>,
}

impl RecordingSink {
    fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    fn load_count(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Load(_)))
            .count()
    }
}

#[async_trait]
impl AudioSink for RecordingSink {
    async fn load(&self, source: SinkSource, _start_at: Duration) -> core_playback::Result<()> {
        let label = match source {
            SinkSource::Url(url) => url,
            SinkSource::Blob(bytes) => format!("blob:{}", bytes.len()),
        };
        self.calls.lock().push(Call::Load(label));
        Ok(())
    }

    async fn pause(&self) -> core_playback::Result<()> {
        self.calls.lock().push(Call::Pause);
        Ok(())
    }

    async fn resume(&self) -> core_playback::Result<()> {
        self.calls.lock().push(Call::Resume);
        Ok(())
    }

    async fn stop(&self) -> core_playback::Result<()> {
        self.calls.lock().push(Call::Stop);
        Ok(())
    }

    async fn seek(&self, position: Duration) -> core_playback::Result<()> {
        self.calls.lock().push(Call::Seek(position));
        Ok(())
    }
}

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

fn track(id: &str) -> Track {
    Track {
        id: TrackId::from(id),
        title: format!("Track {id}"),
        artist: "Artist".to_string(),
        cover_url: None,
        duration_secs: 100,
        source: AudioSource::Remote {
            url: format!("https://cdn/{id}.mp3"),
        },
    }
}

fn station(id: &str) -> RadioStation {
    RadioStation {
        id: id.to_string(),
        name: format!("Station {id}"),
        genre: "jazz".to_string(),
        stream_url: format!("https://radio/{id}.m3u8"),
        image_url: None,
    }
}

struct Rig {
    handle: PlayerHandle,
    sink: Arc<RecordingSink>,
    sink_tx: SinkEventSender,
    resolver: Arc<FakeResolver>,
    bus: Arc<EventBus>,
}

fn rig() -> Rig {
    let resolver = Arc::new(FakeResolver::new());
    let sink = Arc::new(RecordingSink::default());
    let bus = Arc::new(EventBus::default());
    let (sink_tx, sink_rx) = sink_channel();
    let handle = PlayerEngine::spawn(
        Arc::clone(&resolver) as Arc<dyn TrackResolver>,
        Arc::clone(&sink) as Arc<dyn AudioSink>,
        sink_rx,
        Arc::clone(&bus),
    );
    Rig {
        handle,
        sink,
        sink_tx,
        resolver,
        bus,
    }
}

async fn wait_until<F>(rig: &Rig, what: &str, pred: F) -> PlayerSnapshot
where
    F: Fn(&PlayerSnapshot) -> bool,
{
    tokio::time::timeout(Duration::from_secs(3), async {
        loop {
            let snapshot = rig.handle.snapshot();
            if pred(&snapshot) {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for: {what}"))
}

fn current_track_id(snapshot: &PlayerSnapshot) -> Option<&str> {
    match &snapshot.now_playing {
        Some(NowPlaying::Track { id, .. }) => Some(id.as_str()),
        _ => None,
    }
}

fn playing(id: &str) -> impl Fn(&PlayerSnapshot) -> bool + '_ {
    move |s| s.status == PlaybackStatus::Playing && current_track_id(s) == Some(id)
}

// ----------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------

#[tokio::test]
async fn play_resolves_and_starts_the_track() {
    let rig = rig();
    rig.handle
        .play(track("a"), vec![track("a"), track("b")])
        .unwrap();

    let snapshot = wait_until(&rig, "track a playing", playing("a")).await;
    assert_eq!(snapshot.duration_secs, 100.0);
    assert!(rig
        .sink
        .calls()
        .contains(&Call::Load("https://cdn/a.mp3".to_string())));
}

#[tokio::test]
async fn queue_runs_to_the_end_then_goes_idle() {
    let rig = rig();
    let queue = vec![track("a"), track("b"), track("c")];
    rig.handle.play(track("a"), queue).unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    rig.handle.next().unwrap();
    wait_until(&rig, "b playing", playing("b")).await;

    rig.handle.next().unwrap();
    wait_until(&rig, "c playing", playing("c")).await;

    rig.handle.next().unwrap();
    let snapshot = wait_until(&rig, "idle after queue end", |s| {
        s.status == PlaybackStatus::Idle
    })
    .await;
    assert!(snapshot.now_playing.is_none());
    assert_eq!(snapshot.position_secs, 0.0);
}

#[tokio::test]
async fn prev_after_next_lands_back_in_issue_order() {
    let rig = rig();
    rig.handle
        .play(track("a"), vec![track("a"), track("b"), track("c")])
        .unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    // Issued back to back: must settle on "a", never interleave onto "c".
    rig.handle.next().unwrap();
    rig.handle.prev().unwrap();

    wait_until(&rig, "back on a", playing("a")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(current_track_id(&rig.handle.snapshot()), Some("a"));
}

#[tokio::test]
async fn later_play_wins_over_slower_resolution() {
    let rig = rig();
    rig.resolver.set(
        "slow",
        Behavior::Remote {
            delay: Duration::from_millis(200),
        },
    );

    rig.handle.play(track("slow"), vec![track("slow")]).unwrap();
    rig.handle.play(track("fast"), vec![track("fast")]).unwrap();

    wait_until(&rig, "fast playing", playing("fast")).await;

    // The slow resolution arrives afterwards and must be discarded.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(current_track_id(&rig.handle.snapshot()), Some("fast"));
}

#[tokio::test]
async fn unavailable_track_is_skipped() {
    let rig = rig();
    rig.resolver.set("b", Behavior::Unavailable);
    let mut events = rig.bus.subscribe();

    rig.handle
        .play(track("a"), vec![track("a"), track("b"), track("c")])
        .unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    rig.handle.next().unwrap();
    wait_until(&rig, "c playing after b skipped", playing("c")).await;

    let mut skipped = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Player(PlayerEvent::TrackSkipped { track_id, .. }) = event {
            assert_eq!(track_id, "b");
            skipped = true;
        }
    }
    assert!(skipped);
}

#[tokio::test]
async fn fully_unavailable_queue_reports_nothing_playable() {
    let rig = rig();
    rig.resolver.set("x", Behavior::Unavailable);
    rig.resolver.set("y", Behavior::Fail);
    let mut events = rig.bus.subscribe();

    rig.handle.play(track("x"), vec![track("x"), track("y")]).unwrap();

    wait_until(&rig, "idle after full pass", |s| {
        s.status == PlaybackStatus::Idle
    })
    .await;

    let mut nothing_playable = false;
    for _ in 0..100 {
        match events.try_recv() {
            Ok(CoreEvent::Player(PlayerEvent::NothingPlayable { attempted })) => {
                assert_eq!(attempted, 2);
                nothing_playable = true;
                break;
            }
            Ok(_) => continue,
            Err(_) => tokio::time::sleep(Duration::from_millis(10)).await,
        }
    }
    assert!(nothing_playable);
}

#[tokio::test]
async fn repeat_one_replays_the_current_track() {
    let rig = rig();
    rig.handle
        .play(track("a"), vec![track("a"), track("b")])
        .unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    // none → all → one
    rig.handle.toggle_repeat().unwrap();
    rig.handle.toggle_repeat().unwrap();
    wait_until(&rig, "repeat one", |s| s.repeat == RepeatMode::One).await;

    let loads_before = rig.sink.load_count();
    rig.handle.next().unwrap();

    tokio::time::timeout(Duration::from_secs(3), async {
        while rig.sink.load_count() <= loads_before {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("repeat-one must reload the same track");

    assert_eq!(current_track_id(&rig.handle.snapshot()), Some("a"));
}

#[tokio::test]
async fn track_end_behaves_like_next_honoring_repeat() {
    let rig = rig();
    rig.handle
        .play(track("a"), vec![track("a"), track("b")])
        .unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    rig.sink_tx.send(SinkEvent::Ended).unwrap();
    wait_until(&rig, "b playing after ended", playing("b")).await;

    // Repeat=all wraps from the last track back to the first.
    rig.handle.toggle_repeat().unwrap();
    wait_until(&rig, "repeat all", |s| s.repeat == RepeatMode::All).await;
    rig.sink_tx.send(SinkEvent::Ended).unwrap();
    wait_until(&rig, "wrapped to a", playing("a")).await;
}

#[tokio::test]
async fn toggle_pause_flips_without_moving_the_queue() {
    let rig = rig();
    rig.handle
        .play(track("a"), vec![track("a"), track("b")])
        .unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    rig.handle.toggle_play_pause().unwrap();
    let paused = wait_until(&rig, "paused", |s| s.status == PlaybackStatus::Paused).await;
    assert_eq!(current_track_id(&paused), Some("a"));

    rig.handle.toggle_play_pause().unwrap();
    wait_until(&rig, "resumed", playing("a")).await;

    let calls = rig.sink.calls();
    assert!(calls.contains(&Call::Pause));
    assert!(calls.contains(&Call::Resume));
}

#[tokio::test]
async fn seek_clamps_to_known_duration() {
    let rig = rig();
    rig.handle.play(track("a"), vec![track("a")]).unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    rig.handle.seek(Duration::from_secs(500)).unwrap();
    wait_until(&rig, "position clamped", |s| s.position_secs == 100.0).await;
    assert!(rig
        .sink
        .calls()
        .contains(&Call::Seek(Duration::from_secs(100))));
}

#[tokio::test]
async fn position_advances_from_sink_signal_only() {
    let rig = rig();
    rig.handle.play(track("a"), vec![track("a")]).unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    rig.sink_tx
        .send(SinkEvent::PositionChanged(Duration::from_secs(42)))
        .unwrap();
    wait_until(&rig, "position updated", |s| s.position_secs == 42.0).await;

    rig.sink_tx
        .send(SinkEvent::DurationKnown(Duration::from_secs(180)))
        .unwrap();
    wait_until(&rig, "duration updated", |s| s.duration_secs == 180.0).await;
}

#[tokio::test]
async fn radio_is_mutually_exclusive_with_tracks() {
    let rig = rig();
    rig.handle.play(track("a"), vec![track("a")]).unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    rig.handle.play_radio(station("r1")).unwrap();
    let snapshot = wait_until(&rig, "radio playing", |s| {
        matches!(s.now_playing, Some(NowPlaying::Radio { .. }))
    })
    .await;
    assert_eq!(snapshot.status, PlaybackStatus::Playing);
    assert_eq!(snapshot.duration_secs, 0.0);

    // The track session was released before the radio session started.
    let calls = rig.sink.calls();
    let stop_at = calls.iter().position(|c| *c == Call::Stop).unwrap();
    let radio_load = calls
        .iter()
        .position(|c| *c == Call::Load("https://radio/r1.m3u8".to_string()))
        .unwrap();
    assert!(stop_at < radio_load);

    // Radio is not seekable.
    assert!(matches!(
        rig.handle.seek(Duration::from_secs(10)),
        Err(core_playback::PlaybackError::SeekUnavailableInRadio)
    ));

    // And playing a track cleanly exits radio mode.
    rig.handle.play(track("b"), vec![track("b")]).unwrap();
    wait_until(&rig, "back to tracks", playing("b")).await;
}

#[tokio::test]
async fn sink_failure_degrades_to_idle_with_a_reason() {
    let rig = rig();
    let mut events = rig.bus.subscribe();
    rig.handle.play(track("a"), vec![track("a")]).unwrap();
    wait_until(&rig, "a playing", playing("a")).await;

    rig.sink_tx
        .send(SinkEvent::Failed("device lost".to_string()))
        .unwrap();
    wait_until(&rig, "idle after failure", |s| {
        s.status == PlaybackStatus::Idle
    })
    .await;

    let mut reported = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Player(PlayerEvent::Error { message }) = event {
            if message.contains("device lost") {
                reported = true;
            }
        }
    }
    assert!(reported);
}

#[tokio::test]
async fn every_transition_publishes_a_snapshot() {
    let rig = rig();
    let mut events = rig.bus.subscribe();

    rig.handle.play(track("a"), vec![track("a")]).unwrap();
    wait_until(&rig, "a playing", playing("a")).await;
    rig.handle.toggle_shuffle().unwrap();
    wait_until(&rig, "shuffle on", |s| s.shuffle).await;

    let mut snapshots = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Player(PlayerEvent::StateChanged { snapshot }) = event {
            snapshots.push(snapshot);
        }
    }

    // At least: playing transition and the shuffle toggle.
    assert!(snapshots.len() >= 2);
    assert!(snapshots.last().unwrap().shuffle);
}
