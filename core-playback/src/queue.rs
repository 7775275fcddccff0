//! Playback queue: the ordered working set the engine advances through.
//!
//! The queue is a snapshot taken when playback starts from some source
//! (search results, a playlist, the local library); mutating the source
//! afterwards never reaches into a running queue.
//!
//! Shuffle keeps the real indices: the permutation is generated over the
//! tracks not yet played in the current pass, with the current track
//! pinned first, and `next`/`prev` walk it instead of natural order.
//! Turning shuffle off simply drops the permutation, so playback resumes
//! from the current track's natural position.

use core_catalog::Track;
use core_runtime::events::RepeatMode;
use rand::seq::SliceRandom;

#[derive(Debug, Clone)]
pub struct PlaybackQueue {
    tracks: Vec<Track>,
    current: Option<usize>,
    /// Which indices have been played in the current pass.
    played: Vec<bool>,
    repeat: RepeatMode,
    shuffle: bool,
    /// Shuffle permutation over indices; empty while shuffle is off.
    order: Vec<usize>,
}

impl Default for PlaybackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackQueue {
    pub fn new() -> Self {
        Self {
            tracks: Vec::new(),
            current: None,
            played: Vec::new(),
            repeat: RepeatMode::None,
            shuffle: false,
            order: Vec::new(),
        }
    }

    /// Replace the queue with a fresh snapshot, keeping the repeat and
    /// shuffle settings.
    pub fn start(&mut self, tracks: Vec<Track>, start_index: usize) {
        self.current = if tracks.is_empty() {
            None
        } else {
            Some(start_index.min(tracks.len() - 1))
        };
        self.played = vec![false; tracks.len()];
        self.tracks = tracks;
        self.rebuild_order();
    }

    pub fn current(&self) -> Option<&Track> {
        self.current.and_then(|i| self.tracks.get(i))
    }

    pub fn current_index(&self) -> Option<usize> {
        self.current
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn repeat(&self) -> RepeatMode {
        self.repeat
    }

    pub fn set_repeat(&mut self, mode: RepeatMode) {
        self.repeat = mode;
    }

    pub fn shuffle(&self) -> bool {
        self.shuffle
    }

    /// Toggle shuffle. Activation generates a permutation of the
    /// not-yet-played tracks; deactivation resumes natural order from the
    /// current track's natural position.
    pub fn set_shuffle(&mut self, on: bool) {
        if self.shuffle == on {
            return;
        }
        self.shuffle = on;
        self.rebuild_order();
    }

    /// Advance to the next track.
    ///
    /// Repeat-one returns the current track unchanged; repeat-all wraps
    /// past the end (respecting the shuffle permutation); repeat-none
    /// returns `None` at the end and leaves the position in place.
    pub fn next(&mut self) -> Option<&Track> {
        if self.repeat == RepeatMode::One {
            return self.current();
        }
        self.advance_forward()
    }

    /// Positional advance that ignores repeat-one. Used when the current
    /// track turned out to be unplayable: repeat-one must not pin the
    /// queue on a track that cannot load.
    pub fn force_next(&mut self) -> Option<&Track> {
        self.advance_forward()
    }

    /// Step back to the previous track.
    ///
    /// Repeat-one returns the current track unchanged; repeat-none returns
    /// `None` at the start; repeat-all wraps to the last track.
    pub fn prev(&mut self) -> Option<&Track> {
        if self.repeat == RepeatMode::One {
            return self.current();
        }

        let cur = self.current?;
        let target = if self.shuffle && !self.order.is_empty() {
            let pos = self.order.iter().position(|&i| i == cur)?;
            if pos > 0 {
                Some(self.order[pos - 1])
            } else if self.repeat == RepeatMode::All {
                self.order.last().copied()
            } else {
                None
            }
        } else if cur > 0 {
            Some(cur - 1)
        } else if self.repeat == RepeatMode::All {
            Some(self.tracks.len() - 1)
        } else {
            None
        }?;

        self.current = Some(target);
        self.tracks.get(target)
    }

    fn advance_forward(&mut self) -> Option<&Track> {
        let cur = self.current?;
        if let Some(flag) = self.played.get_mut(cur) {
            *flag = true;
        }

        let target = if self.shuffle && !self.order.is_empty() {
            let pos = self.order.iter().position(|&i| i == cur)?;
            if pos + 1 < self.order.len() {
                Some(self.order[pos + 1])
            } else if self.repeat == RepeatMode::All {
                // Wrap to the head of the same permutation; a new pass
                // begins.
                self.begin_new_pass();
                self.order.first().copied()
            } else {
                None
            }
        } else if cur + 1 < self.tracks.len() {
            Some(cur + 1)
        } else if self.repeat == RepeatMode::All {
            self.begin_new_pass();
            Some(0)
        } else {
            None
        }?;

        self.current = Some(target);
        self.tracks.get(target)
    }

    fn begin_new_pass(&mut self) {
        self.played = vec![false; self.tracks.len()];
    }

    fn rebuild_order(&mut self) {
        if !self.shuffle || self.tracks.is_empty() {
            self.order.clear();
            return;
        }

        let mut remaining: Vec<usize> = (0..self.tracks.len())
            .filter(|&i| Some(i) != self.current && !self.played.get(i).copied().unwrap_or(false))
            .collect();
        remaining.shuffle(&mut rand::rng());

        self.order = self.current.into_iter().chain(remaining).collect();
    }
}
