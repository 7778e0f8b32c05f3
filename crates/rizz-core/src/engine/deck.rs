//! Deck - looping track player
//!
//! A deck owns a shared pointer to an immutable [`Track`] plus its transport
//! state. Only the audio thread touches a `Deck`; control threads drive it
//! through [`EngineCommand`](super::EngineCommand)s and observe it through
//! [`DeckAtomics`].

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use basedrop::Shared;

use super::atomic_float::AtomicF32;
use crate::audio_file::Track;
use crate::types::StereoSample;

/// Slowest playback speed ratio
pub const MIN_SPEED: f64 = 0.5;

/// Fastest playback speed ratio
pub const MAX_SPEED: f64 = 2.0;

/// Lock-free playback state for control-side access
///
/// The audio thread writes these after every state change and after every
/// pull. All operations use `Ordering::Relaxed`; readers only need
/// eventual visibility, not ordering with other memory.
#[derive(Debug)]
pub struct DeckAtomics {
    /// Current playhead position in frames
    position: AtomicU64,
    /// Length of the loaded track in frames (0 = empty deck)
    length: AtomicU64,
    playing: AtomicBool,
    speed: AtomicF32,
}

impl DeckAtomics {
    pub fn new() -> Self {
        Self {
            position: AtomicU64::new(0),
            length: AtomicU64::new(0),
            playing: AtomicBool::new(false),
            speed: AtomicF32::new(1.0),
        }
    }

    /// Current position in frames
    #[inline]
    pub fn position(&self) -> u64 {
        self.position.load(Ordering::Relaxed)
    }

    /// Track length in frames
    #[inline]
    pub fn length(&self) -> u64 {
        self.length.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn has_track(&self) -> bool {
        self.length() > 0
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed.load()
    }
}

impl Default for DeckAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// A single playback slot
pub struct Deck {
    track: Option<Shared<Track>>,
    /// Integer playhead in frames, always < frame count when a track is loaded
    position: usize,
    /// Sub-frame phase in [0, 1) for non-unity speeds
    fraction: f64,
    playing: bool,
    speed: f64,
    atomics: Arc<DeckAtomics>,
}

impl Default for Deck {
    fn default() -> Self {
        Self::new()
    }
}

impl Deck {
    pub fn new() -> Self {
        Self {
            track: None,
            position: 0,
            fraction: 0.0,
            playing: false,
            speed: 1.0,
            atomics: Arc::new(DeckAtomics::new()),
        }
    }

    /// Shared state handle for the control side
    pub fn atomics(&self) -> Arc<DeckAtomics> {
        Arc::clone(&self.atomics)
    }

    #[inline]
    fn sync_position_atomic(&self) {
        self.atomics
            .position
            .store(self.position as u64, Ordering::Relaxed);
    }

    #[inline]
    fn sync_state_atomics(&self) {
        self.atomics.playing.store(self.playing, Ordering::Relaxed);
        self.atomics.speed.store(self.speed as f32);
        let length = self.track.as_ref().map_or(0, |t| t.frame_count());
        self.atomics.length.store(length as u64, Ordering::Relaxed);
        self.sync_position_atomic();
    }

    /// Swap in a new track and rewind
    ///
    /// The previous track pointer is returned so the caller decides where it
    /// is dropped; dropping a `Shared` on the audio thread only enqueues it
    /// for the collector. Play state is kept.
    pub fn load_track(&mut self, track: Shared<Track>) -> Option<Shared<Track>> {
        let previous = self.track.replace(track);
        self.position = 0;
        self.fraction = 0.0;
        self.sync_state_atomics();
        previous
    }

    /// Remove the track; the deck falls silent
    pub fn unload_track(&mut self) -> Option<Shared<Track>> {
        let previous = self.track.take();
        self.position = 0;
        self.fraction = 0.0;
        self.playing = false;
        self.sync_state_atomics();
        previous
    }

    pub fn has_track(&self) -> bool {
        self.track.as_ref().is_some_and(|t| !t.is_empty())
    }

    pub fn track(&self) -> Option<&Track> {
        self.track.as_deref()
    }

    fn frame_count(&self) -> usize {
        self.track.as_ref().map_or(0, |t| t.frame_count())
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn play(&mut self) {
        self.playing = true;
        self.sync_state_atomics();
    }

    pub fn pause(&mut self) {
        self.playing = false;
        self.sync_state_atomics();
    }

    /// Pause and return to the start
    pub fn stop(&mut self) {
        self.playing = false;
        self.position = 0;
        self.fraction = 0.0;
        self.sync_state_atomics();
    }

    /// Jump to `frame`, wrapping past the end of the track
    pub fn seek(&mut self, frame: u64) {
        let frames = self.frame_count() as u64;
        self.position = if frames == 0 { 0 } else { (frame % frames) as usize };
        self.fraction = 0.0;
        self.sync_position_atomic();
    }

    /// Move by `delta` frames, clamped to the track (no wrap)
    pub fn nudge(&mut self, delta: i64) {
        let frames = self.frame_count();
        if frames == 0 {
            return;
        }
        let target = (self.position as i64).saturating_add(delta);
        self.position = target.clamp(0, frames as i64 - 1) as usize;
        self.fraction = 0.0;
        self.sync_position_atomic();
    }

    /// Set the playback speed ratio, clamped to [`MIN_SPEED`, `MAX_SPEED`]
    ///
    /// Non-finite ratios are ignored.
    pub fn set_speed(&mut self, ratio: f64) {
        if !ratio.is_finite() {
            return;
        }
        self.speed = ratio.clamp(MIN_SPEED, MAX_SPEED);
        self.sync_state_atomics();
    }

    /// Fill `out` with the next `out.len()` frames (real-time safe)
    ///
    /// Reads loop around the end of the track. With no track, an empty track
    /// or a paused deck the output is silence and the position is unchanged.
    /// At speed 1.0 frame `i` is exactly track frame `(position + i) mod len`;
    /// other speeds step a fractional accumulator and interpolate linearly
    /// between neighbouring (looped) frames.
    pub fn pull(&mut self, out: &mut [StereoSample]) {
        let track = match &self.track {
            Some(track) if self.playing && !track.is_empty() => track,
            _ => {
                out.fill(StereoSample::silence());
                return;
            }
        };

        let frames = track.frame_count();
        let mut position = self.position % frames;
        let mut fraction = self.fraction;
        let speed = self.speed;

        for slot in out.iter_mut() {
            let current = track.frame(position);
            *slot = if fraction > 0.0 {
                let next = track.frame((position + 1) % frames);
                let t = fraction as f32;
                current * (1.0 - t) + next * t
            } else {
                current
            };

            fraction += speed;
            let whole = fraction.floor();
            fraction -= whole;
            position = (position + whole as usize) % frames;
        }

        self.position = position;
        self.fraction = fraction;
        self.sync_position_atomic();
    }
}
