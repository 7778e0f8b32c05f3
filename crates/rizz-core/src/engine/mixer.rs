//! Bus mixer with crossfader
//!
//! Signal flow per frame:
//!
//! ```text
//! deck 0 ──► × deck gain ──► left bus  ──► × left crossfader gain  ─┐
//!                                                                    ├─► Σ × master ──► dynamics ──► out
//! deck 1 ──► × deck gain ──► right bus ──► × right crossfader gain ─┘
//! ```
//!
//! Crossfader law (literal, not constant-power): with `cf` in [-1, 1],
//! `left = curve(1 - max(0, cf))` and `right = curve(1 + min(0, cf))`.
//! Both buses are fully open at centre.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::atomic_float::AtomicF32;
use super::dynamics::{DynamicsChain, DynamicsParams, DynamicsSettings, MeterAtomics};
use crate::types::{Bus, StereoBuffer, StereoSample, NUM_DECKS};

/// Upper bound for deck and master gain (+6dB)
pub const MAX_GAIN: f32 = 2.0;

/// Deck gain ceiling while the volume cap is engaged
pub const DECK_VOLUME_CAP: f32 = 1.0;

/// Shape applied to crossfader bus gains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum CrossfaderCurve {
    #[default]
    Linear = 0,
    Exponential = 1,
    Logarithmic = 2,
    SCurve = 3,
}

impl CrossfaderCurve {
    pub const ALL: [CrossfaderCurve; 4] = [
        CrossfaderCurve::Linear,
        CrossfaderCurve::Exponential,
        CrossfaderCurve::Logarithmic,
        CrossfaderCurve::SCurve,
    ];

    fn from_u8(value: u8) -> Self {
        match value {
            1 => CrossfaderCurve::Exponential,
            2 => CrossfaderCurve::Logarithmic,
            3 => CrossfaderCurve::SCurve,
            _ => CrossfaderCurve::Linear,
        }
    }

    /// Map a bus opening `x` in [0, 1] to a gain
    #[inline]
    pub fn apply(self, x: f32) -> f32 {
        match self {
            CrossfaderCurve::Linear => x,
            CrossfaderCurve::Exponential => x * x,
            CrossfaderCurve::Logarithmic => x.sqrt(),
            CrossfaderCurve::SCurve => {
                if x < 0.5 {
                    2.0 * x * x
                } else {
                    1.0 - 2.0 * (1.0 - x) * (1.0 - x)
                }
            }
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            CrossfaderCurve::Linear => "linear",
            CrossfaderCurve::Exponential => "exponential",
            CrossfaderCurve::Logarithmic => "logarithmic",
            CrossfaderCurve::SCurve => "s-curve",
        }
    }

    /// Parse a curve name as accepted on the command line
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "linear" => Some(CrossfaderCurve::Linear),
            "exponential" | "exp" => Some(CrossfaderCurve::Exponential),
            "logarithmic" | "log" => Some(CrossfaderCurve::Logarithmic),
            "s-curve" | "scurve" | "s" => Some(CrossfaderCurve::SCurve),
            _ => None,
        }
    }
}

/// Left and right bus gains for a crossfader position
///
/// `position` is clamped to [-1, 1]; -1 is fully left.
#[inline]
pub fn crossfader_gains(position: f32, curve: CrossfaderCurve) -> (f32, f32) {
    let position = position.clamp(-1.0, 1.0);
    let left = curve.apply(1.0 - position.max(0.0));
    let right = curve.apply(1.0 + position.min(0.0));
    (left, right)
}

/// Initial mixer state, as read from the config file
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MixerSettings {
    pub deck_gain: [f32; NUM_DECKS],
    pub master_gain: f32,
    pub crossfader: f32,
    pub curve: CrossfaderCurve,
    pub deck_volume_cap: bool,
}

impl Default for MixerSettings {
    fn default() -> Self {
        Self {
            deck_gain: [1.0; NUM_DECKS],
            master_gain: 1.0,
            crossfader: 0.0,
            curve: CrossfaderCurve::Linear,
            deck_volume_cap: false,
        }
    }
}

/// Per-block copy of every mixer parameter
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixerSnapshot {
    pub deck_gain: [f32; NUM_DECKS],
    pub master_gain: f32,
    pub crossfader: f32,
    pub curve: CrossfaderCurve,
    pub deck_volume_cap: bool,
    pub dynamics: DynamicsSettings,
}

impl MixerSnapshot {
    /// Effective gain for a deck after the optional volume cap
    #[inline]
    pub fn effective_deck_gain(&self, deck: usize) -> f32 {
        let gain = self.deck_gain[deck];
        if self.deck_volume_cap {
            gain.min(DECK_VOLUME_CAP)
        } else {
            gain
        }
    }
}

/// Lock-free mixer parameters
///
/// Written by control threads, read once per block by the audio thread.
/// Setters store what they are given; range checks happen at the control
/// surface.
#[derive(Debug)]
pub struct MixerParams {
    deck_gain: [AtomicF32; NUM_DECKS],
    master_gain: AtomicF32,
    crossfader: AtomicF32,
    curve: AtomicU8,
    deck_volume_cap: AtomicBool,
    dynamics: DynamicsParams,
}

impl MixerParams {
    pub fn new(mixer: MixerSettings, dynamics: DynamicsSettings) -> Self {
        Self {
            deck_gain: mixer.deck_gain.map(AtomicF32::new),
            master_gain: AtomicF32::new(mixer.master_gain),
            crossfader: AtomicF32::new(mixer.crossfader.clamp(-1.0, 1.0)),
            curve: AtomicU8::new(mixer.curve as u8),
            deck_volume_cap: AtomicBool::new(mixer.deck_volume_cap),
            dynamics: DynamicsParams::new(dynamics),
        }
    }

    /// Deck gain; out-of-range decks read as 0
    pub fn deck_gain(&self, deck: usize) -> f32 {
        self.deck_gain.get(deck).map_or(0.0, AtomicF32::load)
    }

    /// Returns false for an out-of-range deck
    pub fn set_deck_gain(&self, deck: usize, gain: f32) -> bool {
        match self.deck_gain.get(deck) {
            Some(cell) => {
                cell.store(gain);
                true
            }
            None => false,
        }
    }

    pub fn master_gain(&self) -> f32 {
        self.master_gain.load()
    }

    pub fn set_master_gain(&self, gain: f32) {
        self.master_gain.store(gain);
    }

    pub fn crossfader(&self) -> f32 {
        self.crossfader.load()
    }

    pub fn set_crossfader(&self, position: f32) {
        self.crossfader.store(position);
    }

    pub fn curve(&self) -> CrossfaderCurve {
        CrossfaderCurve::from_u8(self.curve.load(Ordering::Relaxed))
    }

    pub fn set_curve(&self, curve: CrossfaderCurve) {
        self.curve.store(curve as u8, Ordering::Relaxed);
    }

    pub fn deck_volume_cap(&self) -> bool {
        self.deck_volume_cap.load(Ordering::Relaxed)
    }

    pub fn set_deck_volume_cap(&self, enabled: bool) {
        self.deck_volume_cap.store(enabled, Ordering::Relaxed);
    }

    pub fn dynamics(&self) -> &DynamicsParams {
        &self.dynamics
    }

    pub fn snapshot(&self) -> MixerSnapshot {
        MixerSnapshot {
            deck_gain: std::array::from_fn(|deck| self.deck_gain[deck].load()),
            master_gain: self.master_gain.load(),
            crossfader: self.crossfader.load(),
            curve: self.curve(),
            deck_volume_cap: self.deck_volume_cap(),
            dynamics: self.dynamics.snapshot(),
        }
    }
}

impl Default for MixerParams {
    fn default() -> Self {
        Self::new(MixerSettings::default(), DynamicsSettings::default())
    }
}

/// Audio-thread mixer: bus composition plus the dynamics chain
pub struct Mixer {
    dynamics: DynamicsChain,
    meters: Arc<MeterAtomics>,
}

impl Mixer {
    pub fn new(look_ahead_samples: usize, rms_window_samples: usize) -> Self {
        Self {
            dynamics: DynamicsChain::new(look_ahead_samples, rms_window_samples),
            meters: Arc::new(MeterAtomics::new()),
        }
    }

    /// Shared meter readings for the control side
    pub fn meter_atomics(&self) -> Arc<MeterAtomics> {
        Arc::clone(&self.meters)
    }

    /// Mix deck buffers into `out`
    ///
    /// `out` must already have its working length set; deck buffers are read
    /// up to that length.
    pub fn process(
        &mut self,
        decks: &[StereoBuffer; NUM_DECKS],
        params: &MixerSnapshot,
        out: &mut StereoBuffer,
    ) {
        let (left_gain, right_gain) = crossfader_gains(params.crossfader, params.curve);

        let deck_gains: [f32; NUM_DECKS] =
            std::array::from_fn(|deck| params.effective_deck_gain(deck));

        for (i, frame) in out.as_mut_slice().iter_mut().enumerate() {
            let mut left_bus = StereoSample::silence();
            let mut right_bus = StereoSample::silence();

            for (deck, buffer) in decks.iter().enumerate() {
                let Some(&sample) = buffer.as_slice().get(i) else {
                    continue;
                };
                match Bus::for_deck(deck) {
                    Some(Bus::Left) => left_bus += sample * deck_gains[deck],
                    Some(Bus::Right) => right_bus += sample * deck_gains[deck],
                    None => {}
                }
            }

            *frame = (left_bus * left_gain + right_bus * right_gain) * params.master_gain;
        }

        if params.dynamics.clipping_protection {
            self.dynamics
                .process_block(out.as_mut_slice(), &params.dynamics, &self.meters);
        } else {
            self.meters.publish_bypass();
        }
    }
}
