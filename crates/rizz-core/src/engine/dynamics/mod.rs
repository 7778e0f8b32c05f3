//! Master dynamics chain
//!
//! Seven stages run per frame on the mixed signal, in fixed order:
//!
//! 1. Soft-knee compressor
//! 2. Look-ahead limiter
//! 3. Brickwall limiter
//! 4. Peak detector (metering)
//! 5. RMS monitor (metering)
//! 6. Clipping indicator (metering)
//! 7. Auto gain reduction
//!
//! The whole chain is bypassed unless the clipping-protection master switch
//! is on; each stage also has its own enable flag. All stage state lives in
//! [`DynamicsChain`] on the audio thread and persists across blocks.
//!
//! # Parameter publication
//!
//! Control threads write [`DynamicsParams`] (atomics, no locks). The render
//! path takes a [`DynamicsSettings`] snapshot once per block. The eight enable
//! flags share a single `AtomicU8`, so a snapshot never sees half a flag update.
//!
//! Meter results flow the other way through [`MeterAtomics`], stored once
//! per block.

mod auto_gain;
mod compressor;
mod limiter;
mod meters;
mod window;

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};

use serde::{Deserialize, Serialize};

pub use auto_gain::AutoGain;
pub use compressor::{soft_knee, KNEE_WIDTH, THRESHOLD_SCALE};
pub use limiter::{brickwall, LookAheadLimiter, DEFAULT_LOOK_AHEAD_SAMPLES};
pub use meters::{ClipIndicator, PeakDetector, RmsMonitor, DEFAULT_RMS_WINDOW_SAMPLES};

use super::atomic_float::AtomicF32;
use crate::types::StereoSample;

/// Valid range for the clipping threshold (lower bound keeps gain math finite)
pub const MIN_CLIPPING_THRESHOLD: f32 = 0.01;
pub const MAX_CLIPPING_THRESHOLD: f32 = 1.0;

/// Valid range for the compressor ratio
pub const MIN_COMPRESSOR_RATIO: f32 = 1.0;
pub const MAX_COMPRESSOR_RATIO: f32 = 100.0;

/// Valid range for limiter attack/release times
pub const MIN_LIMITER_TIME_SECONDS: f32 = 0.0001;
pub const MAX_LIMITER_TIME_SECONDS: f32 = 5.0;

/// Individually switchable parts of the chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DynamicsStage {
    /// Master switch: when off, the whole chain is bypassed
    ClippingProtection,
    PeakDetection,
    SoftKneeCompressor,
    LookAheadLimiter,
    RmsMonitoring,
    AutoGainReduction,
    BrickwallLimiter,
    ClippingIndicator,
}

impl DynamicsStage {
    pub const ALL: [DynamicsStage; 8] = [
        DynamicsStage::ClippingProtection,
        DynamicsStage::PeakDetection,
        DynamicsStage::SoftKneeCompressor,
        DynamicsStage::LookAheadLimiter,
        DynamicsStage::RmsMonitoring,
        DynamicsStage::AutoGainReduction,
        DynamicsStage::BrickwallLimiter,
        DynamicsStage::ClippingIndicator,
    ];

    #[inline]
    fn bit(self) -> u8 {
        1 << self as u8
    }

    pub fn name(&self) -> &'static str {
        match self {
            DynamicsStage::ClippingProtection => "clipping-protection",
            DynamicsStage::PeakDetection => "peak-detection",
            DynamicsStage::SoftKneeCompressor => "soft-knee-compressor",
            DynamicsStage::LookAheadLimiter => "look-ahead-limiter",
            DynamicsStage::RmsMonitoring => "rms-monitoring",
            DynamicsStage::AutoGainReduction => "auto-gain-reduction",
            DynamicsStage::BrickwallLimiter => "brickwall-limiter",
            DynamicsStage::ClippingIndicator => "clipping-indicator",
        }
    }
}

/// Plain-value dynamics configuration
///
/// Doubles as the per-block snapshot the renderer works from and as the
/// `dynamics` section of the engine config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicsSettings {
    pub clipping_protection: bool,
    pub peak_detection: bool,
    pub soft_knee_compressor: bool,
    pub look_ahead_limiter: bool,
    pub rms_monitoring: bool,
    pub auto_gain_reduction: bool,
    pub brickwall_limiter: bool,
    pub clipping_indicator: bool,
    /// Ceiling for the limiters, in (0, 1]
    pub clipping_threshold: f32,
    /// Compression ratio above the knee, >= 1
    pub compressor_ratio: f32,
    pub limiter_attack_seconds: f32,
    pub limiter_release_seconds: f32,
}

impl Default for DynamicsSettings {
    fn default() -> Self {
        Self {
            clipping_protection: true,
            peak_detection: true,
            soft_knee_compressor: true,
            look_ahead_limiter: true,
            rms_monitoring: true,
            auto_gain_reduction: false,
            brickwall_limiter: true,
            clipping_indicator: true,
            clipping_threshold: 0.95,
            compressor_ratio: 4.0,
            limiter_attack_seconds: 0.005,
            limiter_release_seconds: 0.05,
        }
    }
}

impl DynamicsSettings {
    pub fn is_enabled(&self, stage: DynamicsStage) -> bool {
        match stage {
            DynamicsStage::ClippingProtection => self.clipping_protection,
            DynamicsStage::PeakDetection => self.peak_detection,
            DynamicsStage::SoftKneeCompressor => self.soft_knee_compressor,
            DynamicsStage::LookAheadLimiter => self.look_ahead_limiter,
            DynamicsStage::RmsMonitoring => self.rms_monitoring,
            DynamicsStage::AutoGainReduction => self.auto_gain_reduction,
            DynamicsStage::BrickwallLimiter => self.brickwall_limiter,
            DynamicsStage::ClippingIndicator => self.clipping_indicator,
        }
    }

    pub fn set_enabled(&mut self, stage: DynamicsStage, enabled: bool) {
        let flag = match stage {
            DynamicsStage::ClippingProtection => &mut self.clipping_protection,
            DynamicsStage::PeakDetection => &mut self.peak_detection,
            DynamicsStage::SoftKneeCompressor => &mut self.soft_knee_compressor,
            DynamicsStage::LookAheadLimiter => &mut self.look_ahead_limiter,
            DynamicsStage::RmsMonitoring => &mut self.rms_monitoring,
            DynamicsStage::AutoGainReduction => &mut self.auto_gain_reduction,
            DynamicsStage::BrickwallLimiter => &mut self.brickwall_limiter,
            DynamicsStage::ClippingIndicator => &mut self.clipping_indicator,
        };
        *flag = enabled;
    }

    /// All settings with only `stages` enabled and default parameters
    pub fn only(stages: &[DynamicsStage]) -> Self {
        let mut settings = Self::default();
        for stage in DynamicsStage::ALL {
            settings.set_enabled(stage, stages.contains(&stage));
        }
        settings
    }

    fn flag_bits(&self) -> u8 {
        DynamicsStage::ALL
            .iter()
            .filter(|stage| self.is_enabled(**stage))
            .fold(0, |bits, stage| bits | stage.bit())
    }

    /// Bring every numeric parameter into its documented range
    pub fn clamped(mut self) -> Self {
        self.clipping_threshold = clamp_finite(
            self.clipping_threshold,
            MIN_CLIPPING_THRESHOLD,
            MAX_CLIPPING_THRESHOLD,
            Self::default().clipping_threshold,
        );
        self.compressor_ratio = clamp_finite(
            self.compressor_ratio,
            MIN_COMPRESSOR_RATIO,
            MAX_COMPRESSOR_RATIO,
            Self::default().compressor_ratio,
        );
        self.limiter_attack_seconds = clamp_finite(
            self.limiter_attack_seconds,
            MIN_LIMITER_TIME_SECONDS,
            MAX_LIMITER_TIME_SECONDS,
            Self::default().limiter_attack_seconds,
        );
        self.limiter_release_seconds = clamp_finite(
            self.limiter_release_seconds,
            MIN_LIMITER_TIME_SECONDS,
            MAX_LIMITER_TIME_SECONDS,
            Self::default().limiter_release_seconds,
        );
        self
    }
}

fn clamp_finite(value: f32, min: f32, max: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Lock-free dynamics parameters shared between control and audio threads
#[derive(Debug)]
pub struct DynamicsParams {
    flags: AtomicU8,
    clipping_threshold: AtomicF32,
    compressor_ratio: AtomicF32,
    limiter_attack_seconds: AtomicF32,
    limiter_release_seconds: AtomicF32,
}

impl DynamicsParams {
    pub fn new(settings: DynamicsSettings) -> Self {
        let settings = settings.clamped();
        Self {
            flags: AtomicU8::new(settings.flag_bits()),
            clipping_threshold: AtomicF32::new(settings.clipping_threshold),
            compressor_ratio: AtomicF32::new(settings.compressor_ratio),
            limiter_attack_seconds: AtomicF32::new(settings.limiter_attack_seconds),
            limiter_release_seconds: AtomicF32::new(settings.limiter_release_seconds),
        }
    }

    pub fn set_enabled(&self, stage: DynamicsStage, enabled: bool) {
        if enabled {
            self.flags.fetch_or(stage.bit(), Ordering::Relaxed);
        } else {
            self.flags.fetch_and(!stage.bit(), Ordering::Relaxed);
        }
    }

    pub fn is_enabled(&self, stage: DynamicsStage) -> bool {
        self.flags.load(Ordering::Relaxed) & stage.bit() != 0
    }

    /// Values are expected to be range-checked by the caller
    pub fn set_clipping_threshold(&self, value: f32) {
        self.clipping_threshold.store(value);
    }

    pub fn set_compressor_ratio(&self, value: f32) {
        self.compressor_ratio.store(value);
    }

    pub fn set_limiter_attack_seconds(&self, value: f32) {
        self.limiter_attack_seconds.store(value);
    }

    pub fn set_limiter_release_seconds(&self, value: f32) {
        self.limiter_release_seconds.store(value);
    }

    /// Read all parameters at once (call once per block)
    pub fn snapshot(&self) -> DynamicsSettings {
        let flags = self.flags.load(Ordering::Relaxed);
        let on = |stage: DynamicsStage| flags & stage.bit() != 0;
        DynamicsSettings {
            clipping_protection: on(DynamicsStage::ClippingProtection),
            peak_detection: on(DynamicsStage::PeakDetection),
            soft_knee_compressor: on(DynamicsStage::SoftKneeCompressor),
            look_ahead_limiter: on(DynamicsStage::LookAheadLimiter),
            rms_monitoring: on(DynamicsStage::RmsMonitoring),
            auto_gain_reduction: on(DynamicsStage::AutoGainReduction),
            brickwall_limiter: on(DynamicsStage::BrickwallLimiter),
            clipping_indicator: on(DynamicsStage::ClippingIndicator),
            clipping_threshold: self.clipping_threshold.load(),
            compressor_ratio: self.compressor_ratio.load(),
            limiter_attack_seconds: self.limiter_attack_seconds.load(),
            limiter_release_seconds: self.limiter_release_seconds.load(),
        }
    }
}

impl Default for DynamicsParams {
    fn default() -> Self {
        Self::new(DynamicsSettings::default())
    }
}

/// Meter readings published by the audio thread
///
/// Written once per block with relaxed stores, read from any thread.
#[derive(Debug)]
pub struct MeterAtomics {
    peak_level: AtomicF32,
    rms_level: AtomicF32,
    clipping: AtomicBool,
    clip_events: AtomicU64,
    auto_gain_factor: AtomicF32,
}

impl MeterAtomics {
    pub fn new() -> Self {
        Self {
            peak_level: AtomicF32::new(0.0),
            rms_level: AtomicF32::new(0.0),
            clipping: AtomicBool::new(false),
            clip_events: AtomicU64::new(0),
            auto_gain_factor: AtomicF32::new(1.0),
        }
    }

    /// Exponential-decay peak of the processed output
    pub fn peak_level(&self) -> f32 {
        self.peak_level.load()
    }

    pub fn rms_level(&self) -> f32 {
        self.rms_level.load()
    }

    pub fn is_clipping(&self) -> bool {
        self.clipping.load(Ordering::Relaxed)
    }

    /// Count of not-clipping → clipping transitions since start
    pub fn clip_events(&self) -> u64 {
        self.clip_events.load(Ordering::Relaxed)
    }

    pub fn auto_gain_factor(&self) -> f32 {
        self.auto_gain_factor.load()
    }

    fn publish(&self, chain: &DynamicsChain, settings: &DynamicsSettings) {
        self.peak_level.store(chain.peak.level());
        self.rms_level.store(chain.rms.level());
        self.clipping.store(
            settings.clipping_indicator && chain.clip.is_clipping(),
            Ordering::Relaxed,
        );
        self.clip_events.store(chain.clip.events(), Ordering::Relaxed);
        self.auto_gain_factor.store(chain.auto_gain.factor());
    }

    /// Readings for a block that skipped the chain
    ///
    /// Nothing was measured, so levels read 0, the clip light is off and no
    /// gain reduction is applied. The event count is cumulative and kept.
    /// Chain state is untouched and shows again once protection is back on.
    pub(crate) fn publish_bypass(&self) {
        self.peak_level.store(0.0);
        self.rms_level.store(0.0);
        self.clipping.store(false, Ordering::Relaxed);
        self.auto_gain_factor.store(1.0);
    }
}

impl Default for MeterAtomics {
    fn default() -> Self {
        Self::new()
    }
}

/// Runtime state of every stage (audio thread only)
#[derive(Debug, Clone)]
pub struct DynamicsChain {
    look_ahead: LookAheadLimiter,
    peak: PeakDetector,
    rms: RmsMonitor,
    clip: ClipIndicator,
    auto_gain: AutoGain,
}

impl DynamicsChain {
    /// Allocate stage buffers; the only allocation the chain ever makes
    pub fn new(look_ahead_samples: usize, rms_window_samples: usize) -> Self {
        Self {
            look_ahead: LookAheadLimiter::new(look_ahead_samples),
            peak: PeakDetector::default(),
            rms: RmsMonitor::new(rms_window_samples),
            clip: ClipIndicator::default(),
            auto_gain: AutoGain::new(),
        }
    }

    /// Run one frame through the enabled stages
    ///
    /// Callers skip this entirely when clipping protection is off.
    #[inline]
    pub fn process_frame(&mut self, frame: StereoSample, settings: &DynamicsSettings) -> StereoSample {
        let threshold = settings.clipping_threshold;
        let mut frame = frame;

        if settings.soft_knee_compressor {
            frame = StereoSample::new(
                soft_knee(frame.left, threshold, settings.compressor_ratio),
                soft_knee(frame.right, threshold, settings.compressor_ratio),
            );
        }

        if settings.look_ahead_limiter {
            frame = self.look_ahead.process(frame, threshold);
        }

        if settings.brickwall_limiter {
            frame = brickwall(frame, threshold);
        }

        if settings.peak_detection {
            self.peak.process(frame);
        }

        if settings.rms_monitoring {
            self.rms.process(frame);
        }

        let clipping = meters::exceeds_threshold(frame, threshold);
        if settings.clipping_indicator {
            self.clip.update(clipping);
        }

        if settings.auto_gain_reduction {
            frame *= self.auto_gain.process(clipping);
        }

        frame
    }

    /// Process a block in place and publish the resulting meter state
    pub fn process_block(
        &mut self,
        frames: &mut [StereoSample],
        settings: &DynamicsSettings,
        meters: &MeterAtomics,
    ) {
        for frame in frames.iter_mut() {
            *frame = self.process_frame(*frame, settings);
        }
        meters.publish(self, settings);
    }

    pub fn peak_level(&self) -> f32 {
        self.peak.level()
    }

    pub fn rms_level(&self) -> f32 {
        self.rms.level()
    }

    pub fn is_clipping(&self) -> bool {
        self.clip.is_clipping()
    }

    pub fn auto_gain_factor(&self) -> f32 {
        self.auto_gain.factor()
    }
}

impl Default for DynamicsChain {
    fn default() -> Self {
        Self::new(DEFAULT_LOOK_AHEAD_SAMPLES, DEFAULT_RMS_WINDOW_SAMPLES)
    }
}
