//! Metering stages: peak hold, RMS and clip detection
//!
//! None of these modify audio. They only observe the post-limiter signal and
//! keep state the control plane reads through [`super::MeterAtomics`].

use super::window::SampleWindow;
use crate::types::StereoSample;

/// Per-sample decay applied to the held peak
pub const PEAK_DECAY: f32 = 0.99;

/// Default RMS window in frames (10ms at 44.1kHz)
pub const DEFAULT_RMS_WINDOW_SAMPLES: usize = 441;

/// Exponential-decay peak hold
#[derive(Debug, Clone, Default)]
pub struct PeakDetector {
    level: f32,
}

impl PeakDetector {
    #[inline]
    pub fn process(&mut self, frame: StereoSample) {
        self.level = (self.level * PEAK_DECAY).max(frame.peak());
    }

    pub fn level(&self) -> f32 {
        self.level
    }
}

/// Sliding-window RMS of the per-frame peak
#[derive(Debug, Clone)]
pub struct RmsMonitor {
    window: SampleWindow,
    level: f32,
}

impl RmsMonitor {
    pub fn new(window_samples: usize) -> Self {
        Self {
            window: SampleWindow::new(window_samples),
            level: 0.0,
        }
    }

    #[inline]
    pub fn process(&mut self, frame: StereoSample) {
        self.window.push(frame.peak());
        self.level = self.window.rms();
    }

    pub fn level(&self) -> f32 {
        self.level
    }
}

impl Default for RmsMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_RMS_WINDOW_SAMPLES)
    }
}

/// Threshold-crossing indicator with rising-edge counting
#[derive(Debug, Clone, Default)]
pub struct ClipIndicator {
    clipping: bool,
    events: u64,
}

impl ClipIndicator {
    /// Update from the current clip state; returns true on a false→true edge
    #[inline]
    pub fn update(&mut self, clipping: bool) -> bool {
        let rising = clipping && !self.clipping;
        if rising {
            self.events = self.events.wrapping_add(1);
        }
        self.clipping = clipping;
        rising
    }

    pub fn is_clipping(&self) -> bool {
        self.clipping
    }

    /// Number of false→true transitions seen so far
    pub fn events(&self) -> u64 {
        self.events
    }
}

/// True when either channel sits at or beyond the threshold
#[inline]
pub fn exceeds_threshold(frame: StereoSample, threshold: f32) -> bool {
    frame.left.abs() >= threshold || frame.right.abs() >= threshold
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_peak_holds_and_decays() {
        let mut peak = PeakDetector::default();
        peak.process(StereoSample::new(0.2, -0.8));
        assert_eq!(peak.level(), 0.8);

        peak.process(StereoSample::silence());
        assert!((peak.level() - 0.8 * PEAK_DECAY).abs() < 1e-7);

        // A louder frame replaces the decayed hold immediately
        peak.process(StereoSample::mono(0.9));
        assert_eq!(peak.level(), 0.9);
    }

    #[test]
    fn test_rms_converges_to_constant_amplitude() {
        let mut rms = RmsMonitor::new(DEFAULT_RMS_WINDOW_SAMPLES);
        for _ in 0..DEFAULT_RMS_WINDOW_SAMPLES * 3 {
            rms.process(StereoSample::new(0.9, 0.1));
        }
        for _ in 0..DEFAULT_RMS_WINDOW_SAMPLES {
            rms.process(StereoSample::new(-0.3, 0.2));
        }
        assert!((rms.level() - 0.3).abs() < 1e-6, "rms = {}", rms.level());
    }

    #[test]
    fn test_clip_indicator_counts_rising_edges() {
        let mut clip = ClipIndicator::default();
        assert!(!clip.update(false));
        assert!(clip.update(true));
        assert!(!clip.update(true));
        assert!(!clip.update(false));
        assert!(clip.update(true));

        assert!(clip.is_clipping());
        assert_eq!(clip.events(), 2);
    }

    #[test]
    fn test_exceeds_threshold_is_inclusive() {
        assert!(exceeds_threshold(StereoSample::new(0.9, 0.0), 0.9));
        assert!(exceeds_threshold(StereoSample::new(0.0, -0.95), 0.9));
        assert!(!exceeds_threshold(StereoSample::new(0.89, -0.89), 0.9));
    }
}
