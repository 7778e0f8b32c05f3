//! Look-ahead and brickwall limiting
//!
//! The look-ahead stage tracks the peak of the last `capacity` frames and
//! scales the current frame so that peak would sit exactly at the threshold.
//! Because the window remembers recent peaks, gain recovers gradually as a
//! transient ages out instead of snapping back on the next sample.
//!
//! The brickwall stage is the final guarantee: each channel is hard-clamped.

use super::window::MaxWindow;
use crate::types::StereoSample;

/// Default look-ahead window in frames
pub const DEFAULT_LOOK_AHEAD_SAMPLES: usize = 512;

/// Peak-window limiter
#[derive(Debug, Clone)]
pub struct LookAheadLimiter {
    peaks: MaxWindow,
}

impl LookAheadLimiter {
    pub fn new(look_ahead_samples: usize) -> Self {
        Self {
            peaks: MaxWindow::new(look_ahead_samples),
        }
    }

    /// Push the frame's peak and return the frame scaled by the window gain
    #[inline]
    pub fn process(&mut self, frame: StereoSample, threshold: f32) -> StereoSample {
        self.peaks.push(frame.peak());

        let peak = self.peaks.max();
        if peak > threshold {
            frame * (threshold / peak)
        } else {
            frame
        }
    }
}

impl Default for LookAheadLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_LOOK_AHEAD_SAMPLES)
    }
}

/// Clamp each channel to `[-threshold, threshold]`
#[inline]
pub fn brickwall(frame: StereoSample, threshold: f32) -> StereoSample {
    StereoSample::new(
        frame.left.clamp(-threshold, threshold),
        frame.right.clamp(-threshold, threshold),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quiet_signal_untouched() {
        let mut limiter = LookAheadLimiter::new(16);
        for _ in 0..64 {
            let out = limiter.process(StereoSample::new(0.5, -0.4), 0.9);
            assert_eq!(out, StereoSample::new(0.5, -0.4));
        }
    }

    #[test]
    fn test_peak_is_pulled_to_threshold() {
        let mut limiter = LookAheadLimiter::new(16);
        let out = limiter.process(StereoSample::new(1.8, -0.9), 0.9);
        assert!((out.left - 0.9).abs() < 1e-6);
        assert!((out.right + 0.45).abs() < 1e-6);
    }

    #[test]
    fn test_gain_held_until_peak_ages_out() {
        let mut limiter = LookAheadLimiter::new(4);
        limiter.process(StereoSample::mono(1.8), 0.9);

        // Next 3 frames still see the 1.8 peak in the window
        for i in 0..3 {
            let out = limiter.process(StereoSample::mono(0.6), 0.9);
            assert!((out.left - 0.3).abs() < 1e-6, "frame {}: {}", i, out.left);
        }

        // Peak evicted: unity gain again
        let out = limiter.process(StereoSample::mono(0.6), 0.9);
        assert_eq!(out.left, 0.6);
    }

    #[test]
    fn test_brickwall_clamps_exactly() {
        let out = brickwall(StereoSample::new(1.5, -3.0), 0.9);
        assert_eq!(out, StereoSample::new(0.9, -0.9));

        let inside = brickwall(StereoSample::new(0.3, -0.89), 0.9);
        assert_eq!(inside, StereoSample::new(0.3, -0.89));
    }

    #[test]
    fn test_brickwall_any_overshoot_maps_to_threshold() {
        for threshold in [0.1f32, 0.5, 0.95, 1.0] {
            for x in [threshold + 1e-3, 2.0, 100.0] {
                let out = brickwall(StereoSample::new(x, -x), threshold);
                assert_eq!(out.left, threshold);
                assert_eq!(out.right, -threshold);
            }
        }
    }
}
