//! Soft-knee compressor
//!
//! Stateless per-sample gain curve:
//!
//! ```text
//! |x| < T              passthrough
//! T <= |x| < T + K     ratio ramps 1 -> R across the knee
//! |x| >= T + K         T + (|x| - T) / R
//! ```
//!
//! with `T = clipping_threshold * 0.8` and `K = 0.1`. Sign is preserved.

/// Compression starts at this fraction of the clipping threshold
pub const THRESHOLD_SCALE: f32 = 0.8;

/// Width of the knee above the compression threshold
pub const KNEE_WIDTH: f32 = 0.1;

/// Apply the soft-knee curve to one sample
#[inline]
pub fn soft_knee(x: f32, clipping_threshold: f32, ratio: f32) -> f32 {
    let threshold = clipping_threshold * THRESHOLD_SCALE;
    let magnitude = x.abs();

    if magnitude < threshold {
        return x;
    }

    let excess = magnitude - threshold;
    let compressed = if magnitude < threshold + KNEE_WIDTH {
        let knee_ratio = 1.0 + (ratio - 1.0) * (excess / KNEE_WIDTH);
        threshold + excess / knee_ratio
    } else {
        threshold + excess / ratio
    };

    compressed.copysign(x)
}
