//! Linear sample rate conversion
//!
//! Runs once per track on the loader thread. Linear interpolation is cheap
//! enough to convert a full track in well under a second and keeps the
//! converted buffer sample-aligned with the source (no filter delay).

/// Resample interleaved audio from `src_rate` to `dst_rate`
///
/// Destination frame `i` reads source position `p = i * src_rate / dst_rate`
/// and interpolates linearly between frames `floor(p)` and `floor(p) + 1`,
/// clamping the latter to the last source frame. The output holds
/// `round(src_frames * dst_rate / src_rate)` frames.
///
/// Equal rates return an unchanged copy.
pub fn resample(samples: &[f32], channels: usize, src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate {
        return samples.to_vec();
    }
    if channels == 0 || src_rate == 0 || dst_rate == 0 {
        return Vec::new();
    }

    let src_frames = samples.len() / channels;
    if src_frames == 0 {
        return Vec::new();
    }

    let dst_frames = output_frame_count(src_frames, src_rate, dst_rate);
    let step = src_rate as f64 / dst_rate as f64;
    let last = src_frames - 1;

    let mut out = Vec::with_capacity(dst_frames * channels);
    for i in 0..dst_frames {
        let position = i as f64 * step;
        let idx = (position.floor() as usize).min(last);
        let frac = (position - idx as f64).clamp(0.0, 1.0) as f32;
        let next = (idx + 1).min(last);

        let a = &samples[idx * channels..(idx + 1) * channels];
        let b = &samples[next * channels..(next + 1) * channels];
        out.extend(a.iter().zip(b).map(|(&a, &b)| a * (1.0 - frac) + b * frac));
    }

    out
}

/// `round(src_frames * dst_rate / src_rate)` in integer arithmetic
fn output_frame_count(src_frames: usize, src_rate: u32, dst_rate: u32) -> usize {
    let numerator = src_frames as u128 * dst_rate as u128;
    let src_rate = src_rate as u128;
    ((numerator + src_rate / 2) / src_rate) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_equal_rates_are_identity() {
        let input: Vec<f32> = (0..64).map(|i| (i as f32 * 0.37).sin()).collect();
        assert_eq!(resample(&input, 2, 44_100, 44_100), input);
    }

    #[test]
    fn test_48k_to_44k1_constant_signal() {
        let input = vec![0.5f32; 480 * 2];
        let output = resample(&input, 2, 48_000, 44_100);

        assert_eq!(output.len(), 441 * 2);
        for (i, s) in output.iter().enumerate() {
            assert!((s - 0.5).abs() < 1e-6, "sample {} = {}", i, s);
        }
    }

    #[test]
    fn test_upsample_interpolates_between_frames() {
        // Mono ramp 0, 1, 2, 3 at 2x rate
        let output = resample(&[0.0, 1.0, 2.0, 3.0], 1, 22_050, 44_100);

        assert_eq!(output.len(), 8);
        let expected = [0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.0];
        for (i, (got, want)) in output.iter().zip(expected).enumerate() {
            assert!((got - want).abs() < 1e-6, "frame {}: {} != {}", i, got, want);
        }
    }

    #[test]
    fn test_channels_stay_separate() {
        // Left constant 1.0, right constant -1.0
        let input: Vec<f32> = (0..100).flat_map(|_| [1.0, -1.0]).collect();
        let output = resample(&input, 2, 44_100, 48_000);

        assert_eq!(output.len(), 109 * 2);
        for frame in output.chunks_exact(2) {
            assert!((frame[0] - 1.0).abs() < 1e-6);
            assert!((frame[1] + 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(resample(&[], 2, 48_000, 44_100).is_empty());
        assert!(resample(&[0.1, 0.2], 0, 48_000, 44_100).is_empty());
    }

    #[test]
    fn test_output_length_rounds() {
        assert_eq!(output_frame_count(480, 48_000, 44_100), 441);
        assert_eq!(output_frame_count(1, 48_000, 44_100), 1);
        assert_eq!(output_frame_count(100, 44_100, 48_000), 109);
    }
}
