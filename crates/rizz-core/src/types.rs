//! Common types for Rizz
//!
//! This module contains the fundamental audio types used throughout the
//! engine: stereo samples, pre-allocated stereo buffers and the deck-to-bus
//! assignment.

/// Canonical sample rate every deck is resampled to at load time (44.1kHz)
pub const CANONICAL_SAMPLE_RATE: u32 = 44_100;

/// Number of decks in the mixer
pub const NUM_DECKS: usize = 2;

/// Audio sample type (32-bit float, normalized to [-1.0, 1.0])
pub type Sample = f32;

/// A single stereo sample (left and right channels)
///
/// Uses `#[repr(C)]` to ensure predictable memory layout: [left, right].
/// This enables zero-copy conversion between `&[StereoSample]` and `&[f32]`
/// (interleaved format) using bytemuck.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct StereoSample {
    pub left: Sample,
    pub right: Sample,
}

impl StereoSample {
    /// Create a new stereo sample
    #[inline]
    pub fn new(left: Sample, right: Sample) -> Self {
        Self { left, right }
    }

    /// Create a silent stereo sample
    #[inline]
    pub fn silence() -> Self {
        Self::default()
    }

    /// Create a mono sample (same value in both channels)
    #[inline]
    pub fn mono(value: Sample) -> Self {
        Self { left: value, right: value }
    }

    /// Get the peak amplitude (max of abs(left), abs(right))
    #[inline]
    pub fn peak(&self) -> Sample {
        self.left.abs().max(self.right.abs())
    }
}

impl std::ops::Add for StereoSample {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            left: self.left + other.left,
            right: self.right + other.right,
        }
    }
}

impl std::ops::AddAssign for StereoSample {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.left += other.left;
        self.right += other.right;
    }
}

impl std::ops::Mul<Sample> for StereoSample {
    type Output = Self;

    #[inline]
    fn mul(self, factor: Sample) -> Self {
        Self {
            left: self.left * factor,
            right: self.right * factor,
        }
    }
}

impl std::ops::MulAssign<Sample> for StereoSample {
    #[inline]
    fn mul_assign(&mut self, factor: Sample) {
        self.left *= factor;
        self.right *= factor;
    }
}

/// A buffer of stereo samples
///
/// Render-path buffers are allocated once at engine construction and then
/// only resized within their capacity via [`StereoBuffer::set_len_from_capacity`].
#[derive(Debug, Clone, Default)]
pub struct StereoBuffer {
    samples: Vec<StereoSample>,
}

impl StereoBuffer {
    /// Create a buffer filled with silence
    pub fn silence(len: usize) -> Self {
        Self {
            samples: vec![StereoSample::silence(); len],
        }
    }

    /// Create a buffer from an existing Vec of StereoSamples
    pub fn from_vec(samples: Vec<StereoSample>) -> Self {
        Self { samples }
    }

    /// Get the number of stereo samples in the buffer
    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if the buffer is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Number of frames the buffer can hold without reallocating
    #[inline]
    pub fn capacity(&self) -> usize {
        self.samples.capacity()
    }

    /// Set the working length of a pre-allocated buffer (real-time safe)
    ///
    /// Callers must keep `new_len <= capacity()`; growing fills the newly
    /// exposed frames with silence.
    #[inline]
    pub fn set_len_from_capacity(&mut self, new_len: usize) {
        let current_len = self.samples.len();
        if new_len > current_len {
            debug_assert!(
                new_len <= self.samples.capacity(),
                "set_len_from_capacity called with len > capacity"
            );
            self.samples.resize(new_len, StereoSample::silence());
        } else {
            self.samples.truncate(new_len);
        }
    }

    /// Get a slice of the samples
    #[inline]
    pub fn as_slice(&self) -> &[StereoSample] {
        &self.samples
    }

    /// Get a mutable slice of the samples
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [StereoSample] {
        &mut self.samples
    }

    /// Zero-copy view of the samples as interleaved f32 [L, R, L, R, ...]
    #[inline]
    pub fn as_interleaved(&self) -> &[Sample] {
        bytemuck::cast_slice(&self.samples)
    }

    /// Get an iterator over the samples
    pub fn iter(&self) -> impl Iterator<Item = &StereoSample> {
        self.samples.iter()
    }
}

/// Logical mixer bus a deck feeds before crossfader gain is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bus {
    Left,
    Right,
}

impl Bus {
    /// Fixed deck assignment: deck 0 feeds the left bus, deck 1 the right bus
    pub fn for_deck(deck: usize) -> Option<Self> {
        match deck {
            0 => Some(Bus::Left),
            1 => Some(Bus::Right),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stereo_sample_ops() {
        let a = StereoSample::new(0.5, -0.25);
        let b = StereoSample::mono(0.25);
        assert_eq!(a + b, StereoSample::new(0.75, 0.0));
        assert_eq!(a * 2.0, StereoSample::new(1.0, -0.5));
        assert_eq!(a.peak(), 0.5);

        let mut c = a;
        c += b;
        c *= 0.5;
        assert_eq!(c, StereoSample::new(0.375, 0.0));
    }

    #[test]
    fn test_set_len_from_capacity_keeps_allocation() {
        let mut buf = StereoBuffer::silence(64);
        let capacity = buf.capacity();

        buf.set_len_from_capacity(16);
        assert_eq!(buf.len(), 16);
        buf.set_len_from_capacity(64);
        assert_eq!(buf.len(), 64);
        assert_eq!(buf.capacity(), capacity);
        assert!(buf.iter().all(|s| *s == StereoSample::silence()));
    }

    #[test]
    fn test_interleaved_view() {
        let buf = StereoBuffer::from_vec(vec![
            StereoSample::new(0.1, 0.2),
            StereoSample::new(0.3, 0.4),
        ]);
        assert_eq!(buf.as_interleaved(), &[0.1, 0.2, 0.3, 0.4]);
    }

    #[test]
    fn test_bus_assignment() {
        assert_eq!(Bus::for_deck(0), Some(Bus::Left));
        assert_eq!(Bus::for_deck(1), Some(Bus::Right));
        assert_eq!(Bus::for_deck(NUM_DECKS), None);
    }
}
