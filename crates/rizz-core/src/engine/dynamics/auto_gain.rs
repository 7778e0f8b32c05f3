//! Slow automatic gain reduction
//!
//! While the output clips, gain creeps down by 0.1% per sample (floor 0.1);
//! once it stops clipping, gain creeps back up by 0.1% per sample (ceiling 1.0).

/// Per-sample multiplier while clipping
pub const ATTACK_FACTOR: f32 = 0.999;

/// Per-sample multiplier while not clipping
pub const RELEASE_FACTOR: f32 = 1.001;

/// Lowest gain the stage will apply
pub const MIN_FACTOR: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct AutoGain {
    factor: f32,
}

impl AutoGain {
    pub fn new() -> Self {
        Self { factor: 1.0 }
    }

    /// Advance one sample and return the gain to apply
    #[inline]
    pub fn process(&mut self, clipping: bool) -> f32 {
        self.factor = if clipping {
            (self.factor * ATTACK_FACTOR).max(MIN_FACTOR)
        } else {
            (self.factor * RELEASE_FACTOR).min(1.0)
        };
        self.factor
    }

    pub fn factor(&self) -> f32 {
        self.factor
    }
}

impl Default for AutoGain {
    fn default() -> Self {
        Self::new()
    }
}
