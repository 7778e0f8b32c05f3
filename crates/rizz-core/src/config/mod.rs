//! Engine configuration
//!
//! One YAML file describes everything an engine instance needs at
//! construction: the canonical rate, dynamics buffer sizes, the initial
//! mixer and dynamics state, and the output device.
//!
//! ```ignore
//! use rizz_core::config::{default_config_path, load_config, EngineConfig};
//!
//! let config: EngineConfig = load_config(&default_config_path());
//! let (control, orchestrator) = ControlSurface::new(&config);
//! ```

mod io;
mod paths;

pub use io::{load_config, save_config};
pub use paths::{config_dir, default_config_path};

use serde::{Deserialize, Serialize};

use crate::audio::AudioConfig;
use crate::engine::dynamics::{DEFAULT_LOOK_AHEAD_SAMPLES, DEFAULT_RMS_WINDOW_SAMPLES};
use crate::engine::{DynamicsSettings, MixerSettings, COMMAND_QUEUE_CAPACITY, MAX_GAIN};
use crate::types::CANONICAL_SAMPLE_RATE;

/// Smallest command queue worth running with
const MIN_COMMAND_QUEUE_CAPACITY: usize = 16;

/// Largest look-ahead or RMS window, one second at 192kHz
pub const MAX_WINDOW_SAMPLES: usize = 192_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Rate every track is resampled to and the stream runs at
    pub canonical_sample_rate: u32,
    pub look_ahead_samples: usize,
    pub rms_window_samples: usize,
    pub command_queue_capacity: usize,
    /// Initial mixer state
    pub mixer: MixerSettings,
    /// Initial dynamics enable flags and parameters
    pub dynamics: DynamicsSettings,
    pub audio: AudioConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canonical_sample_rate: CANONICAL_SAMPLE_RATE,
            look_ahead_samples: DEFAULT_LOOK_AHEAD_SAMPLES,
            rms_window_samples: DEFAULT_RMS_WINDOW_SAMPLES,
            command_queue_capacity: COMMAND_QUEUE_CAPACITY,
            mixer: MixerSettings::default(),
            dynamics: DynamicsSettings::default(),
            audio: AudioConfig::default(),
        }
    }
}

fn window_or(name: &str, value: usize, fallback: usize) -> usize {
    if value == 0 {
        log::warn!("{} is 0, using {}", name, fallback);
        fallback
    } else if value > MAX_WINDOW_SAMPLES {
        log::warn!("{} {} too large, using {}", name, value, MAX_WINDOW_SAMPLES);
        MAX_WINDOW_SAMPLES
    } else {
        value
    }
}

fn gain_or(value: f32, fallback: f32) -> f32 {
    if value.is_finite() {
        value.clamp(0.0, MAX_GAIN)
    } else {
        fallback
    }
}

impl EngineConfig {
    /// Copy with every value forced into a usable range
    ///
    /// Hand-edited files can hold anything; out-of-range values are clamped
    /// and zero sizes replaced with defaults, each with a warning.
    pub fn validated(&self) -> Self {
        let defaults = Self::default();
        let mut config = self.clone();

        if config.canonical_sample_rate == 0 {
            log::warn!("canonical_sample_rate is 0, using {}", defaults.canonical_sample_rate);
            config.canonical_sample_rate = defaults.canonical_sample_rate;
        }
        config.look_ahead_samples = window_or(
            "look_ahead_samples",
            config.look_ahead_samples,
            defaults.look_ahead_samples,
        );
        config.rms_window_samples = window_or(
            "rms_window_samples",
            config.rms_window_samples,
            defaults.rms_window_samples,
        );
        if config.command_queue_capacity < MIN_COMMAND_QUEUE_CAPACITY {
            log::warn!(
                "command_queue_capacity {} too small, using {}",
                config.command_queue_capacity,
                MIN_COMMAND_QUEUE_CAPACITY
            );
            config.command_queue_capacity = MIN_COMMAND_QUEUE_CAPACITY;
        }

        let mixer = &mut config.mixer;
        let mixer_defaults = defaults.mixer;
        for (gain, fallback) in mixer.deck_gain.iter_mut().zip(mixer_defaults.deck_gain) {
            *gain = gain_or(*gain, fallback);
        }
        mixer.master_gain = gain_or(mixer.master_gain, mixer_defaults.master_gain);
        mixer.crossfader = if mixer.crossfader.is_finite() {
            mixer.crossfader.clamp(-1.0, 1.0)
        } else {
            mixer_defaults.crossfader
        };

        let dynamics = config.dynamics.clamped();
        if dynamics != config.dynamics {
            log::warn!("Dynamics parameters out of range, clamped");
        }
        config.dynamics = dynamics;

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.canonical_sample_rate, 44_100);
        assert_eq!(config.look_ahead_samples, 512);
        assert_eq!(config.rms_window_samples, 441);
        assert_eq!(config.command_queue_capacity, 256);
        assert!(!config.dynamics.auto_gain_reduction);
        assert!(config.dynamics.brickwall_limiter);
        assert_eq!(config.dynamics.clipping_threshold, 0.95);
        assert_eq!(config.dynamics.compressor_ratio, 4.0);
    }

    #[test]
    fn test_validated_leaves_defaults_alone() {
        let config = EngineConfig::default();
        assert_eq!(config.validated(), config);
    }

    #[test]
    fn test_validated_repairs_bad_values() {
        let mut config = EngineConfig {
            canonical_sample_rate: 0,
            look_ahead_samples: 0,
            rms_window_samples: 0,
            command_queue_capacity: 1,
            ..Default::default()
        };
        config.mixer.deck_gain = [f32::NAN, 9.0];
        config.mixer.master_gain = -1.0;
        config.mixer.crossfader = 3.0;
        config.dynamics.clipping_threshold = 4.0;
        config.dynamics.compressor_ratio = 0.0;

        let fixed = config.validated();
        assert_eq!(fixed.canonical_sample_rate, 44_100);
        assert_eq!(fixed.look_ahead_samples, 512);
        assert_eq!(fixed.rms_window_samples, 441);
        assert_eq!(fixed.command_queue_capacity, MIN_COMMAND_QUEUE_CAPACITY);
        assert_eq!(fixed.mixer.deck_gain, [1.0, MAX_GAIN]);
        assert_eq!(fixed.mixer.master_gain, 0.0);
        assert_eq!(fixed.mixer.crossfader, 1.0);
        assert_eq!(fixed.dynamics.clipping_threshold, 1.0);
        assert_eq!(fixed.dynamics.compressor_ratio, 1.0);
    }

    #[test]
    fn test_validated_caps_window_sizes() {
        let config = EngineConfig {
            look_ahead_samples: usize::MAX,
            rms_window_samples: MAX_WINDOW_SAMPLES + 1,
            ..Default::default()
        };
        let fixed = config.validated();
        assert_eq!(fixed.look_ahead_samples, MAX_WINDOW_SAMPLES);
        assert_eq!(fixed.rms_window_samples, MAX_WINDOW_SAMPLES);

        let at_limit = EngineConfig {
            look_ahead_samples: MAX_WINDOW_SAMPLES,
            ..Default::default()
        };
        assert_eq!(at_limit.validated(), at_limit);
    }
}
