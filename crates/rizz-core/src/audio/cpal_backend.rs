//! cpal output stream driving the render orchestrator
//!
//! ```text
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │  Control Thread  │───push()───────────►│   Command Queue     │
//! │                  │                     │  (lock-free SPSC)   │
//! └──────────────────┘                     └──────────┬──────────┘
//!         │                                           │
//!         │ Relaxed atomics                           │ pop()
//!         ▼                                           ▼
//! ┌──────────────────┐                     ┌─────────────────────┐
//! │ Deck/MeterAtomics│◄────────────────────│  cpal Audio Thread  │
//! │   (lock-free)    │    once per block   │ (owns orchestrator) │
//! └──────────────────┘                     └─────────────────────┘
//! ```
//!
//! The orchestrator is moved into the stream callback, so the audio thread
//! owns it outright and no mutex sits on the render path.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, StreamTrait};
use cpal::{SampleFormat, Stream, StreamConfig, SupportedStreamConfigRange};

use super::config::AudioConfig;
use super::device::{default_output_device, find_device_by_id};
use super::error::{AudioError, AudioResult};
use crate::engine::{EngineState, Lifecycle, RenderOrchestrator};

/// A running output stream
///
/// Keeps the stream alive. Dropping it (or calling [`AudioSystem::stop`])
/// shuts the engine down.
pub struct AudioSystem {
    stream: Option<Stream>,
    lifecycle: Arc<Lifecycle>,
    device_name: String,
    sample_rate: u32,
    channels: u16,
    buffer_size: Option<u32>,
}

impl AudioSystem {
    pub fn device_name(&self) -> &str {
        &self.device_name
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    /// Requested buffer size in frames (None = host default)
    pub fn buffer_size(&self) -> Option<u32> {
        self.buffer_size
    }

    pub fn is_running(&self) -> bool {
        self.stream.is_some() && self.lifecycle.state() == EngineState::Rendering
    }

    /// Stop the stream and move the engine to `Terminated`
    pub fn stop(&mut self) {
        let Some(stream) = self.stream.take() else {
            return;
        };
        self.lifecycle.begin_shutdown();
        if let Err(e) = stream.pause() {
            log::warn!("Failed to pause audio stream: {}", e);
        }
        drop(stream);
        // The callback may never run again once paused
        self.lifecycle.finish_shutdown();
        log::info!("Audio stream stopped");
    }
}

impl Drop for AudioSystem {
    fn drop(&mut self) {
        self.stop();
    }
}

fn describe_ranges(configs: &[SupportedStreamConfigRange]) -> String {
    configs
        .iter()
        .map(|c| {
            format!(
                "{}-{}Hz {}ch {:?}",
                c.min_sample_rate().0,
                c.max_sample_rate().0,
                c.channels(),
                c.sample_format()
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Pick an f32 config at `sample_rate` with the wanted channel count
///
/// Without an explicit channel count the narrowest config with at least two
/// channels wins.
fn select_stream_config(
    device: &cpal::Device,
    config: &AudioConfig,
    sample_rate: u32,
) -> AudioResult<StreamConfig> {
    let supported: Vec<_> = device
        .supported_output_configs()
        .map_err(|e| AudioError::ConfigError(e.to_string()))?
        .collect();

    if supported.is_empty() {
        return Err(AudioError::ConfigError(
            "No supported output configurations".to_string(),
        ));
    }

    let channels_ok = |c: &&SupportedStreamConfigRange| match config.channels {
        Some(wanted) => c.channels() == wanted,
        None => c.channels() >= 2,
    };

    let candidates: Vec<_> = supported
        .iter()
        .filter(|c| c.sample_format() == SampleFormat::F32)
        .filter(channels_ok)
        .collect();

    if candidates.is_empty() {
        return Err(AudioError::ConfigError(format!(
            "No f32 output configuration with {} channels (supported: {})",
            config
                .channels
                .map_or_else(|| "2+".to_string(), |c| c.to_string()),
            describe_ranges(&supported)
        )));
    }

    let best = candidates
        .into_iter()
        .filter(|c| sample_rate >= c.min_sample_rate().0 && sample_rate <= c.max_sample_rate().0)
        .min_by_key(|c| c.channels())
        .ok_or_else(|| AudioError::UnsupportedSampleRate {
            requested: sample_rate,
            supported: describe_ranges(&supported),
        })?;

    let buffer_size = match config.buffer_size.as_frames() {
        Some(frames) => cpal::BufferSize::Fixed(frames),
        None => cpal::BufferSize::Default,
    };

    Ok(StreamConfig {
        channels: best.channels(),
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size,
    })
}

/// Open the configured device and start rendering
///
/// The orchestrator must be in `Ready`; on success it is owned by the
/// stream callback and moved to `Rendering`.
pub fn start_audio_system(
    config: &AudioConfig,
    mut orchestrator: RenderOrchestrator,
) -> AudioResult<AudioSystem> {
    let lifecycle = orchestrator.lifecycle();
    let state = lifecycle.state();
    if state != EngineState::Ready {
        return Err(AudioError::EngineNotReady(state.to_string()));
    }

    let device = match &config.device {
        Some(id) => find_device_by_id(id)?,
        None => default_output_device()?,
    };
    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    log::info!("Using audio device: {}", device_name);

    let sample_rate = orchestrator.sample_rate();
    let stream_config = select_stream_config(&device, config, sample_rate)?;
    let channels = stream_config.channels;
    let buffer_size = config.buffer_size.as_frames();

    log::info!(
        "Audio config: {} channels, {}Hz, {} (~{:.1}ms latency)",
        channels,
        sample_rate,
        buffer_size.map_or_else(|| "default buffer".to_string(), |f| format!("{} frames", f)),
        config.buffer_size.latency_ms(sample_rate)
    );

    let channel_count = channels as usize;
    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                orchestrator.render(data, channel_count);
            },
            move |err| {
                log::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::StreamBuildError(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::StreamPlayError(e.to_string()))?;
    lifecycle.start();

    log::info!("Audio stream started");

    Ok(AudioSystem {
        stream: Some(stream),
        lifecycle,
        device_name,
        sample_rate,
        channels,
        buffer_size,
    })
}
