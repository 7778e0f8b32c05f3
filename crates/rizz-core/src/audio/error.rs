//! Audio host error types

use thiserror::Error;

/// Failures opening or running the output stream
///
/// All of these are fatal to startup; none of them reach a running render
/// loop.
#[derive(Error, Debug)]
pub enum AudioError {
    #[error("No audio output devices found")]
    NoDevices,

    #[error("Failed to get default audio device: {0}")]
    NoDefaultDevice(String),

    #[error("Audio device not found: {0}")]
    DeviceNotFound(String),

    #[error("Failed to get device config: {0}")]
    ConfigError(String),

    /// The device cannot run at the engine's canonical rate
    #[error("Device does not support {requested}Hz output (supported: {supported})")]
    UnsupportedSampleRate { requested: u32, supported: String },

    #[error("Failed to build audio stream: {0}")]
    StreamBuildError(String),

    #[error("Failed to start audio stream: {0}")]
    StreamPlayError(String),

    /// The render orchestrator was already started or shut down
    #[error("Engine is {0}, expected ready")]
    EngineNotReady(String),
}

/// Result type for audio operations
pub type AudioResult<T> = Result<T, AudioError>;
