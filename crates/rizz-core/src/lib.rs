//! Rizz Core - real-time two-deck mixing engine
//!
//! Two looping decks feed a crossfaded mix, a master dynamics chain and the
//! host audio device. Tracks decode off-thread; the audio callback never
//! allocates, locks or logs.
//!
//! Start from [`control::ControlSurface`] and hand its orchestrator to
//! [`audio::start_audio_system`].

pub mod audio;
pub mod audio_file;
pub mod config;
pub mod control;
pub mod engine;
pub mod types;

pub use types::*;
