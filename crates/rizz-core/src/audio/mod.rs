//! Audio host backend (cpal)
//!
//! Device enumeration plus the output stream that drives the
//! [`RenderOrchestrator`](crate::engine::RenderOrchestrator) once per host
//! block.
//!
//! ```ignore
//! use rizz_core::audio::{start_audio_system, AudioConfig};
//! use rizz_core::control::ControlSurface;
//!
//! let (control, orchestrator) = ControlSurface::new(&engine_config);
//! let mut audio = start_audio_system(&AudioConfig::default(), orchestrator)?;
//!
//! control.play(0)?;
//! let peak = control.current_peak_level();
//!
//! audio.stop();
//! ```

mod config;
mod cpal_backend;
mod device;
mod error;

pub use config::{AudioConfig, BufferSize, DeviceId, DEFAULT_BUFFER_SIZE, MAX_BUFFER_SIZE, MIN_BUFFER_SIZE};
pub use cpal_backend::{start_audio_system, AudioSystem};
pub use device::{default_output_device, find_device_by_id, output_devices, AudioDevice};
pub use error::{AudioError, AudioResult};
