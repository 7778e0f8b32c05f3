//! Real-time engine - decks, mixer, dynamics and the render orchestrator
//!
//! - Deck: looping track player with transport state
//! - Mixer: bus composition, crossfader curves and the dynamics chain
//! - RenderOrchestrator: the audio callback's entry point
//! - Command queue and lifecycle: how control threads reach the audio thread

mod atomic_float;
mod command;
mod deck;
pub mod dynamics;
pub mod gc;
mod lifecycle;
mod mixer;
mod orchestrator;

use std::sync::Arc;

pub use atomic_float::AtomicF32;
pub use command::{command_channel, CommandSender, EngineCommand, COMMAND_QUEUE_CAPACITY};
pub use deck::{Deck, DeckAtomics, MAX_SPEED, MIN_SPEED};
pub use dynamics::{DynamicsParams, DynamicsSettings, DynamicsStage, MeterAtomics};
pub use lifecycle::{EngineState, Lifecycle};
pub use mixer::{
    crossfader_gains, CrossfaderCurve, Mixer, MixerParams, MixerSettings, MixerSnapshot,
    DECK_VOLUME_CAP, MAX_GAIN,
};
pub use orchestrator::{RenderOrchestrator, MAX_BLOCK_FRAMES};

use crate::config::EngineConfig;
use crate::types::NUM_DECKS;

/// Control-side view of an engine
///
/// Everything here is safe to share between control threads; the matching
/// [`RenderOrchestrator`] goes to the audio thread.
pub struct EngineHandle {
    pub commands: CommandSender,
    pub params: Arc<MixerParams>,
    pub deck_atomics: [Arc<DeckAtomics>; NUM_DECKS],
    pub meters: Arc<MeterAtomics>,
    pub lifecycle: Arc<Lifecycle>,
    pub sample_rate: u32,
}

/// Build one engine instance from its config
///
/// Allocates every render-path buffer up front and leaves the lifecycle in
/// `Ready`. Nothing is global: two calls give two independent engines.
pub fn create_engine(config: &EngineConfig) -> (EngineHandle, RenderOrchestrator) {
    let config = config.validated();
    let (commands, consumer) = command_channel(config.command_queue_capacity);
    let params = Arc::new(MixerParams::new(config.mixer, config.dynamics));
    let lifecycle = Arc::new(Lifecycle::new());

    let orchestrator = RenderOrchestrator::new(
        consumer,
        Arc::clone(&params),
        Arc::clone(&lifecycle),
        config.canonical_sample_rate,
        config.look_ahead_samples,
        config.rms_window_samples,
    );

    let handle = EngineHandle {
        commands,
        params,
        deck_atomics: orchestrator.deck_atomics(),
        meters: orchestrator.meter_atomics(),
        lifecycle,
        sample_rate: config.canonical_sample_rate,
    };

    log::info!(
        "Engine created: {}Hz, look-ahead {} samples, RMS window {} samples",
        config.canonical_sample_rate,
        config.look_ahead_samples,
        config.rms_window_samples
    );

    (handle, orchestrator)
}
