//! Render lifecycle state machine
//!
//! `Uninitialized → Ready → Rendering → ShuttingDown → Terminated`
//!
//! The state lives in one atomic shared by the audio thread and the control
//! side. Every transition is a compare-exchange from its single legal source
//! state, so racing callers cannot skip a step.

use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EngineState {
    Uninitialized = 0,
    /// Buffers allocated, no stream running yet
    Ready = 1,
    /// The audio callback is producing blocks
    Rendering = 2,
    /// Shutdown requested; the next block is silence
    ShuttingDown = 3,
    Terminated = 4,
}

impl EngineState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => EngineState::Uninitialized,
            1 => EngineState::Ready,
            2 => EngineState::Rendering,
            3 => EngineState::ShuttingDown,
            _ => EngineState::Terminated,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineState::Uninitialized => "uninitialized",
            EngineState::Ready => "ready",
            EngineState::Rendering => "rendering",
            EngineState::ShuttingDown => "shutting down",
            EngineState::Terminated => "terminated",
        }
    }
}

impl std::fmt::Display for EngineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug)]
pub struct Lifecycle(AtomicU8);

impl Lifecycle {
    pub fn new() -> Self {
        Self(AtomicU8::new(EngineState::Uninitialized as u8))
    }

    #[inline]
    pub fn state(&self) -> EngineState {
        EngineState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn transition(&self, from: EngineState, to: EngineState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Uninitialized → Ready
    pub fn initialize(&self) -> bool {
        self.transition(EngineState::Uninitialized, EngineState::Ready)
    }

    /// Ready → Rendering
    pub fn start(&self) -> bool {
        self.transition(EngineState::Ready, EngineState::Rendering)
    }

    /// Ready or Rendering → ShuttingDown
    pub fn begin_shutdown(&self) -> bool {
        self.transition(EngineState::Rendering, EngineState::ShuttingDown)
            || self.transition(EngineState::Ready, EngineState::ShuttingDown)
    }

    /// ShuttingDown → Terminated
    pub fn finish_shutdown(&self) -> bool {
        self.transition(EngineState::ShuttingDown, EngineState::Terminated)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
