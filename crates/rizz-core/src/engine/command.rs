//! Lock-free command queue from control threads to the audio thread
//!
//! Control calls push [`EngineCommand`]s into a bounded `rtrb` ring buffer;
//! the render orchestrator drains it at the start of every block, so a
//! command never takes effect mid-block.
//!
//! `rtrb` is single-producer. Several control threads share the producer
//! through [`CommandSender`], which serializes pushes behind a mutex on the
//! control side only. The consumer half is owned by the audio thread and
//! never touches that lock.

use std::sync::Mutex;

use basedrop::Shared;

use crate::audio_file::Track;

/// Default capacity of the command queue
pub const COMMAND_QUEUE_CAPACITY: usize = 256;

/// Commands sent from control threads to the audio thread
pub enum EngineCommand {
    // ─────────────────────────────────────────────────────────────
    // Track Management
    // ─────────────────────────────────────────────────────────────
    /// Swap a decoded track onto a deck
    ///
    /// `Shared` keeps the command pointer-sized and lets the replaced track
    /// be freed on the collector thread.
    LoadTrack { deck: usize, track: Shared<Track> },
    UnloadTrack { deck: usize },

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────
    Play { deck: usize },
    Pause { deck: usize },
    /// Pause and rewind to frame 0
    Stop { deck: usize },
    /// Absolute seek; frames past the end wrap
    Seek { deck: usize, frame: u64 },
    /// Relative move, clamped to the track
    Nudge { deck: usize, frames: i64 },
    SetSpeed { deck: usize, ratio: f64 },
}

impl EngineCommand {
    /// Deck the command targets
    pub fn deck(&self) -> usize {
        match *self {
            EngineCommand::LoadTrack { deck, .. }
            | EngineCommand::UnloadTrack { deck }
            | EngineCommand::Play { deck }
            | EngineCommand::Pause { deck }
            | EngineCommand::Stop { deck }
            | EngineCommand::Seek { deck, .. }
            | EngineCommand::Nudge { deck, .. }
            | EngineCommand::SetSpeed { deck, .. } => deck,
        }
    }
}

impl std::fmt::Debug for EngineCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineCommand::LoadTrack { deck, track } => f
                .debug_struct("LoadTrack")
                .field("deck", deck)
                .field("frames", &track.frame_count())
                .finish(),
            EngineCommand::UnloadTrack { deck } => write!(f, "UnloadTrack({})", deck),
            EngineCommand::Play { deck } => write!(f, "Play({})", deck),
            EngineCommand::Pause { deck } => write!(f, "Pause({})", deck),
            EngineCommand::Stop { deck } => write!(f, "Stop({})", deck),
            EngineCommand::Seek { deck, frame } => write!(f, "Seek({}, {})", deck, frame),
            EngineCommand::Nudge { deck, frames } => write!(f, "Nudge({}, {})", deck, frames),
            EngineCommand::SetSpeed { deck, ratio } => write!(f, "SetSpeed({}, {})", deck, ratio),
        }
    }
}

/// Create a command channel (control side, audio side)
pub fn command_channel(capacity: usize) -> (CommandSender, rtrb::Consumer<EngineCommand>) {
    let (producer, consumer) = rtrb::RingBuffer::new(capacity.max(1));
    (
        CommandSender {
            producer: Mutex::new(producer),
        },
        consumer,
    )
}

/// Shareable send side of the command queue
pub struct CommandSender {
    producer: Mutex<rtrb::Producer<EngineCommand>>,
}

impl CommandSender {
    /// Queue a command without waiting for the audio thread
    ///
    /// Returns `Err(cmd)` with the command handed back if the queue is full.
    pub fn send(&self, cmd: EngineCommand) -> Result<(), EngineCommand> {
        let mut producer = self.producer.lock().unwrap_or_else(|e| e.into_inner());
        producer.push(cmd).map_err(|e| match e {
            rtrb::PushError::Full(value) => value,
        })
    }

    /// Free slots left in the queue
    pub fn slots(&self) -> usize {
        self.producer
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .slots()
    }
}
