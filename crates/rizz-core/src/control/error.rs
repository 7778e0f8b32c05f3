//! Control-plane error types

use thiserror::Error;

use crate::audio_file::DecodeError;

/// Rejected control calls
///
/// Nothing here ever reaches the render path: bad input is refused at the
/// control surface and the engine keeps running.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ControlError {
    #[error("Deck {0} does not exist")]
    InvalidDeck(usize),

    #[error("Invalid value for {name}: {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    /// The audio thread has not drained earlier commands yet
    #[error("Engine command queue is full")]
    QueueFull,

    #[error("Engine is shut down")]
    NotRunning,
}

pub type ControlResult<T> = Result<T, ControlError>;

/// Failures loading a track onto a deck
///
/// The deck keeps playing whatever it had before in every case.
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("Deck {0} does not exist")]
    InvalidDeck(usize),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// A newer load or unload on the same deck won
    #[error("Load was superseded by a newer request on the same deck")]
    Superseded,

    /// The decoded track could not be handed to the audio thread in time
    #[error("Engine command queue stayed full; track not published")]
    QueueFull,

    #[error("Track loader is not running")]
    LoaderUnavailable,
}

pub type LoadResult<T> = Result<T, LoadError>;
