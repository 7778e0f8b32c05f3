//! Background track loader
//!
//! Decoding and resampling a track takes far longer than one audio block, so
//! it runs on a dedicated `track-loader` thread. A finished track is wrapped
//! in a `basedrop::Shared` and handed to the audio thread through the
//! command queue; the deck keeps playing its old track until the swap.
//!
//! Each deck carries a load generation. Starting a load (or unloading) bumps
//! it, and the loader drops any request whose generation is no longer
//! current, before decoding and again before publishing. The newest request
//! on a deck always wins.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use basedrop::Shared;
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};

use super::cue::CueList;
use super::error::{LoadError, LoadResult};
use crate::audio_file::{self, Track};
use crate::engine::gc::gc_handle;
use crate::engine::{CommandSender, EngineCommand};
use crate::types::NUM_DECKS;

/// How long to keep retrying a full command queue before giving up
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(2);
const PUBLISH_RETRY_INTERVAL: Duration = Duration::from_millis(2);

/// Summary of a track that made it onto a deck
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTrackInfo {
    pub deck: usize,
    pub path: PathBuf,
    /// Length at the canonical rate
    pub frames: usize,
    pub duration_seconds: f64,
    pub channels: u16,
    /// Rate of the file before resampling
    pub source_sample_rate: u32,
}

struct LoadRequest {
    deck: usize,
    path: PathBuf,
    generation: u64,
    reply: Sender<LoadResult<LoadedTrackInfo>>,
}

/// Per-deck load generations, shared by the control side and the loader
///
/// A bump and the command that goes with it happen under one control-side
/// gate, as do the loader's generation check and its publish. A track that
/// passed the check therefore reaches the queue before any later unload or
/// load on that deck can. The audio thread never takes the gate.
#[derive(Debug, Default)]
pub struct LoadGenerations {
    current: [AtomicU64; NUM_DECKS],
    gate: Mutex<()>,
}

impl LoadGenerations {
    fn lock_gate(&self) -> MutexGuard<'_, ()> {
        self.gate.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Start a new generation for `deck`, superseding any pending load
    pub fn bump(&self, deck: usize) -> u64 {
        let _gate = self.lock_gate();
        self.current[deck].fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Bump `deck` and run `f` before any loader can publish again
    pub fn bump_and<R>(&self, deck: usize, f: impl FnOnce() -> R) -> R {
        let _gate = self.lock_gate();
        self.current[deck].fetch_add(1, Ordering::AcqRel);
        f()
    }

    pub fn is_current(&self, deck: usize, generation: u64) -> bool {
        self.current[deck].load(Ordering::Acquire) == generation
    }

    /// Run `f` only while `generation` is still current; None if superseded
    fn if_current<R>(&self, deck: usize, generation: u64, f: impl FnOnce() -> R) -> Option<R> {
        let _gate = self.lock_gate();
        self.is_current(deck, generation).then(f)
    }
}

/// A load in flight
pub struct PendingLoad {
    deck: usize,
    rx: Receiver<LoadResult<LoadedTrackInfo>>,
}

impl PendingLoad {
    pub fn deck(&self) -> usize {
        self.deck
    }

    /// Block until the loader answers
    pub fn wait(self) -> LoadResult<LoadedTrackInfo> {
        self.rx.recv().unwrap_or(Err(LoadError::LoaderUnavailable))
    }

    /// Block for at most `timeout`; None if still loading
    pub fn wait_timeout(&self, timeout: Duration) -> Option<LoadResult<LoadedTrackInfo>> {
        match self.rx.recv_timeout(timeout) {
            Ok(result) => Some(result),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(LoadError::LoaderUnavailable)),
        }
    }
}

/// Handle to the loader thread
///
/// The thread exits once every handle is dropped.
pub struct TrackLoader {
    tx: Sender<LoadRequest>,
    generations: Arc<LoadGenerations>,
    _handle: Option<JoinHandle<()>>,
}

/// What the loader thread needs to publish a track
struct Publisher {
    commands: Arc<CommandSender>,
    generations: Arc<LoadGenerations>,
    cues: Arc<Mutex<[CueList; NUM_DECKS]>>,
    sample_rate: u32,
}

impl TrackLoader {
    /// Spawn the loader thread
    ///
    /// If the thread cannot be started every request fails with
    /// [`LoadError::LoaderUnavailable`].
    pub fn spawn(
        sample_rate: u32,
        commands: Arc<CommandSender>,
        cues: Arc<Mutex<[CueList; NUM_DECKS]>>,
    ) -> Self {
        let (tx, rx) = channel::unbounded::<LoadRequest>();
        let generations = Arc::new(LoadGenerations::default());
        let publisher = Publisher {
            commands,
            generations: Arc::clone(&generations),
            cues,
            sample_rate,
        };

        let handle = thread::Builder::new()
            .name("track-loader".to_string())
            .spawn(move || loader_thread(rx, publisher));

        let handle = match handle {
            Ok(handle) => {
                log::info!("TrackLoader spawned with target sample rate: {} Hz", sample_rate);
                Some(handle)
            }
            Err(e) => {
                log::error!("Failed to spawn track loader thread: {}", e);
                None
            }
        };

        Self {
            tx,
            generations,
            _handle: handle,
        }
    }

    pub fn generations(&self) -> &LoadGenerations {
        &self.generations
    }

    /// Queue a load and return a handle to its result
    ///
    /// Any earlier load still pending on the same deck is superseded.
    pub fn request(&self, deck: usize, path: PathBuf) -> LoadResult<PendingLoad> {
        if deck >= NUM_DECKS {
            return Err(LoadError::InvalidDeck(deck));
        }
        let generation = self.generations.bump(deck);
        let (reply, rx) = channel::bounded(1);
        self.tx
            .send(LoadRequest {
                deck,
                path,
                generation,
                reply,
            })
            .map_err(|_| LoadError::LoaderUnavailable)?;
        Ok(PendingLoad { deck, rx })
    }
}

fn loader_thread(rx: Receiver<LoadRequest>, publisher: Publisher) {
    log::info!("Track loader thread started");

    while let Ok(request) = rx.recv() {
        let result = publisher.handle(&request);
        match &result {
            Ok(info) => log::info!(
                "Deck {}: loaded {:?} ({:.1}s)",
                info.deck,
                info.path,
                info.duration_seconds
            ),
            Err(LoadError::Superseded) => {
                log::debug!("Deck {}: load of {:?} superseded", request.deck, request.path)
            }
            Err(e) => log::error!("Deck {}: failed to load {:?}: {}", request.deck, request.path, e),
        }
        // The caller may have stopped waiting
        let _ = request.reply.send(result);
    }

    log::info!("Track loader thread shutting down");
}

impl Publisher {
    fn handle(&self, request: &LoadRequest) -> LoadResult<LoadedTrackInfo> {
        if !self.generations.is_current(request.deck, request.generation) {
            return Err(LoadError::Superseded);
        }

        let start = Instant::now();
        let track = decode(&request.path, self.sample_rate)?;
        log::info!(
            "Loader: decoded {:?} in {:?}",
            request.path,
            start.elapsed()
        );

        let info = LoadedTrackInfo {
            deck: request.deck,
            path: request.path.clone(),
            frames: track.frame_count(),
            duration_seconds: track.duration_seconds(),
            channels: track.channels(),
            source_sample_rate: track.source_rate,
        };

        self.publish(request, Shared::new(&gc_handle(), track.track))?;
        Ok(info)
    }

    /// Hand the track to the audio thread, retrying while the queue is full
    fn publish(&self, request: &LoadRequest, track: Shared<Track>) -> LoadResult<()> {
        let deadline = Instant::now() + PUBLISH_TIMEOUT;
        let mut cmd = EngineCommand::LoadTrack {
            deck: request.deck,
            track,
        };

        loop {
            let sent = self
                .generations
                .if_current(request.deck, request.generation, || self.commands.send(cmd))
                .ok_or(LoadError::Superseded)?;
            match sent {
                Ok(()) => break,
                Err(returned) if Instant::now() < deadline => {
                    cmd = returned;
                    thread::sleep(PUBLISH_RETRY_INTERVAL);
                }
                Err(_) => return Err(LoadError::QueueFull),
            }
        }

        self.cues.lock().unwrap_or_else(|e| e.into_inner())[request.deck].clear();
        Ok(())
    }
}

/// Decoded track plus the rate it had on disk
struct Decoded {
    track: Track,
    source_rate: u32,
}

impl Decoded {
    fn frame_count(&self) -> usize {
        self.track.frame_count()
    }

    fn duration_seconds(&self) -> f64 {
        self.track.duration_seconds()
    }

    fn channels(&self) -> u16 {
        self.track.channels()
    }
}

fn decode(path: &Path, sample_rate: u32) -> LoadResult<Decoded> {
    let track = audio_file::read_track(path)?;
    let source_rate = track.sample_rate();
    Ok(Decoded {
        track: track.into_sample_rate(sample_rate),
        source_rate,
    })
}
