//! Control surface - the engine's non-real-time API
//!
//! Every call here runs on a caller's thread and reaches the audio thread
//! only through lock-free channels:
//!
//! - transport changes and track swaps go over the command queue
//! - mixer and dynamics parameters are atomics read once per block
//! - deck state and meters are read back from atomics the audio thread
//!   publishes
//!
//! Bad input is refused (or clamped) here and never reaches the renderer.
//! `ControlSurface` is cheap to clone and can be shared between threads.

mod cue;
mod error;
mod loader;

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

pub use cue::CueList;
pub use error::{ControlError, ControlResult, LoadError, LoadResult};
pub use loader::{LoadGenerations, LoadedTrackInfo, PendingLoad, TrackLoader};

use crate::config::EngineConfig;
use crate::engine::dynamics::{
    MAX_CLIPPING_THRESHOLD, MAX_COMPRESSOR_RATIO, MAX_LIMITER_TIME_SECONDS, MIN_CLIPPING_THRESHOLD,
    MIN_LIMITER_TIME_SECONDS,
};
use crate::engine::{
    create_engine, CommandSender, CrossfaderCurve, DeckAtomics, DynamicsSettings, DynamicsStage,
    EngineCommand, EngineHandle, EngineState, Lifecycle, MeterAtomics, MixerParams,
    RenderOrchestrator, MAX_GAIN,
};
use crate::types::NUM_DECKS;

struct Inner {
    commands: Arc<CommandSender>,
    params: Arc<MixerParams>,
    deck_atomics: [Arc<DeckAtomics>; NUM_DECKS],
    meters: Arc<MeterAtomics>,
    lifecycle: Arc<Lifecycle>,
    sample_rate: u32,
    cues: Arc<Mutex<[CueList; NUM_DECKS]>>,
    loader: TrackLoader,
}

#[derive(Clone)]
pub struct ControlSurface {
    inner: Arc<Inner>,
}

fn reject(name: &'static str, value: f64) -> ControlError {
    log::warn!("Rejected {} = {}", name, value);
    ControlError::InvalidParameter { name, value }
}

/// Clamp a finite value into range; non-finite values are rejected
fn clamp_param(name: &'static str, value: f32, min: f32, max: f32) -> ControlResult<f32> {
    if !value.is_finite() {
        return Err(reject(name, value as f64));
    }
    let clamped = value.clamp(min, max);
    if clamped != value {
        log::debug!("{} {} clamped to {}", name, value, clamped);
    }
    Ok(clamped)
}

impl ControlSurface {
    /// Build an engine and its control surface
    ///
    /// The returned orchestrator belongs on the audio thread, usually via
    /// [`start_audio_system`](crate::audio::start_audio_system).
    pub fn new(config: &EngineConfig) -> (Self, RenderOrchestrator) {
        let (handle, orchestrator) = create_engine(config);
        (Self::from_handle(handle), orchestrator)
    }

    /// Wrap an existing engine handle and start its loader thread
    pub fn from_handle(handle: EngineHandle) -> Self {
        let commands = Arc::new(handle.commands);
        let cues = Arc::new(Mutex::new(Default::default()));
        let loader = TrackLoader::spawn(handle.sample_rate, Arc::clone(&commands), Arc::clone(&cues));

        Self {
            inner: Arc::new(Inner {
                commands,
                params: handle.params,
                deck_atomics: handle.deck_atomics,
                meters: handle.meters,
                lifecycle: handle.lifecycle,
                sample_rate: handle.sample_rate,
                cues,
                loader,
            }),
        }
    }

    fn check_deck(&self, deck: usize) -> ControlResult<()> {
        if deck < NUM_DECKS {
            Ok(())
        } else {
            log::warn!("Rejected call for deck {}", deck);
            Err(ControlError::InvalidDeck(deck))
        }
    }

    fn deck(&self, deck: usize) -> ControlResult<&DeckAtomics> {
        self.check_deck(deck)?;
        Ok(&self.inner.deck_atomics[deck])
    }

    fn cues(&self) -> MutexGuard<'_, [CueList; NUM_DECKS]> {
        self.inner.cues.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn is_shut_down(&self) -> bool {
        matches!(
            self.inner.lifecycle.state(),
            EngineState::ShuttingDown | EngineState::Terminated
        )
    }

    fn send(&self, cmd: EngineCommand) -> ControlResult<()> {
        if self.is_shut_down() {
            return Err(ControlError::NotRunning);
        }
        self.inner.commands.send(cmd).map_err(|cmd| {
            log::warn!("Command queue full, dropped {:?}", cmd);
            ControlError::QueueFull
        })
    }

    fn seconds_to_frames(&self, seconds: f64) -> u64 {
        (seconds * self.inner.sample_rate as f64).round() as u64
    }

    fn frames_to_seconds(&self, frames: u64) -> f64 {
        frames as f64 / self.inner.sample_rate as f64
    }

    // ─────────────────────────────────────────────────────────────
    // Track Loading
    // ─────────────────────────────────────────────────────────────

    /// Decode `path` off-thread and swap it onto `deck`, waiting for the result
    ///
    /// Only the caller blocks; the deck keeps playing its previous track until
    /// the swap. On failure the deck is left as it was.
    pub fn load(&self, deck: usize, path: impl AsRef<Path>) -> LoadResult<LoadedTrackInfo> {
        self.load_async(deck, path)?.wait()
    }

    /// Start a load without waiting for it
    pub fn load_async(&self, deck: usize, path: impl AsRef<Path>) -> LoadResult<PendingLoad> {
        let path = path.as_ref();
        if deck >= NUM_DECKS {
            return Err(LoadError::InvalidDeck(deck));
        }
        if self.is_shut_down() {
            return Err(LoadError::LoaderUnavailable);
        }
        log::info!("Deck {}: loading {:?}", deck, path);
        self.inner.loader.request(deck, path.to_path_buf())
    }

    /// Remove the deck's track; any pending load is superseded
    pub fn unload(&self, deck: usize) -> ControlResult<()> {
        self.check_deck(deck)?;
        self.inner
            .loader
            .generations()
            .bump_and(deck, || self.send(EngineCommand::UnloadTrack { deck }))?;
        self.cues()[deck].clear();
        log::debug!("Deck {}: unload", deck);
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────

    pub fn play(&self, deck: usize) -> ControlResult<()> {
        self.check_deck(deck)?;
        log::debug!("Deck {}: play", deck);
        self.send(EngineCommand::Play { deck })
    }

    pub fn pause(&self, deck: usize) -> ControlResult<()> {
        self.check_deck(deck)?;
        log::debug!("Deck {}: pause", deck);
        self.send(EngineCommand::Pause { deck })
    }

    /// Pause and return to the start (idempotent)
    pub fn stop(&self, deck: usize) -> ControlResult<()> {
        self.check_deck(deck)?;
        log::debug!("Deck {}: stop", deck);
        self.send(EngineCommand::Stop { deck })
    }

    /// Jump to `seconds`; negative clamps to 0, past the end wraps
    pub fn seek(&self, deck: usize, seconds: f64) -> ControlResult<()> {
        self.check_deck(deck)?;
        if !seconds.is_finite() {
            return Err(reject("seek seconds", seconds));
        }
        let frame = self.seconds_to_frames(seconds.max(0.0));
        log::debug!("Deck {}: seek to {:.3}s (frame {})", deck, seconds, frame);
        self.send(EngineCommand::Seek { deck, frame })
    }

    /// Set playback speed; clamped to [0.5, 2.0] by the deck
    pub fn set_speed(&self, deck: usize, ratio: f64) -> ControlResult<()> {
        self.check_deck(deck)?;
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(reject("speed ratio", ratio));
        }
        log::debug!("Deck {}: speed {}", deck, ratio);
        self.send(EngineCommand::SetSpeed { deck, ratio })
    }

    /// Move forward by `seconds`, stopping at the last frame
    pub fn fast_forward(&self, deck: usize, seconds: f64) -> ControlResult<()> {
        self.nudge(deck, seconds, 1)
    }

    /// Move back by `seconds`, stopping at the first frame
    pub fn rewind(&self, deck: usize, seconds: f64) -> ControlResult<()> {
        self.nudge(deck, seconds, -1)
    }

    fn nudge(&self, deck: usize, seconds: f64, direction: i64) -> ControlResult<()> {
        self.check_deck(deck)?;
        if !seconds.is_finite() || seconds < 0.0 {
            return Err(reject("nudge seconds", seconds));
        }
        let frames = self.seconds_to_frames(seconds).min(i64::MAX as u64) as i64 * direction;
        log::debug!("Deck {}: nudge {} frames", deck, frames);
        self.send(EngineCommand::Nudge { deck, frames })
    }

    /// Playhead in seconds
    pub fn position(&self, deck: usize) -> ControlResult<f64> {
        let atomics = self.deck(deck)?;
        Ok(self.frames_to_seconds(atomics.position()))
    }

    /// Track length in seconds (0 with no track)
    pub fn length(&self, deck: usize) -> ControlResult<f64> {
        let atomics = self.deck(deck)?;
        Ok(self.frames_to_seconds(atomics.length()))
    }

    pub fn is_playing(&self, deck: usize) -> ControlResult<bool> {
        Ok(self.deck(deck)?.is_playing())
    }

    pub fn has_track(&self, deck: usize) -> ControlResult<bool> {
        Ok(self.deck(deck)?.has_track())
    }

    pub fn speed(&self, deck: usize) -> ControlResult<f64> {
        Ok(self.deck(deck)?.speed() as f64)
    }

    // ─────────────────────────────────────────────────────────────
    // Cue Points
    // ─────────────────────────────────────────────────────────────

    /// Store the current position as a cue; false if one is already there
    pub fn add_cue_point(&self, deck: usize) -> ControlResult<bool> {
        let frame = self.deck(deck)?.position();
        let added = self.cues()[deck].add(frame);
        log::debug!("Deck {}: cue at frame {} (added: {})", deck, frame, added);
        Ok(added)
    }

    pub fn jump_to_cue_point(&self, deck: usize, index: usize) -> ControlResult<()> {
        self.check_deck(deck)?;
        let frame = self.cues()[deck]
            .get(index)
            .ok_or_else(|| reject("cue index", index as f64))?;
        log::debug!("Deck {}: jump to cue {} (frame {})", deck, index, frame);
        self.send(EngineCommand::Seek { deck, frame })
    }

    /// Remove a cue, returning its position in seconds
    pub fn remove_cue_point(&self, deck: usize, index: usize) -> ControlResult<f64> {
        self.check_deck(deck)?;
        let frame = self.cues()[deck]
            .remove(index)
            .ok_or_else(|| reject("cue index", index as f64))?;
        Ok(self.frames_to_seconds(frame))
    }

    pub fn clear_cue_points(&self, deck: usize) -> ControlResult<()> {
        self.check_deck(deck)?;
        self.cues()[deck].clear();
        Ok(())
    }

    /// Cue positions in seconds, in the order they were set
    pub fn cue_points(&self, deck: usize) -> ControlResult<Vec<f64>> {
        self.check_deck(deck)?;
        Ok(self.cues()[deck]
            .frames()
            .iter()
            .map(|&frame| self.frames_to_seconds(frame))
            .collect())
    }

    // ─────────────────────────────────────────────────────────────
    // Mixer
    // ─────────────────────────────────────────────────────────────

    /// Deck gain, clamped to [0, 2]
    pub fn set_volume(&self, deck: usize, gain: f32) -> ControlResult<()> {
        self.check_deck(deck)?;
        let gain = clamp_param("deck gain", gain, 0.0, MAX_GAIN)?;
        self.inner.params.set_deck_gain(deck, gain);
        log::debug!("Deck {}: volume {}", deck, gain);
        Ok(())
    }

    pub fn volume(&self, deck: usize) -> ControlResult<f32> {
        self.check_deck(deck)?;
        Ok(self.inner.params.deck_gain(deck))
    }

    /// Master gain, clamped to [0, 2]
    pub fn set_master_volume(&self, gain: f32) -> ControlResult<()> {
        let gain = clamp_param("master gain", gain, 0.0, MAX_GAIN)?;
        self.inner.params.set_master_gain(gain);
        log::debug!("Master volume {}", gain);
        Ok(())
    }

    pub fn master_volume(&self) -> f32 {
        self.inner.params.master_gain()
    }

    /// Crossfader position, clamped to [-1, 1] (-1 = left bus only)
    pub fn set_crossfader(&self, position: f32) -> ControlResult<()> {
        let position = clamp_param("crossfader", position, -1.0, 1.0)?;
        self.inner.params.set_crossfader(position);
        log::debug!("Crossfader {}", position);
        Ok(())
    }

    pub fn crossfader(&self) -> f32 {
        self.inner.params.crossfader()
    }

    pub fn set_crossfader_curve(&self, curve: CrossfaderCurve) {
        self.inner.params.set_curve(curve);
        log::debug!("Crossfader curve {}", curve.name());
    }

    pub fn crossfader_curve(&self) -> CrossfaderCurve {
        self.inner.params.curve()
    }

    /// Cap deck gains at unity before bus composition
    pub fn set_deck_volume_cap(&self, enabled: bool) {
        self.inner.params.set_deck_volume_cap(enabled);
        log::debug!("Deck volume cap {}", enabled);
    }

    pub fn deck_volume_cap(&self) -> bool {
        self.inner.params.deck_volume_cap()
    }

    // ─────────────────────────────────────────────────────────────
    // Dynamics
    // ─────────────────────────────────────────────────────────────

    pub fn set_stage_enabled(&self, stage: DynamicsStage, enabled: bool) {
        self.inner.params.dynamics().set_enabled(stage, enabled);
        log::debug!("Dynamics {} {}", stage.name(), if enabled { "on" } else { "off" });
    }

    pub fn is_stage_enabled(&self, stage: DynamicsStage) -> bool {
        self.inner.params.dynamics().is_enabled(stage)
    }

    /// Limiter ceiling in (0, 1]; values <= 0 are rejected
    pub fn set_clipping_threshold(&self, threshold: f32) -> ControlResult<()> {
        if threshold <= 0.0 {
            return Err(reject("clipping threshold", threshold as f64));
        }
        let threshold = clamp_param(
            "clipping threshold",
            threshold,
            MIN_CLIPPING_THRESHOLD,
            MAX_CLIPPING_THRESHOLD,
        )?;
        self.inner.params.dynamics().set_clipping_threshold(threshold);
        log::debug!("Clipping threshold {}", threshold);
        Ok(())
    }

    /// Compression ratio >= 1; values below 1 are rejected
    pub fn set_compressor_ratio(&self, ratio: f32) -> ControlResult<()> {
        if ratio < 1.0 {
            return Err(reject("compressor ratio", ratio as f64));
        }
        let ratio = clamp_param("compressor ratio", ratio, 1.0, MAX_COMPRESSOR_RATIO)?;
        self.inner.params.dynamics().set_compressor_ratio(ratio);
        log::debug!("Compressor ratio {}", ratio);
        Ok(())
    }

    pub fn set_limiter_attack_ms(&self, ms: f32) -> ControlResult<()> {
        let seconds = limiter_time("limiter attack ms", ms)?;
        self.inner.params.dynamics().set_limiter_attack_seconds(seconds);
        Ok(())
    }

    pub fn set_limiter_release_ms(&self, ms: f32) -> ControlResult<()> {
        let seconds = limiter_time("limiter release ms", ms)?;
        self.inner.params.dynamics().set_limiter_release_seconds(seconds);
        Ok(())
    }

    /// Current dynamics flags and parameters
    pub fn dynamics_settings(&self) -> DynamicsSettings {
        self.inner.params.dynamics().snapshot()
    }

    // ─────────────────────────────────────────────────────────────
    // Meters
    // ─────────────────────────────────────────────────────────────

    pub fn current_peak_level(&self) -> f32 {
        self.inner.meters.peak_level()
    }

    pub fn current_rms_level(&self) -> f32 {
        self.inner.meters.rms_level()
    }

    pub fn is_clipping(&self) -> bool {
        self.inner.meters.is_clipping()
    }

    /// Number of times the output started clipping
    pub fn clip_event_count(&self) -> u64 {
        self.inner.meters.clip_events()
    }

    /// Auto gain reduction factor in [0.1, 1.0]
    pub fn auto_gain_reduction_factor(&self) -> f32 {
        self.inner.meters.auto_gain_factor()
    }

    // ─────────────────────────────────────────────────────────────
    // Lifecycle
    // ─────────────────────────────────────────────────────────────

    pub fn lifecycle(&self) -> EngineState {
        self.inner.lifecycle.state()
    }

    /// Ask the renderer to stop
    ///
    /// A running stream renders one block of silence and then reports
    /// `Terminated`. An engine that never started terminates at once.
    pub fn shutdown(&self) {
        let lifecycle = &self.inner.lifecycle;
        let was_ready = lifecycle.state() == EngineState::Ready;
        if lifecycle.begin_shutdown() {
            log::info!("Engine shutdown requested");
            if was_ready {
                lifecycle.finish_shutdown();
            }
        }
    }

    /// Canonical sample rate every deck plays at
    pub fn sample_rate(&self) -> u32 {
        self.inner.sample_rate
    }
}

fn limiter_time(name: &'static str, ms: f32) -> ControlResult<f32> {
    if ms < 0.0 {
        return Err(reject(name, ms as f64));
    }
    clamp_param(
        name,
        ms / 1000.0,
        MIN_LIMITER_TIME_SECONDS,
        MAX_LIMITER_TIME_SECONDS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn engine() -> (ControlSurface, RenderOrchestrator) {
        let (control, orchestrator) = ControlSurface::new(&EngineConfig::default());
        orchestrator.lifecycle().start();
        (control, orchestrator)
    }

    fn render(orchestrator: &mut RenderOrchestrator, frames: usize) -> Vec<f32> {
        let mut out = vec![0.0f32; frames * 2];
        orchestrator.render(&mut out, 2);
        out
    }

    fn write_wav(path: &Path, frames: usize, value: i16) {
        write_wav_at(path, 44_100, frames, value);
    }

    fn write_wav_at(path: &Path, sample_rate: u32, frames: usize, value: i16) {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for _ in 0..frames {
            writer.write_sample(value).unwrap();
        }
        writer.finalize().unwrap();
    }

    /// Render until the published track shows up on `deck`
    fn render_until_loaded(orchestrator: &mut RenderOrchestrator, control: &ControlSurface, deck: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !control.has_track(deck).unwrap() {
            assert!(Instant::now() < deadline, "track never reached deck {}", deck);
            render(orchestrator, 16);
        }
    }

    #[test]
    fn test_invalid_deck_is_rejected_everywhere() {
        let (control, _orchestrator) = engine();
        let deck = NUM_DECKS;

        assert_eq!(control.play(deck), Err(ControlError::InvalidDeck(deck)));
        assert_eq!(control.seek(deck, 1.0), Err(ControlError::InvalidDeck(deck)));
        assert_eq!(control.set_volume(deck, 1.0), Err(ControlError::InvalidDeck(deck)));
        assert_eq!(control.position(deck), Err(ControlError::InvalidDeck(deck)));
        assert_eq!(control.add_cue_point(deck), Err(ControlError::InvalidDeck(deck)));
        assert!(matches!(
            control.load(deck, "x.wav"),
            Err(LoadError::InvalidDeck(_))
        ));
    }

    #[test]
    fn test_load_play_and_query() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("one-second.wav");
        write_wav(&path, 44_100, 8_192);

        let (control, mut orchestrator) = engine();
        control.set_stage_enabled(DynamicsStage::ClippingProtection, false);

        let info = control.load(0, &path).unwrap();
        assert_eq!(info.frames, 44_100);
        render_until_loaded(&mut orchestrator, &control, 0);
        assert!((control.length(0).unwrap() - 1.0).abs() < 1e-9);

        control.play(0).unwrap();
        let out = render(&mut orchestrator, 441);
        assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-6));
        assert!(control.is_playing(0).unwrap());
        assert!((control.position(0).unwrap() - 0.01).abs() < 1e-9);

        control.stop(0).unwrap();
        control.stop(0).unwrap();
        render(&mut orchestrator, 1);
        assert!(!control.is_playing(0).unwrap());
        assert_eq!(control.position(0).unwrap(), 0.0);
    }

    #[test]
    fn test_failed_load_keeps_previous_track() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.wav");
        let bad = dir.path().join("bad.wav");
        write_wav(&good, 1_000, 100);
        std::fs::write(&bad, b"RIFF\x04\x00\x00\x00WAVE").unwrap();

        let (control, mut orchestrator) = engine();
        control.load(1, &good).unwrap();
        render_until_loaded(&mut orchestrator, &control, 1);

        assert!(matches!(control.load(1, &bad), Err(LoadError::Decode(_))));
        render(&mut orchestrator, 16);
        assert_eq!(orchestrator.deck_atomics()[1].length(), 1_000);
    }

    #[test]
    fn test_deck_keeps_playing_while_next_track_decodes() {
        let dir = tempfile::tempdir().unwrap();
        let old = dir.path().join("old.wav");
        let new = dir.path().join("new.wav");
        write_wav(&old, 1_000, 8_192);
        // Long and off-rate so decode plus resample takes a while
        write_wav_at(&new, 48_000, 480_000, 16_384);

        let (control, mut orchestrator) = engine();
        control.set_stage_enabled(DynamicsStage::ClippingProtection, false);
        control.load(0, &old).unwrap();
        render_until_loaded(&mut orchestrator, &control, 0);
        control.play(0).unwrap();

        let pending = control.load_async(0, &new).unwrap();
        let first = render(&mut orchestrator, 64);
        assert!(first.iter().all(|s| (s - 0.25).abs() < 1e-6));

        let deadline = Instant::now() + Duration::from_secs(30);
        loop {
            assert!(Instant::now() < deadline, "new track never arrived");
            let out = render(&mut orchestrator, 64);
            if orchestrator.deck_atomics()[0].length() == 1_000 {
                assert!(out.iter().all(|s| (s - 0.25).abs() < 1e-6));
            } else {
                // The swap lands on a block boundary
                assert!(out.iter().all(|s| (s - 0.5).abs() < 1e-4));
                break;
            }
        }

        let info = pending.wait().unwrap();
        assert_eq!(info.frames, 441_000);
        assert_eq!(control.length(0).unwrap(), 10.0);
        assert!(control.is_playing(0).unwrap());
    }

    #[test]
    fn test_seek_nudge_and_cues() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ten-seconds.wav");
        write_wav(&path, 441_000, 0);

        let (control, mut orchestrator) = engine();
        control.load(0, &path).unwrap();
        render_until_loaded(&mut orchestrator, &control, 0);

        control.seek(0, 2.0).unwrap();
        render(&mut orchestrator, 1);
        assert_eq!(control.position(0).unwrap(), 2.0);
        assert!(control.add_cue_point(0).unwrap());
        assert!(!control.add_cue_point(0).unwrap());

        control.fast_forward(0, 0.5).unwrap();
        render(&mut orchestrator, 1);
        assert_eq!(control.position(0).unwrap(), 2.5);
        control.add_cue_point(0).unwrap();

        control.rewind(0, 100.0).unwrap();
        render(&mut orchestrator, 1);
        assert_eq!(control.position(0).unwrap(), 0.0);

        control.seek(0, 12.0).unwrap();
        render(&mut orchestrator, 1);
        assert_eq!(control.position(0).unwrap(), 2.0);

        assert_eq!(control.cue_points(0).unwrap(), vec![2.0, 2.5]);
        control.jump_to_cue_point(0, 1).unwrap();
        render(&mut orchestrator, 1);
        assert_eq!(control.position(0).unwrap(), 2.5);

        assert!(matches!(
            control.jump_to_cue_point(0, 9),
            Err(ControlError::InvalidParameter { .. })
        ));
        assert_eq!(control.remove_cue_point(0, 0).unwrap(), 2.0);
        control.clear_cue_points(0).unwrap();
        assert!(control.cue_points(0).unwrap().is_empty());
    }

    #[test]
    fn test_parameters_are_clamped_or_rejected() {
        let (control, _orchestrator) = engine();

        control.set_volume(0, 5.0).unwrap();
        assert_eq!(control.volume(0).unwrap(), MAX_GAIN);
        assert!(control.set_volume(0, f32::NAN).is_err());

        control.set_crossfader(-3.0).unwrap();
        assert_eq!(control.crossfader(), -1.0);
        assert!(control.set_crossfader(f32::NAN).is_err());

        assert!(control.set_clipping_threshold(0.0).is_err());
        control.set_clipping_threshold(1.5).unwrap();
        assert_eq!(control.dynamics_settings().clipping_threshold, 1.0);

        assert!(control.set_compressor_ratio(0.5).is_err());
        control.set_compressor_ratio(8.0).unwrap();
        control.set_limiter_attack_ms(10.0).unwrap();
        assert!(control.set_limiter_release_ms(-1.0).is_err());

        let settings = control.dynamics_settings();
        assert_eq!(settings.compressor_ratio, 8.0);
        assert!((settings.limiter_attack_seconds - 0.01).abs() < 1e-7);

        assert!(control.set_speed(0, 0.0).is_err());
        assert!(control.seek(0, f64::INFINITY).is_err());
        assert!(control.rewind(0, -1.0).is_err());
    }

    #[test]
    fn test_stage_toggles_and_curve() {
        let (control, _orchestrator) = engine();

        control.set_stage_enabled(DynamicsStage::AutoGainReduction, true);
        control.set_stage_enabled(DynamicsStage::PeakDetection, false);
        assert!(control.is_stage_enabled(DynamicsStage::AutoGainReduction));
        assert!(!control.dynamics_settings().peak_detection);

        control.set_crossfader_curve(CrossfaderCurve::Logarithmic);
        assert_eq!(control.crossfader_curve(), CrossfaderCurve::Logarithmic);

        control.set_deck_volume_cap(true);
        assert!(control.deck_volume_cap());
    }

    #[test]
    fn test_speed_change_reaches_deck() {
        let (control, mut orchestrator) = engine();
        control.set_speed(1, 4.0).unwrap();
        render(&mut orchestrator, 1);
        assert_eq!(control.speed(1).unwrap(), 2.0);
    }

    #[test]
    fn test_meters_follow_a_hot_mix() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hot.wav");
        write_wav(&path, 4_410, i16::MAX);

        let (control, mut orchestrator) = engine();
        control.set_stage_enabled(DynamicsStage::LookAheadLimiter, false);
        control.load(0, &path).unwrap();
        render_until_loaded(&mut orchestrator, &control, 0);
        control.play(0).unwrap();
        render(&mut orchestrator, 2_048);

        // The brickwall holds the output exactly at the threshold
        assert!(control.current_peak_level() > 0.9);
        assert!(control.current_rms_level() > 0.9);
        assert!(control.is_clipping());
        assert_eq!(control.clip_event_count(), 1);
        assert_eq!(control.auto_gain_reduction_factor(), 1.0);
    }

    #[test]
    fn test_shutdown_refuses_further_commands() {
        let (control, mut orchestrator) = engine();
        control.shutdown();
        assert_eq!(control.lifecycle(), EngineState::ShuttingDown);

        render(&mut orchestrator, 4);
        assert_eq!(control.lifecycle(), EngineState::Terminated);
        assert_eq!(control.play(0), Err(ControlError::NotRunning));
    }

    #[test]
    fn test_shutdown_before_start_terminates_immediately() {
        let (control, _orchestrator) = ControlSurface::new(&EngineConfig::default());
        control.shutdown();
        assert_eq!(control.lifecycle(), EngineState::Terminated);
    }
}
