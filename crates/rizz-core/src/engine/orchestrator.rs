//! Render orchestrator - the audio callback's entry point
//!
//! Owned exclusively by the audio thread. Each call to
//! [`RenderOrchestrator::render`]:
//!
//! 1. checks the lifecycle state (anything but `Rendering` is silence)
//! 2. drains the command queue
//! 3. takes one [`MixerSnapshot`] for the whole block
//! 4. pulls every deck, mixes, runs dynamics and interleaves into the
//!    host's buffer
//!
//! Scratch buffers are sized once at construction; the render path never
//! allocates, locks or logs.

use std::sync::Arc;

use super::command::EngineCommand;
use super::deck::{Deck, DeckAtomics};
use super::dynamics::MeterAtomics;
use super::lifecycle::{EngineState, Lifecycle};
use super::mixer::{Mixer, MixerParams, MixerSnapshot};
use crate::types::{StereoBuffer, NUM_DECKS};

/// Largest block rendered in one pass; bigger host buffers are split
pub const MAX_BLOCK_FRAMES: usize = 8192;

pub struct RenderOrchestrator {
    decks: [Deck; NUM_DECKS],
    deck_buffers: [StereoBuffer; NUM_DECKS],
    mix_buffer: StereoBuffer,
    mixer: Mixer,
    params: Arc<MixerParams>,
    commands: rtrb::Consumer<EngineCommand>,
    lifecycle: Arc<Lifecycle>,
    sample_rate: u32,
}

impl RenderOrchestrator {
    /// Allocate every render-path buffer and move the lifecycle to `Ready`
    pub fn new(
        commands: rtrb::Consumer<EngineCommand>,
        params: Arc<MixerParams>,
        lifecycle: Arc<Lifecycle>,
        sample_rate: u32,
        look_ahead_samples: usize,
        rms_window_samples: usize,
    ) -> Self {
        let orchestrator = Self {
            decks: std::array::from_fn(|_| Deck::new()),
            deck_buffers: std::array::from_fn(|_| StereoBuffer::silence(MAX_BLOCK_FRAMES)),
            mix_buffer: StereoBuffer::silence(MAX_BLOCK_FRAMES),
            mixer: Mixer::new(look_ahead_samples, rms_window_samples),
            params,
            commands,
            lifecycle,
            sample_rate,
        };
        orchestrator.lifecycle.initialize();
        orchestrator
    }

    pub fn deck_atomics(&self) -> [Arc<DeckAtomics>; NUM_DECKS] {
        std::array::from_fn(|deck| self.decks[deck].atomics())
    }

    pub fn meter_atomics(&self) -> Arc<MeterAtomics> {
        self.mixer.meter_atomics()
    }

    pub fn lifecycle(&self) -> Arc<Lifecycle> {
        Arc::clone(&self.lifecycle)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn deck(&self, deck: usize) -> Option<&Deck> {
        self.decks.get(deck)
    }

    /// Apply every queued command
    fn process_commands(&mut self) {
        while let Ok(cmd) = self.commands.pop() {
            let Some(deck) = self.decks.get_mut(cmd.deck()) else {
                continue;
            };
            match cmd {
                EngineCommand::LoadTrack { track, .. } => {
                    // The old pointer goes to the collector; no free happens here
                    drop(deck.load_track(track));
                }
                EngineCommand::UnloadTrack { .. } => drop(deck.unload_track()),
                EngineCommand::Play { .. } => deck.play(),
                EngineCommand::Pause { .. } => deck.pause(),
                EngineCommand::Stop { .. } => deck.stop(),
                EngineCommand::Seek { frame, .. } => deck.seek(frame),
                EngineCommand::Nudge { frames, .. } => deck.nudge(frames),
                EngineCommand::SetSpeed { ratio, .. } => deck.set_speed(ratio),
            }
        }
    }

    /// Render one host block of `channels`-interleaved samples
    ///
    /// Channels beyond the first two are silenced; a mono host gets the
    /// average of left and right. Any trailing partial frame is zeroed.
    pub fn render(&mut self, out: &mut [f32], channels: usize) {
        match self.lifecycle.state() {
            EngineState::Rendering => {}
            EngineState::ShuttingDown => {
                out.fill(0.0);
                self.lifecycle.finish_shutdown();
                return;
            }
            _ => {
                out.fill(0.0);
                return;
            }
        }

        if channels == 0 {
            return;
        }

        self.process_commands();
        let snapshot = self.params.snapshot();

        let frames = out.len() / channels;
        let (body, tail) = out.split_at_mut(frames * channels);
        tail.fill(0.0);

        for chunk in body.chunks_mut(MAX_BLOCK_FRAMES * channels) {
            let chunk_frames = chunk.len() / channels;
            self.render_stereo(chunk_frames, &snapshot);

            if channels == 2 {
                chunk.copy_from_slice(self.mix_buffer.as_interleaved());
                continue;
            }

            for (frame, sample) in chunk
                .chunks_exact_mut(channels)
                .zip(self.mix_buffer.as_slice())
            {
                if channels == 1 {
                    frame[0] = (sample.left + sample.right) * 0.5;
                } else {
                    frame[0] = sample.left;
                    frame[1] = sample.right;
                    frame[2..].fill(0.0);
                }
            }
        }
    }

    /// Pull decks and mix `frames` stereo frames into the mix buffer
    fn render_stereo(&mut self, frames: usize, snapshot: &MixerSnapshot) {
        self.mix_buffer.set_len_from_capacity(frames);
        for (deck, buffer) in self.decks.iter_mut().zip(self.deck_buffers.iter_mut()) {
            buffer.set_len_from_capacity(frames);
            deck.pull(buffer.as_mut_slice());
        }
        self.mixer
            .process(&self.deck_buffers, snapshot, &mut self.mix_buffer);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio_file::Track;
    use crate::engine::command::{command_channel, CommandSender};
    use crate::engine::dynamics::DynamicsSettings;
    use crate::engine::gc::gc_handle;
    use crate::engine::mixer::MixerSettings;
    use basedrop::Shared;

    fn setup(dynamics: DynamicsSettings) -> (CommandSender, Arc<MixerParams>, RenderOrchestrator) {
        let (tx, rx) = command_channel(64);
        let params = Arc::new(MixerParams::new(MixerSettings::default(), dynamics));
        let lifecycle = Arc::new(Lifecycle::new());
        let orchestrator =
            RenderOrchestrator::new(rx, Arc::clone(&params), lifecycle, 44_100, 512, 441);
        (tx, params, orchestrator)
    }

    fn no_dynamics() -> DynamicsSettings {
        DynamicsSettings::only(&[])
    }

    fn constant_track(value: f32, frames: usize) -> Shared<Track> {
        Shared::new(&gc_handle(), Track::new(vec![value; frames], 1, 44_100))
    }

    #[test]
    fn test_new_orchestrator_is_ready_and_silent() {
        let (_tx, _params, mut orchestrator) = setup(no_dynamics());
        assert_eq!(orchestrator.lifecycle().state(), EngineState::Ready);

        let mut out = vec![1.0f32; 64];
        orchestrator.render(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_commands_apply_and_mix_reaches_output() {
        let (tx, _params, mut orchestrator) = setup(no_dynamics());
        orchestrator.lifecycle().start();

        tx.send(EngineCommand::LoadTrack {
            deck: 0,
            track: constant_track(0.25, 100),
        })
        .unwrap();
        tx.send(EngineCommand::Play { deck: 0 }).unwrap();

        let mut out = vec![0.0f32; 32];
        orchestrator.render(&mut out, 2);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));

        let atomics = &orchestrator.deck_atomics()[0];
        assert!(atomics.is_playing());
        assert_eq!(atomics.position(), 16);
    }

    #[test]
    fn test_channel_layouts() {
        let (tx, params, mut orchestrator) = setup(no_dynamics());
        orchestrator.lifecycle().start();
        params.set_crossfader(0.0);

        let track = Track::new(vec![0.2, 0.6], 2, 44_100);
        tx.send(EngineCommand::LoadTrack {
            deck: 1,
            track: Shared::new(&gc_handle(), track),
        })
        .unwrap();
        tx.send(EngineCommand::Play { deck: 1 }).unwrap();

        let mut stereo = vec![9.0f32; 5];
        orchestrator.render(&mut stereo, 2);
        assert_eq!(stereo, vec![0.2, 0.6, 0.2, 0.6, 0.0]);

        let mut surround = vec![9.0f32; 8];
        orchestrator.render(&mut surround, 4);
        assert_eq!(&surround[..4], &[0.2, 0.6, 0.0, 0.0]);

        let mut mono = vec![9.0f32; 3];
        orchestrator.render(&mut mono, 1);
        assert!(mono.iter().all(|&s| (s - 0.4).abs() < 1e-6));
    }

    #[test]
    fn test_partial_trailing_frame_is_zeroed() {
        let (tx, _params, mut orchestrator) = setup(no_dynamics());
        orchestrator.lifecycle().start();
        tx.send(EngineCommand::LoadTrack {
            deck: 0,
            track: constant_track(0.5, 10),
        })
        .unwrap();
        tx.send(EngineCommand::Play { deck: 0 }).unwrap();

        let mut out = vec![9.0f32; 5];
        orchestrator.render(&mut out, 2);
        assert_eq!(out, vec![0.5, 0.5, 0.5, 0.5, 0.0]);
    }

    #[test]
    fn test_blocks_larger_than_scratch_are_split() {
        let (tx, _params, mut orchestrator) = setup(no_dynamics());
        orchestrator.lifecycle().start();
        tx.send(EngineCommand::LoadTrack {
            deck: 0,
            track: constant_track(0.1, 1000),
        })
        .unwrap();
        tx.send(EngineCommand::Play { deck: 0 }).unwrap();

        let frames = MAX_BLOCK_FRAMES + 100;
        let mut out = vec![0.0f32; frames * 2];
        orchestrator.render(&mut out, 2);
        assert!(out.iter().all(|&s| (s - 0.1).abs() < 1e-6));
        assert_eq!(
            orchestrator.deck_atomics()[0].position(),
            (frames % 1000) as u64
        );
    }

    #[test]
    fn test_invalid_deck_commands_are_ignored() {
        let (tx, _params, mut orchestrator) = setup(no_dynamics());
        orchestrator.lifecycle().start();
        tx.send(EngineCommand::Play { deck: 7 }).unwrap();

        let mut out = vec![0.0f32; 16];
        orchestrator.render(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_shutdown_renders_silence_then_terminates() {
        let (tx, _params, mut orchestrator) = setup(no_dynamics());
        let lifecycle = orchestrator.lifecycle();
        lifecycle.start();
        tx.send(EngineCommand::LoadTrack {
            deck: 0,
            track: constant_track(0.5, 10),
        })
        .unwrap();
        tx.send(EngineCommand::Play { deck: 0 }).unwrap();

        lifecycle.begin_shutdown();
        let mut out = vec![1.0f32; 8];
        orchestrator.render(&mut out, 2);
        assert!(out.iter().all(|&s| s == 0.0));
        assert_eq!(lifecycle.state(), EngineState::Terminated);
    }

    #[test]
    fn test_dynamics_clamp_hot_mix_and_publish_meters() {
        let (tx, params, mut orchestrator) = setup(DynamicsSettings::default());
        orchestrator.lifecycle().start();
        params.set_deck_gain(0, 2.0);
        tx.send(EngineCommand::LoadTrack {
            deck: 0,
            track: constant_track(0.9, 1000),
        })
        .unwrap();
        tx.send(EngineCommand::Play { deck: 0 }).unwrap();

        let mut out = vec![0.0f32; 1024];
        orchestrator.render(&mut out, 2);

        let threshold = DynamicsSettings::default().clipping_threshold;
        assert!(out.iter().all(|s| s.abs() <= threshold));

        let meters = orchestrator.meter_atomics();
        assert!(meters.peak_level() > 0.0);
        assert!(meters.rms_level() > 0.0);
    }
}
