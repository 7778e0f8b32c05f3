//! Rizz Player - headless two-deck player
//!
//! Loads up to two tracks, starts the default (or configured) output device
//! and plays both decks through the crossfader for a fixed time, logging the
//! master meters as it goes.
//!
//! ## Command line flags
//!
//! - `--config PATH`: engine config (default: `~/.config/rizz/config.yaml`)
//! - `--list-devices`: print output devices and exit
//! - `--seconds N`: play time before shutting down
//! - `--crossfader X` / `--curve NAME`: initial crossfader state

mod args;

use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use rizz_core::audio::{output_devices, start_audio_system};
use rizz_core::config::{default_config_path, load_config, EngineConfig};
use rizz_core::control::ControlSurface;

const METER_INTERVAL: Duration = Duration::from_millis(500);
const LOAD_PROGRESS_INTERVAL: Duration = Duration::from_secs(2);

fn list_devices() -> Result<()> {
    let devices = output_devices().context("Failed to enumerate output devices")?;
    if devices.is_empty() {
        println!("No output devices found");
    }
    for device in devices {
        println!("{}", device);
    }
    Ok(())
}

fn main() -> Result<()> {
    // Set RUST_LOG=debug for verbose output
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let raw: Vec<String> = std::env::args().skip(1).collect();
    let args = args::parse_args(&raw)?;

    if args.list_devices {
        return list_devices();
    }

    let config_path = args.config_path.clone().unwrap_or_else(default_config_path);
    let config: EngineConfig = load_config(&config_path);
    log::info!("rizz-player starting up (config {:?})", config_path);

    let (control, orchestrator) = ControlSurface::new(&config);

    if let Some(curve) = args.curve {
        control.set_crossfader_curve(curve);
    }
    if let Some(position) = args.crossfader {
        control.set_crossfader(position)?;
    }

    // Queue every deck up front; the loader works through them in order
    let mut pending = Vec::new();
    for (deck, path) in args.decks.iter().enumerate() {
        match control.load_async(deck, path) {
            Ok(load) => pending.push((load, path)),
            Err(e) => log::error!("Deck {}: failed to load {:?}: {}", deck, path, e),
        }
    }

    let mut loaded = Vec::new();
    for (load, path) in pending {
        let deck = load.deck();
        let result = loop {
            match load.wait_timeout(LOAD_PROGRESS_INTERVAL) {
                Some(result) => break result,
                None => log::info!("Deck {}: still loading {:?}", deck, path),
            }
        };
        match result {
            Ok(info) => {
                log::info!(
                    "Deck {}: {:?} ({:.1}s, {} ch, {}Hz source)",
                    deck,
                    info.path,
                    info.duration_seconds,
                    info.channels,
                    info.source_sample_rate
                );
                loaded.push(deck);
            }
            Err(e) => log::error!("Deck {}: failed to load {:?}: {}", deck, path, e),
        }
    }

    let mut audio = start_audio_system(&config.audio, orchestrator)
        .context("Failed to start audio output")?;
    println!(
        "Playing on {} ({} Hz, {} ch)",
        audio.device_name(),
        audio.sample_rate(),
        audio.channels()
    );

    for &deck in &loaded {
        control.play(deck)?;
    }

    let started = Instant::now();
    let play_time = Duration::from_secs_f64(args.seconds);
    while started.elapsed() < play_time {
        thread::sleep(METER_INTERVAL.min(play_time.saturating_sub(started.elapsed())));
        log::info!(
            "peak {:.3} rms {:.3} clipping {} ({} events) auto-gain {:.2} | A {:.1}s B {:.1}s",
            control.current_peak_level(),
            control.current_rms_level(),
            control.is_clipping(),
            control.clip_event_count(),
            control.auto_gain_reduction_factor(),
            control.position(0)?,
            control.position(1)?,
        );
    }

    control.shutdown();
    audio.stop();
    log::info!("rizz-player finished ({})", control.lifecycle());
    Ok(())
}
