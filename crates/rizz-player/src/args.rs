//! Command line parsing
//!
//! ```text
//! rizz-player [--config PATH] [--seconds N] [--crossfader X] [--curve NAME]
//!             [--list-devices] [DECK_A] [DECK_B]
//! ```

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use rizz_core::engine::CrossfaderCurve;
use rizz_core::NUM_DECKS;

/// How long to play when `--seconds` is not given
pub const DEFAULT_PLAY_SECONDS: f64 = 30.0;

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerArgs {
    pub config_path: Option<PathBuf>,
    pub list_devices: bool,
    pub seconds: f64,
    pub crossfader: Option<f32>,
    pub curve: Option<CrossfaderCurve>,
    /// Track per deck, in deck order
    pub decks: Vec<PathBuf>,
}

impl Default for PlayerArgs {
    fn default() -> Self {
        Self {
            config_path: None,
            list_devices: false,
            seconds: DEFAULT_PLAY_SECONDS,
            crossfader: None,
            curve: None,
            decks: Vec::new(),
        }
    }
}

fn value<'a>(flag: &str, iter: &mut impl Iterator<Item = &'a String>) -> Result<&'a String> {
    iter.next().with_context(|| format!("{} needs a value", flag))
}

/// Parse arguments (without the program name)
pub fn parse_args(args: &[String]) -> Result<PlayerArgs> {
    let mut parsed = PlayerArgs::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => parsed.config_path = Some(PathBuf::from(value(arg, &mut iter)?)),
            "--list-devices" => parsed.list_devices = true,
            "--seconds" => {
                let raw = value(arg, &mut iter)?;
                let seconds: f64 = raw
                    .parse()
                    .with_context(|| format!("invalid --seconds value '{}'", raw))?;
                if !seconds.is_finite() || seconds < 0.0 {
                    bail!("--seconds must be a non-negative number, got {}", raw);
                }
                parsed.seconds = seconds;
            }
            "--crossfader" => {
                let raw = value(arg, &mut iter)?;
                let position: f32 = raw
                    .parse()
                    .with_context(|| format!("invalid --crossfader value '{}'", raw))?;
                parsed.crossfader = Some(position);
            }
            "--curve" => {
                let raw = value(arg, &mut iter)?;
                let curve = CrossfaderCurve::from_name(raw).with_context(|| {
                    let names: Vec<_> = CrossfaderCurve::ALL.iter().map(|c| c.name()).collect();
                    format!("unknown curve '{}' (expected one of {})", raw, names.join(", "))
                })?;
                parsed.curve = Some(curve);
            }
            flag if flag.starts_with("--") => bail!("unknown flag {}", flag),
            path => {
                if parsed.decks.len() == NUM_DECKS {
                    bail!("at most {} tracks can be given", NUM_DECKS);
                }
                parsed.decks.push(PathBuf::from(path));
            }
        }
    }

    Ok(parsed)
}
