//! Source reader: audio files to canonical PCM tracks
//!
//! Format selection is closed and static: RIFF/WAVE content is parsed here,
//! everything with a known compressed extension is handed to Symphonia, and
//! anything else is rejected with [`DecodeError::UnsupportedFormat`].
//! Content sniffing wins over the extension, so a mislabeled WAV still loads.

mod compressed;
mod error;
mod resample;
mod wav;

use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

pub use error::{DecodeError, DecodeResult};
pub use resample::resample;

use crate::types::StereoSample;

/// Decoded audio, immutable once built
///
/// Samples are interleaved by channel and normalized to [-1.0, 1.0]. A track
/// is published to a deck as a whole and replaced as a whole; nothing mutates
/// it in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    samples: Vec<f32>,
    channels: u16,
    sample_rate: u32,
}

impl Track {
    /// Build a track from interleaved samples
    ///
    /// A trailing partial frame is dropped so `samples.len()` is always a
    /// multiple of `channels`.
    pub fn new(mut samples: Vec<f32>, channels: u16, sample_rate: u32) -> Self {
        let channels = channels.max(1);
        let whole = samples.len() - samples.len() % channels as usize;
        samples.truncate(whole);
        Self {
            samples,
            channels,
            sample_rate,
        }
    }

    /// Interleaved sample data
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Number of frames (one sample per channel)
    pub fn frame_count(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds at the track's own sample rate
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.frame_count() as f64 / self.sample_rate as f64
    }

    /// Stereo view of one frame
    ///
    /// Mono is duplicated to both sides; for more than two channels the first
    /// two are used. Callers keep `idx < frame_count()`.
    #[inline]
    pub fn frame(&self, idx: usize) -> StereoSample {
        let channels = self.channels as usize;
        let base = idx * channels;
        if channels == 1 {
            StereoSample::mono(self.samples[base])
        } else {
            StereoSample::new(self.samples[base], self.samples[base + 1])
        }
    }

    /// Convert to `rate`, consuming the track (no copy when already there)
    pub fn into_sample_rate(self, rate: u32) -> Self {
        if self.sample_rate == rate {
            return self;
        }
        let samples = resample(&self.samples, self.channels as usize, self.sample_rate, rate);
        Self {
            samples,
            channels: self.channels,
            sample_rate: rate,
        }
    }
}

/// Container family detected for a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SourceKind {
    Wav,
    Compressed,
}

fn detect_kind(path: &Path, header: &[u8]) -> DecodeResult<SourceKind> {
    if header.len() >= 12 && &header[0..4] == b"RIFF" && &header[8..12] == b"WAVE" {
        return Ok(SourceKind::Wav);
    }

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "wav" | "wave" => Err(DecodeError::CorruptHeader(
            "missing RIFF/WAVE container header".into(),
        )),
        ext if compressed::COMPRESSED_EXTENSIONS.contains(&ext) => Ok(SourceKind::Compressed),
        "" => Err(DecodeError::UnsupportedFormat(
            "file has no recognizable header or extension".into(),
        )),
        ext => Err(DecodeError::UnsupportedFormat(format!(".{} files", ext))),
    }
}

/// Decode a file at its native sample rate and channel layout
pub fn read_track<P: AsRef<Path>>(path: P) -> DecodeResult<Track> {
    let path = path.as_ref();
    let mut reader = BufReader::new(File::open(path)?);

    let mut header = Vec::with_capacity(12);
    reader.by_ref().take(12).read_to_end(&mut header)?;
    reader.seek(SeekFrom::Start(0))?;

    match detect_kind(path, &header)? {
        SourceKind::Wav => wav::read_wav(reader),
        SourceKind::Compressed => {
            drop(reader);
            compressed::decode_compressed(path)
        }
    }
}
