//! Compressed format decoding (Symphonia)
//!
//! MP3, FLAC, Ogg Vorbis and AAC/M4A are handed to Symphonia wholesale; this
//! module only drains every packet of the first audio track into one
//! interleaved float buffer.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, SampleBuffer};
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::error::{DecodeError, DecodeResult};
use super::Track;

/// File extensions routed to the compressed decoder
pub(super) const COMPRESSED_EXTENSIONS: &[&str] = &["mp3", "flac", "ogg", "oga", "m4a", "mp4", "aac"];

/// Interleaving scratch, reallocated when a packet outgrows it
#[derive(Default)]
struct Interleaver {
    buf: Option<SampleBuffer<f32>>,
    frames: usize,
    channels: usize,
}

impl Interleaver {
    fn fits(&self, frames: usize, channels: usize) -> bool {
        self.buf.is_some() && frames <= self.frames && channels == self.channels
    }

    /// Interleave one decoded packet into the scratch buffer
    fn interleave(&mut self, decoded: AudioBufferRef<'_>) -> &[f32] {
        let spec = *decoded.spec();
        let frames = decoded.capacity();
        let channels = spec.channels.count();
        if !self.fits(frames, channels) {
            self.frames = self.frames.max(frames);
            self.channels = channels;
            self.buf = Some(SampleBuffer::new(self.frames as u64, spec));
        }

        match self.buf.as_mut() {
            Some(buf) => {
                buf.copy_interleaved_ref(decoded);
                buf.samples()
            }
            None => &[],
        }
    }
}

/// Decode a compressed audio file to a track at its native sample rate
pub(super) fn decode_compressed(path: &Path) -> DecodeResult<Track> {
    let file = File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    // Create a hint with the file extension
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;

    // Find the first audio track
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat("No audio track found".to_string()))?;

    let track_id = track.id;

    let mut sample_rate = track.codec_params.sample_rate;
    let declared_channels = track.codec_params.channels.map(|c| c.count() as u16);
    // Fixed by the first decoded packet
    let mut channels: Option<u16> = None;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut interleaver = Interleaver::default();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                break;
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => {
                log::warn!("Error reading packet from {:?}: {}", path, e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            // Corrupt frames are skipped; the rest of the stream is still usable
            Err(SymphoniaError::DecodeError(e)) => {
                log::warn!("Skipping undecodable packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => {
                log::warn!("Decoder stopped in {:?}: {}", path, e);
                break;
            }
        };

        let spec = *decoded.spec();
        sample_rate.get_or_insert(spec.rate);
        let packet_channels = spec.channels.count() as u16;
        let track_channels = *channels.get_or_insert(packet_channels);

        // A packet with a different layout would misalign every later frame
        if packet_channels != track_channels {
            log::warn!(
                "Skipping {}-channel packet in {}-channel stream {:?}",
                packet_channels,
                track_channels,
                path
            );
            continue;
        }

        samples.extend_from_slice(interleaver.interleave(decoded));
    }

    let sample_rate = sample_rate
        .filter(|rate| *rate > 0)
        .ok_or_else(|| DecodeError::CorruptHeader("stream declares no sample rate".into()))?;
    let channels = channels
        .or(declared_channels)
        .filter(|count| *count > 0)
        .ok_or_else(|| DecodeError::CorruptHeader("stream declares no channels".into()))?;

    Ok(Track::new(samples, channels, sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;

    use symphonia::core::audio::{AsAudioBufferRef, AudioBuffer, Channels, Signal, SignalSpec};

    fn packet(frames: usize, channels: Channels, value: f32) -> AudioBuffer<f32> {
        let mut buf = AudioBuffer::new(frames as u64, SignalSpec::new(44_100, channels));
        buf.render_reserved(Some(frames));
        for ch in 0..buf.spec().channels.count() {
            buf.chan_mut(ch).fill(value);
        }
        buf
    }

    #[test]
    fn test_interleaver_grows_with_packet_size() {
        let mut interleaver = Interleaver::default();
        let small = packet(4, Channels::FRONT_LEFT | Channels::FRONT_RIGHT, 0.25);
        assert_eq!(interleaver.interleave(small.as_audio_buffer_ref()).len(), 8);

        let large = packet(16, Channels::FRONT_LEFT | Channels::FRONT_RIGHT, 0.5);
        let out = interleaver.interleave(large.as_audio_buffer_ref());
        assert_eq!(out.len(), 32);
        assert!(out.iter().all(|&s| s == 0.5));
    }

    #[test]
    fn test_interleaver_follows_channel_count_changes() {
        let mut interleaver = Interleaver::default();
        let mono = packet(8, Channels::FRONT_LEFT, 0.1);
        assert_eq!(interleaver.interleave(mono.as_audio_buffer_ref()).len(), 8);

        // Same frame count, twice the samples
        let stereo = packet(8, Channels::FRONT_LEFT | Channels::FRONT_RIGHT, 0.2);
        let out = interleaver.interleave(stereo.as_audio_buffer_ref());
        assert_eq!(out.len(), 16);
        assert!(out.iter().all(|&s| s == 0.2));

        let mono = packet(4, Channels::FRONT_LEFT, 0.3);
        assert_eq!(interleaver.interleave(mono.as_audio_buffer_ref()), &[0.3; 4]);
    }

    #[test]
    fn test_missing_file_is_io_failure() {
        let result = decode_compressed(Path::new("/nonexistent/track.mp3"));
        assert!(matches!(result, Err(DecodeError::Io(_))));
    }

    #[test]
    fn test_garbage_is_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("noise.mp3");
        std::fs::write(&path, vec![0x5Au8; 64]).unwrap();

        let result = decode_compressed(&path);
        assert!(matches!(result, Err(DecodeError::UnsupportedFormat(_))));
    }
}
