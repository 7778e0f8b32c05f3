//! RIFF/WAVE reader
//!
//! Walks the chunk list of a RIFF container, decodes the `fmt ` chunk and
//! converts the `data` chunk into normalized interleaved floats. Chunks the
//! reader does not know are skipped by their declared size (plus the RIFF pad
//! byte for odd sizes), so BWF metadata, `LIST`, `cue ` and friends are
//! tolerated wherever they appear.

use std::io::{ErrorKind, Read, Seek, SeekFrom};

use super::error::{DecodeError, DecodeResult};
use super::Track;

const FORMAT_PCM: u16 = 0x0001;
const FORMAT_IEEE_FLOAT: u16 = 0x0003;
const FORMAT_EXTENSIBLE: u16 = 0xFFFE;

/// Larger `fmt ` chunks than this are treated as corrupt rather than allocated
const MAX_FMT_CHUNK_SIZE: u32 = 4096;

/// On-disk sample encoding, resolved from format tag and bit depth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SampleCodec {
    U8,
    I16,
    I24,
    I32,
    F32,
    F64,
}

impl SampleCodec {
    fn width(self) -> usize {
        match self {
            SampleCodec::U8 => 1,
            SampleCodec::I16 => 2,
            SampleCodec::I24 => 3,
            SampleCodec::I32 | SampleCodec::F32 => 4,
            SampleCodec::F64 => 8,
        }
    }

    /// Convert raw little-endian bytes to normalized floats
    ///
    /// Integer formats divide by their full-scale magnitude (2^(bits-1));
    /// float formats pass through unchanged.
    fn decode(self, raw: &[u8]) -> Vec<f32> {
        let width = self.width();
        let chunks = raw.chunks_exact(width);
        match self {
            SampleCodec::U8 => chunks.map(|b| (b[0] as f32 - 128.0) / 128.0).collect(),
            SampleCodec::I16 => chunks
                .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / 32_768.0)
                .collect(),
            SampleCodec::I24 => chunks
                .map(|b| {
                    // Place the 3 bytes in the top of an i32, then shift back to sign-extend
                    let value = i32::from_le_bytes([0, b[0], b[1], b[2]]) >> 8;
                    value as f32 / 8_388_608.0
                })
                .collect(),
            SampleCodec::I32 => chunks
                .map(|b| {
                    let value = i32::from_le_bytes([b[0], b[1], b[2], b[3]]);
                    (value as f64 / 2_147_483_648.0) as f32
                })
                .collect(),
            SampleCodec::F32 => chunks
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect(),
            SampleCodec::F64 => chunks
                .map(|b| {
                    f64::from_le_bytes([b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7]]) as f32
                })
                .collect(),
        }
    }
}

/// Audio format information from the `fmt ` chunk
#[derive(Debug, Clone)]
struct WavFormat {
    channels: u16,
    sample_rate: u32,
    codec: SampleCodec,
}

impl WavFormat {
    fn parse(fmt: &[u8]) -> DecodeResult<Self> {
        if fmt.len() < 16 {
            return Err(DecodeError::CorruptHeader(format!(
                "fmt chunk too small ({} bytes)",
                fmt.len()
            )));
        }

        let mut format_tag = u16::from_le_bytes([fmt[0], fmt[1]]);
        let channels = u16::from_le_bytes([fmt[2], fmt[3]]);
        let sample_rate = u32::from_le_bytes([fmt[4], fmt[5], fmt[6], fmt[7]]);
        let bits_per_sample = u16::from_le_bytes([fmt[14], fmt[15]]);

        if format_tag == FORMAT_EXTENSIBLE {
            // The sub-format GUID starts at byte 24; its first two bytes are the real tag
            if fmt.len() < 26 {
                return Err(DecodeError::CorruptHeader(
                    "extensible fmt chunk truncated".into(),
                ));
            }
            format_tag = u16::from_le_bytes([fmt[24], fmt[25]]);
        }

        let codec = match (format_tag, bits_per_sample) {
            (FORMAT_PCM, 8) => SampleCodec::U8,
            (FORMAT_PCM, 16) => SampleCodec::I16,
            (FORMAT_PCM, 24) => SampleCodec::I24,
            (FORMAT_PCM, 32) => SampleCodec::I32,
            (FORMAT_IEEE_FLOAT, 32) => SampleCodec::F32,
            (FORMAT_IEEE_FLOAT, 64) => SampleCodec::F64,
            (FORMAT_PCM, bits) => {
                return Err(DecodeError::UnsupportedFormat(format!(
                    "{}-bit integer PCM",
                    bits
                )))
            }
            (FORMAT_IEEE_FLOAT, bits) => {
                return Err(DecodeError::UnsupportedFormat(format!(
                    "{}-bit float PCM",
                    bits
                )))
            }
            (tag, _) => {
                return Err(DecodeError::UnsupportedFormat(format!(
                    "WAVE format tag {:#06x}",
                    tag
                )))
            }
        };

        if channels == 0 {
            return Err(DecodeError::CorruptHeader("fmt chunk declares 0 channels".into()));
        }
        if sample_rate == 0 {
            return Err(DecodeError::CorruptHeader(
                "fmt chunk declares a 0 Hz sample rate".into(),
            ));
        }

        Ok(Self {
            channels,
            sample_rate,
            codec,
        })
    }

    fn frame_bytes(&self) -> usize {
        self.codec.width() * self.channels as usize
    }
}

fn truncated(what: &'static str) -> impl FnOnce(std::io::Error) -> DecodeError {
    move |e| {
        if e.kind() == ErrorKind::UnexpectedEof {
            DecodeError::CorruptHeader(format!("{} truncated", what))
        } else {
            DecodeError::Io(e)
        }
    }
}

/// Parse a RIFF/WAVE stream into a track at its native sample rate
pub(super) fn read_wav<R: Read + Seek>(mut reader: R) -> DecodeResult<Track> {
    let mut header = [0u8; 12];
    reader
        .read_exact(&mut header)
        .map_err(truncated("RIFF header"))?;

    if &header[0..4] != b"RIFF" {
        return Err(DecodeError::CorruptHeader("Not a RIFF file".into()));
    }
    if &header[8..12] != b"WAVE" {
        return Err(DecodeError::CorruptHeader("Not a WAVE file".into()));
    }

    let mut format: Option<WavFormat> = None;
    let mut data: Option<(u64, u64)> = None;

    loop {
        let mut chunk_header = [0u8; 8];
        match reader.read_exact(&mut chunk_header) {
            Ok(()) => {}
            // End of the chunk list (or trailing garbage shorter than a header)
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(e.into()),
        }

        let chunk_id = &chunk_header[0..4];
        let chunk_size = u32::from_le_bytes([
            chunk_header[4],
            chunk_header[5],
            chunk_header[6],
            chunk_header[7],
        ]);

        match chunk_id {
            b"fmt " => {
                if chunk_size > MAX_FMT_CHUNK_SIZE {
                    return Err(DecodeError::CorruptHeader(format!(
                        "fmt chunk declares {} bytes",
                        chunk_size
                    )));
                }
                let mut fmt_data = vec![0u8; chunk_size as usize];
                reader
                    .read_exact(&mut fmt_data)
                    .map_err(truncated("fmt chunk"))?;
                format = Some(WavFormat::parse(&fmt_data)?);
            }
            b"data" => {
                let offset = reader.stream_position()?;
                data = Some((offset, chunk_size as u64));
                reader.seek(SeekFrom::Current(chunk_size as i64))?;
            }
            _ => {
                reader.seek(SeekFrom::Current(chunk_size as i64))?;
            }
        }

        // Pad to word boundary
        if chunk_size % 2 != 0 {
            reader.seek(SeekFrom::Current(1))?;
        }
    }

    let format = format.ok_or_else(|| DecodeError::CorruptHeader("missing fmt chunk".into()))?;
    let (data_offset, data_size) =
        data.ok_or_else(|| DecodeError::CorruptHeader("missing data chunk".into()))?;

    reader.seek(SeekFrom::Start(data_offset))?;
    let mut raw = Vec::new();
    reader.by_ref().take(data_size).read_to_end(&mut raw)?;

    if (raw.len() as u64) < data_size {
        log::warn!(
            "WAV data chunk truncated: header declares {} bytes, file holds {}",
            data_size,
            raw.len()
        );
    }

    // Drop any trailing partial frame
    let whole_frames = raw.len() - raw.len() % format.frame_bytes();
    let samples = format.codec.decode(&raw[..whole_frames]);

    Ok(Track::new(samples, format.channels, format.sample_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fmt_chunk(tag: u16, channels: u16, rate: u32, bits: u16) -> Vec<u8> {
        let block_align = channels * bits / 8;
        let mut fmt = Vec::new();
        fmt.extend_from_slice(&tag.to_le_bytes());
        fmt.extend_from_slice(&channels.to_le_bytes());
        fmt.extend_from_slice(&rate.to_le_bytes());
        fmt.extend_from_slice(&(rate * block_align as u32).to_le_bytes());
        fmt.extend_from_slice(&block_align.to_le_bytes());
        fmt.extend_from_slice(&bits.to_le_bytes());
        fmt
    }

    fn riff(chunks: &[(&[u8; 4], Vec<u8>)]) -> Vec<u8> {
        let mut body = b"WAVE".to_vec();
        for (id, payload) in chunks {
            body.extend_from_slice(*id);
            body.extend_from_slice(&(payload.len() as u32).to_le_bytes());
            body.extend_from_slice(payload);
            if payload.len() % 2 != 0 {
                body.push(0);
            }
        }
        let mut file = b"RIFF".to_vec();
        file.extend_from_slice(&(body.len() as u32).to_le_bytes());
        file.extend_from_slice(&body);
        file
    }

    #[test]
    fn test_16bit_pcm_scaling() {
        let samples: [i16; 4] = [i16::MIN, 16_384, 0, -16_384];
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let bytes = riff(&[
            (b"fmt ", fmt_chunk(FORMAT_PCM, 2, 48_000, 16)),
            (b"data", data),
        ]);

        let track = read_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(track.channels(), 2);
        assert_eq!(track.sample_rate(), 48_000);
        assert_eq!(track.frame_count(), 2);
        assert_eq!(track.samples(), &[-1.0, 0.5, 0.0, -0.5]);
    }

    #[test]
    fn test_32bit_int_scaling() {
        let samples: [i32; 2] = [i32::MIN, 1 << 30];
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let bytes = riff(&[
            (b"fmt ", fmt_chunk(FORMAT_PCM, 1, 44_100, 32)),
            (b"data", data),
        ]);

        let track = read_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(track.samples(), &[-1.0, 0.5]);
    }

    #[test]
    fn test_24bit_sign_extension() {
        // -8388608 (min) and +4194304 (half scale)
        let data = vec![0x00, 0x00, 0x80, 0x00, 0x00, 0x40];
        let bytes = riff(&[
            (b"fmt ", fmt_chunk(FORMAT_PCM, 1, 44_100, 24)),
            (b"data", data),
        ]);

        let track = read_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(track.samples(), &[-1.0, 0.5]);
    }

    #[test]
    fn test_float_passes_through_unchanged() {
        let samples: [f32; 4] = [0.25, -0.75, 1.5, -0.125];
        let data: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let bytes = riff(&[
            (b"fmt ", fmt_chunk(FORMAT_IEEE_FLOAT, 2, 44_100, 32)),
            (b"data", data),
        ]);

        let track = read_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(track.samples(), &samples);
    }

    #[test]
    fn test_unknown_chunks_are_skipped() {
        let data: Vec<u8> = [1000i16, -1000].iter().flat_map(|s| s.to_le_bytes()).collect();
        let bytes = riff(&[
            (b"bext", vec![0xAB; 7]), // odd size exercises the pad byte
            (b"fmt ", fmt_chunk(FORMAT_PCM, 1, 22_050, 16)),
            (b"LIST", b"INFOjunk".to_vec()),
            (b"data", data),
            (b"cue ", vec![0; 4]),
        ]);

        let track = read_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(track.sample_rate(), 22_050);
        assert_eq!(track.frame_count(), 2);
        assert!((track.samples()[0] - 1000.0 / 32_768.0).abs() < 1e-7);
    }

    #[test]
    fn test_data_before_fmt() {
        let data: Vec<u8> = [16_384i16].iter().flat_map(|s| s.to_le_bytes()).collect();
        let bytes = riff(&[
            (b"data", data),
            (b"fmt ", fmt_chunk(FORMAT_PCM, 1, 44_100, 16)),
        ]);

        let track = read_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(track.samples(), &[0.5]);
    }

    #[test]
    fn test_missing_chunks_are_corrupt() {
        let no_data = riff(&[(b"fmt ", fmt_chunk(FORMAT_PCM, 2, 44_100, 16))]);
        assert!(matches!(
            read_wav(Cursor::new(no_data)),
            Err(DecodeError::CorruptHeader(_))
        ));

        let no_fmt = riff(&[(b"data", vec![0; 8])]);
        assert!(matches!(
            read_wav(Cursor::new(no_fmt)),
            Err(DecodeError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_bad_container_tags() {
        let mut not_riff = riff(&[]);
        not_riff[0..4].copy_from_slice(b"RIFX");
        assert!(matches!(
            read_wav(Cursor::new(not_riff)),
            Err(DecodeError::CorruptHeader(_))
        ));

        let mut not_wave = riff(&[]);
        not_wave[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(
            read_wav(Cursor::new(not_wave)),
            Err(DecodeError::CorruptHeader(_))
        ));

        assert!(matches!(
            read_wav(Cursor::new(b"RIFF".to_vec())),
            Err(DecodeError::CorruptHeader(_))
        ));
    }

    #[test]
    fn test_unsupported_encoding() {
        // 0x0002 = Microsoft ADPCM
        let bytes = riff(&[
            (b"fmt ", fmt_chunk(0x0002, 2, 44_100, 4)),
            (b"data", vec![0; 8]),
        ]);
        assert!(matches!(
            read_wav(Cursor::new(bytes)),
            Err(DecodeError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_extensible_float_subformat() {
        let mut fmt = fmt_chunk(FORMAT_EXTENSIBLE, 1, 48_000, 32);
        fmt.extend_from_slice(&22u16.to_le_bytes()); // cbSize
        fmt.extend_from_slice(&32u16.to_le_bytes()); // valid bits
        fmt.extend_from_slice(&4u32.to_le_bytes()); // channel mask
        fmt.extend_from_slice(&FORMAT_IEEE_FLOAT.to_le_bytes());
        fmt.extend_from_slice(&[0; 14]); // rest of the GUID
        let bytes = riff(&[(b"fmt ", fmt), (b"data", 0.5f32.to_le_bytes().to_vec())]);

        let track = read_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(track.samples(), &[0.5]);
    }

    #[test]
    fn test_truncated_data_keeps_whole_frames() {
        let mut bytes = riff(&[
            (b"fmt ", fmt_chunk(FORMAT_PCM, 2, 44_100, 16)),
            (b"data", vec![0; 8]),
        ]);
        // Chop 3 bytes off the end: one full frame plus one stray byte remain
        bytes.truncate(bytes.len() - 3);

        let track = read_wav(Cursor::new(bytes)).unwrap();
        assert_eq!(track.frame_count(), 1);
    }
}
