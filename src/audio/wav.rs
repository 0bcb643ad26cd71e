use std::io::{self};

use log::info;

use crate::error::DecodeError;
use crate::storage::StorageReader;

/// PCM format tag in the `fmt ` chunk
const WAVE_FORMAT_PCM: u16 = 1;

/// Canonical size of the PCM `fmt ` chunk body; anything beyond is skipped
const FMT_BODY_LEN: u32 = 16;

/// Maximum number of chunks scanned while searching for `data`, so a corrupt
/// file cannot drive the parser through unbounded seeking
const MAX_CHUNK_SCAN: usize = 10;

/// Format description pulled from a WAV file's `fmt ` chunk, plus the size of
/// its `data` payload.
///
/// The decoder only verifies what it needs to parse the container (RIFF/WAVE
/// framing and the PCM format tag). Channel count and bit depth limits are
/// the playback engine's policy and are enforced there.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavFormat {
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub data_size: u32,
}

impl WavFormat {
    pub fn is_mono(&self) -> bool {
        self.channels == 1
    }
}

/// RIFF/WAVE container parser
pub struct WavDecoder;

impl WavDecoder {
    /// Parse the container headers and locate the `data` chunk.
    ///
    /// On success the reader is positioned at the first payload byte. Chunks
    /// other than `data` (`LIST`, `fact`, ...) are skipped by seeking forward
    /// their declared size.
    pub fn decode(reader: &mut dyn StorageReader) -> Result<WavFormat, DecodeError> {
        // RIFF descriptor: "RIFF" + file size + "WAVE"
        let mut riff = [0u8; 12];
        read_header(reader, &mut riff, "RIFF header")?;
        if &riff[0..4] != b"RIFF" {
            return Err(DecodeError::MalformedHeader {
                reason: "missing RIFF tag".to_string(),
            });
        }
        if &riff[8..12] != b"WAVE" {
            return Err(DecodeError::MalformedHeader {
                reason: "missing WAVE tag".to_string(),
            });
        }

        // fmt chunk: id + size + 16-byte canonical PCM body
        let mut fmt = [0u8; 24];
        read_header(reader, &mut fmt, "fmt chunk")?;
        if &fmt[0..4] != b"fmt " {
            return Err(DecodeError::MalformedHeader {
                reason: "missing fmt chunk".to_string(),
            });
        }
        let fmt_size = read_u32_le(&fmt[4..8]);
        let audio_format = read_u16_le(&fmt[8..10]);
        let channels = read_u16_le(&fmt[10..12]);
        let sample_rate = read_u32_le(&fmt[12..16]);
        let byte_rate = read_u32_le(&fmt[16..20]);
        let block_align = read_u16_le(&fmt[20..22]);
        let bits_per_sample = read_u16_le(&fmt[22..24]);

        if audio_format != WAVE_FORMAT_PCM {
            return Err(DecodeError::UnsupportedFormat {
                detail: format!("audio format tag {} is not PCM", audio_format),
            });
        }

        // Extended fmt chunks declare extra bytes past the canonical body
        if fmt_size > FMT_BODY_LEN {
            reader.skip(u64::from(fmt_size - FMT_BODY_LEN))?;
        }

        // Scan for the data chunk, skipping anything else
        for _ in 0..MAX_CHUNK_SCAN {
            let mut header = [0u8; 8];
            if !try_read_exact(reader, &mut header)? {
                break;
            }
            let chunk_size = read_u32_le(&header[4..8]);

            if &header[0..4] == b"data" {
                return Ok(WavFormat {
                    channels,
                    sample_rate,
                    byte_rate,
                    block_align,
                    bits_per_sample,
                    data_size: chunk_size,
                });
            }

            info!(
                "Skipping chunk: {} ({} bytes)",
                String::from_utf8_lossy(&header[0..4]),
                chunk_size
            );
            reader.skip(u64::from(chunk_size))?;
        }

        Err(DecodeError::DataChunkMissing)
    }
}

/// Read a fixed header region; a truncated file is a malformed header, not an
/// IO failure.
fn read_header(
    reader: &mut dyn StorageReader,
    buf: &mut [u8],
    what: &str,
) -> Result<(), DecodeError> {
    reader.read_exact(buf).map_err(|err| {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            DecodeError::MalformedHeader {
                reason: format!("truncated {}", what),
            }
        } else {
            DecodeError::Io(err)
        }
    })
}

/// Read exactly `buf.len()` bytes. Returns `Ok(false)` when the stream ends
/// first (the caller treats that as the end of the chunk list).
fn try_read_exact(reader: &mut dyn StorageReader, buf: &mut [u8]) -> Result<bool, DecodeError> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(DecodeError::Io(err)),
    }
}

fn read_u16_le(bytes: &[u8]) -> u16 {
    u16::from_le_bytes([bytes[0], bytes[1]])
}

fn read_u32_le(bytes: &[u8]) -> u32 {
    u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Build a minimal WAV byte stream with the given fmt fields and payload,
    /// inserting `extra_chunks` between the fmt and data chunks.
    fn build_wav(
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
        payload: &[u8],
        extra_chunks: &[(&[u8; 4], &[u8])],
    ) -> Vec<u8> {
        build_wav_with_format_tag(1, channels, sample_rate, bits_per_sample, payload, extra_chunks)
    }

    fn build_wav_with_format_tag(
        format_tag: u16,
        channels: u16,
        sample_rate: u32,
        bits_per_sample: u16,
        payload: &[u8],
        extra_chunks: &[(&[u8; 4], &[u8])],
    ) -> Vec<u8> {
        let block_align = channels * (bits_per_sample / 8);
        let byte_rate = sample_rate * u32::from(block_align);

        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes()); // riff size, unused by the parser
        bytes.extend_from_slice(b"WAVE");

        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&16u32.to_le_bytes());
        bytes.extend_from_slice(&format_tag.to_le_bytes());
        bytes.extend_from_slice(&channels.to_le_bytes());
        bytes.extend_from_slice(&sample_rate.to_le_bytes());
        bytes.extend_from_slice(&byte_rate.to_le_bytes());
        bytes.extend_from_slice(&block_align.to_le_bytes());
        bytes.extend_from_slice(&bits_per_sample.to_le_bytes());

        for (id, body) in extra_chunks {
            bytes.extend_from_slice(*id);
            bytes.extend_from_slice(&(body.len() as u32).to_le_bytes());
            bytes.extend_from_slice(body);
        }

        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        bytes.extend_from_slice(payload);
        bytes
    }

    #[test]
    fn test_decode_stereo_format() {
        let payload = vec![0u8; 64];
        let mut reader = Cursor::new(build_wav(2, 44100, 16, &payload, &[]));

        let format = WavDecoder::decode(&mut reader).unwrap();
        assert_eq!(format.channels, 2);
        assert_eq!(format.sample_rate, 44100);
        assert_eq!(format.bits_per_sample, 16);
        assert_eq!(format.block_align, 4);
        assert_eq!(format.byte_rate, 176400);
        assert_eq!(format.data_size, 64);
        assert!(!format.is_mono());
    }

    #[test]
    fn test_decode_positions_reader_at_payload() {
        let payload: Vec<u8> = (0u8..32).collect();
        let mut reader = Cursor::new(build_wav(1, 8000, 16, &payload, &[]));

        let format = WavDecoder::decode(&mut reader).unwrap();
        assert!(format.is_mono());

        let mut first = [0u8; 4];
        reader.read_exact(&mut first).unwrap();
        assert_eq!(first, [0, 1, 2, 3]);
    }

    #[test]
    fn test_decode_skips_list_and_fact_chunks() {
        let payload = vec![7u8; 16];
        let chunks: [(&[u8; 4], &[u8]); 2] = [(b"LIST", &[1, 2, 3, 4, 5, 6]), (b"fact", &[0; 4])];
        let mut reader = Cursor::new(build_wav(2, 48000, 16, &payload, &chunks));

        let format = WavDecoder::decode(&mut reader).unwrap();
        assert_eq!(format.data_size, 16);

        let mut first = [0u8; 1];
        reader.read_exact(&mut first).unwrap();
        assert_eq!(first[0], 7);
    }

    #[test]
    fn test_decode_skips_extended_fmt_body() {
        // fmt chunk declaring 18 bytes: 16 canonical + 2 extension bytes
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(b"WAVE");
        bytes.extend_from_slice(b"fmt ");
        bytes.extend_from_slice(&18u32.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
        bytes.extend_from_slice(&2u16.to_le_bytes()); // stereo
        bytes.extend_from_slice(&22050u32.to_le_bytes());
        bytes.extend_from_slice(&88200u32.to_le_bytes());
        bytes.extend_from_slice(&4u16.to_le_bytes());
        bytes.extend_from_slice(&16u16.to_le_bytes());
        bytes.extend_from_slice(&[0xAA, 0xBB]); // extension, must be skipped
        bytes.extend_from_slice(b"data");
        bytes.extend_from_slice(&4u32.to_le_bytes());
        bytes.extend_from_slice(&[1, 2, 3, 4]);

        let mut reader = Cursor::new(bytes);
        let format = WavDecoder::decode(&mut reader).unwrap();
        assert_eq!(format.sample_rate, 22050);
        assert_eq!(format.data_size, 4);
    }

    #[test]
    fn test_decode_rejects_bad_riff_magic() {
        let mut bytes = build_wav(2, 44100, 16, &[0u8; 8], &[]);
        bytes[0..4].copy_from_slice(b"RIFX");
        let mut reader = Cursor::new(bytes);

        match WavDecoder::decode(&mut reader) {
            Err(DecodeError::MalformedHeader { reason }) => {
                assert!(reason.contains("RIFF"));
            }
            other => panic!("Expected MalformedHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_bad_wave_magic() {
        let mut bytes = build_wav(2, 44100, 16, &[0u8; 8], &[]);
        bytes[8..12].copy_from_slice(b"AVI ");
        let mut reader = Cursor::new(bytes);

        match WavDecoder::decode(&mut reader) {
            Err(DecodeError::MalformedHeader { reason }) => {
                assert!(reason.contains("WAVE"));
            }
            other => panic!("Expected MalformedHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_truncated_header() {
        let mut reader = Cursor::new(b"RIFF\x00\x00".to_vec());

        match WavDecoder::decode(&mut reader) {
            Err(DecodeError::MalformedHeader { reason }) => {
                assert!(reason.contains("truncated"));
            }
            other => panic!("Expected MalformedHeader, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_rejects_non_pcm() {
        // Format tag 3 is IEEE float
        let bytes = build_wav_with_format_tag(3, 2, 44100, 32, &[0u8; 8], &[]);
        let mut reader = Cursor::new(bytes);

        match WavDecoder::decode(&mut reader) {
            Err(DecodeError::UnsupportedFormat { detail }) => {
                assert!(detail.contains("not PCM"));
            }
            other => panic!("Expected UnsupportedFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_gives_up_after_chunk_scan_bound() {
        // 11 junk chunks before data: one past the scan bound
        let body = [0u8; 2];
        let junk: Vec<(&[u8; 4], &[u8])> = (0..11).map(|_| (b"JUNK", &body[..])).collect();
        let mut reader = Cursor::new(build_wav(2, 44100, 16, &[0u8; 8], &junk));

        match WavDecoder::decode(&mut reader) {
            Err(DecodeError::DataChunkMissing) => {}
            other => panic!("Expected DataChunkMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_reports_missing_data_chunk_at_eof() {
        // Valid RIFF + fmt, then the stream just ends
        let mut bytes = build_wav(2, 44100, 16, &[], &[]);
        let data_offset = bytes.len() - 8; // "data" + size of empty payload
        bytes.truncate(data_offset);
        let mut reader = Cursor::new(bytes);

        match WavDecoder::decode(&mut reader) {
            Err(DecodeError::DataChunkMissing) => {}
            other => panic!("Expected DataChunkMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_decode_accepts_zero_length_data_chunk() {
        let mut reader = Cursor::new(build_wav(2, 44100, 16, &[], &[]));

        let format = WavDecoder::decode(&mut reader).unwrap();
        assert_eq!(format.data_size, 0);
    }

    #[test]
    fn test_decoder_does_not_validate_channel_count() {
        // 6-channel PCM parses fine; rejecting it is the engine's job
        let bytes = build_wav(6, 44100, 16, &[0u8; 12], &[]);
        let mut reader = Cursor::new(bytes);

        let format = WavDecoder::decode(&mut reader).unwrap();
        assert_eq!(format.channels, 6);
    }
}
