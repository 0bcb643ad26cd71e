use std::io;

use log::{debug, error, info};

use crate::error::PlaybackError;
use crate::storage::StorageReader;

/// In-memory copy of a WAV file's entire sample payload.
///
/// Loaded once at session start so the streaming loop never touches slow
/// storage. The read cursor only moves forward; the remaining-byte count is
/// derived from it, so cursor and remaining can never disagree.
#[derive(Debug)]
pub struct SampleCache {
    buffer: Vec<u8>,
    read_offset: usize,
}

impl SampleCache {
    /// Allocate a buffer of exactly `size` bytes and fill it with one bulk
    /// read. Fewer bytes than requested is a `ShortRead` and nothing is
    /// retained.
    pub fn load_all(reader: &mut dyn StorageReader, size: usize) -> Result<Self, PlaybackError> {
        let mut buffer = Vec::new();
        buffer.try_reserve_exact(size).map_err(|_| {
            error!("Failed to allocate {} byte sample cache", size);
            PlaybackError::OutOfMemory { requested: size }
        })?;
        buffer.resize(size, 0);

        info!("Loading {} bytes into RAM...", size);
        let mut filled = 0;
        while filled < size {
            match reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(PlaybackError::Io(err)),
            }
        }

        if filled < size {
            error!("Failed to read audio file: got {}/{} bytes", filled, size);
            return Err(PlaybackError::ShortRead {
                expected: size,
                actual: filled,
            });
        }

        debug!("Audio loaded into RAM, ready for playback");
        Ok(Self {
            buffer,
            read_offset: 0,
        })
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn bytes_remaining(&self) -> usize {
        self.buffer.len() - self.read_offset
    }

    pub fn is_exhausted(&self) -> bool {
        self.bytes_remaining() == 0
    }

    /// Take up to `max_bytes` from the cache, advancing the cursor. An empty
    /// slice is the end-of-stream signal; calling again after exhaustion
    /// keeps returning empty.
    pub fn take_chunk(&mut self, max_bytes: usize) -> &[u8] {
        let n = max_bytes.min(self.bytes_remaining());
        let start = self.read_offset;
        self.read_offset += n;
        &self.buffer[start..start + n]
    }
}

/// Converts the cached sample stream into sink-ready interleaved stereo.
pub struct ChannelExpander;

impl ChannelExpander {
    /// Fill `dest` from the cache and return the number of destination bytes
    /// written. Zero means the cache is exhausted.
    pub fn fill(dest: &mut [u8], cache: &mut SampleCache, mono: bool) -> usize {
        if mono {
            Self::fill_mono(dest, cache)
        } else {
            Self::fill_stereo(dest, cache)
        }
    }

    /// Stereo source: samples are already interleaved L/R, copy verbatim.
    fn fill_stereo(dest: &mut [u8], cache: &mut SampleCache) -> usize {
        let chunk = cache.take_chunk(dest.len());
        let n = chunk.len();
        dest[..n].copy_from_slice(chunk);
        n
    }

    /// Mono source: every 2-byte sample becomes a 4-byte L/R frame, so the
    /// cache is consumed at exactly half the rate `dest` fills.
    fn fill_mono(dest: &mut [u8], cache: &mut SampleCache) -> usize {
        let samples = (dest.len() / 4).min(cache.bytes_remaining() / 2);
        let src = cache.take_chunk(samples * 2);
        for (i, sample) in src.chunks_exact(2).enumerate() {
            let frame = &mut dest[i * 4..i * 4 + 4];
            frame[0..2].copy_from_slice(sample); // Left channel
            frame[2..4].copy_from_slice(sample); // Right channel (duplicate)
        }
        samples * 4
    }
}
