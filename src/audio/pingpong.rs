use crate::audio::cache::{ChannelExpander, SampleCache};
use crate::error::PlaybackError;

/// One half of the double buffer: a fixed-capacity block of sink-ready
/// stereo frames and how many of its bytes are currently valid.
#[derive(Debug)]
pub struct PingPongSlot {
    data: Vec<u8>,
    filled: usize,
}

impl PingPongSlot {
    fn with_capacity(capacity: usize) -> Result<Self, PlaybackError> {
        let mut data = Vec::new();
        data.try_reserve_exact(capacity)
            .map_err(|_| PlaybackError::OutOfMemory {
                requested: capacity,
            })?;
        data.resize(capacity, 0);
        Ok(Self { data, filled: 0 })
    }

    /// The valid bytes, ready to hand to the sink.
    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.filled]
    }

    pub fn filled(&self) -> usize {
        self.filled
    }
}

/// The ping-pong buffer pair.
///
/// Both slots live in one array and a single index marks the playing slot;
/// the loading slot is always the other one, so exactly one slot holds each
/// role at any moment.
#[derive(Debug)]
pub struct PingPongBuffers {
    slots: [PingPongSlot; 2],
    playing: usize,
}

impl PingPongBuffers {
    pub fn new(slot_capacity: usize) -> Result<Self, PlaybackError> {
        Ok(Self {
            slots: [
                PingPongSlot::with_capacity(slot_capacity)?,
                PingPongSlot::with_capacity(slot_capacity)?,
            ],
            playing: 0,
        })
    }

    pub fn slot_capacity(&self) -> usize {
        self.slots[0].data.len()
    }

    /// Restore the start-of-session roles and drop stale fill counts.
    pub fn reset(&mut self) {
        self.playing = 0;
        for slot in &mut self.slots {
            slot.filled = 0;
        }
    }

    pub fn playing(&self) -> &PingPongSlot {
        &self.slots[self.playing]
    }

    pub fn loading_filled(&self) -> usize {
        self.slots[1 - self.playing].filled
    }

    /// Fill the playing slot from the cache (pre-fill phase only).
    pub fn fill_playing(&mut self, cache: &mut SampleCache, mono: bool) -> usize {
        self.fill_index(self.playing, cache, mono)
    }

    /// Fill the loading slot from the cache.
    pub fn fill_loading(&mut self, cache: &mut SampleCache, mono: bool) -> usize {
        self.fill_index(1 - self.playing, cache, mono)
    }

    fn fill_index(&mut self, index: usize, cache: &mut SampleCache, mono: bool) -> usize {
        let slot = &mut self.slots[index];
        let written = ChannelExpander::fill(&mut slot.data, cache, mono);
        slot.filled = written;
        written
    }

    /// Exchange the playing/loading roles. No data moves.
    pub fn swap(&mut self) {
        self.playing = 1 - self.playing;
    }
}
