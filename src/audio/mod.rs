pub mod cache;
pub mod engine;
pub mod pingpong;
pub mod sink;
pub mod trigger;
pub mod wav;

use crate::error::SinkError;

// Re-export the playback surface
pub use cache::{ChannelExpander, SampleCache};
pub use engine::{AudioPlayer, PlaybackEngine, PlaybackState};
pub use pingpong::{PingPongBuffers, PingPongSlot};
pub use sink::CpalSink;
pub use trigger::{TriggerEvent, TriggerGateway};
pub use wav::{WavDecoder, WavFormat};

/// The sink always runs stereo 16-bit; mono sources are expanded before any
/// byte reaches it.
pub const SINK_CHANNELS: u16 = 2;
pub const SINK_BITS_PER_SAMPLE: u16 = 16;
pub const BYTES_PER_FRAME: usize = 4;

/// Output format negotiated once at sink initialization, independent of
/// whatever source file gets played.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Output device name; the default device when None
    pub device: Option<String>,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            device: None,
        }
    }
}

/// Real-time audio output peripheral abstraction.
///
/// Accepts interleaved stereo 16-bit PCM frames. `write` blocks until the
/// device has taken the bytes (DMA backpressure) and reports the exact count
/// accepted; a short count is a transient underrun, an `Err` is a hard
/// device failure.
pub trait AudioSink: Send {
    fn write(&mut self, data: &[u8]) -> Result<usize, SinkError>;

    /// Push zeroed frames so queued stale audio cannot replay on the next
    /// start. Best-effort.
    fn preload_silence(&mut self, bytes: usize) -> Result<(), SinkError>;
}
