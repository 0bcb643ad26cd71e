use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;

use log::{debug, error, info, warn};

use crate::audio::cache::SampleCache;
use crate::audio::pingpong::PingPongBuffers;
use crate::audio::trigger::{TriggerEvent, TriggerGateway};
use crate::audio::wav::{WavDecoder, WavFormat};
use crate::audio::AudioSink;
use crate::error::{DecodeError, PlaybackError};
use crate::storage::BlockStorage;

/// Bytes of silence pushed into the sink on stop, so queued DMA descriptors
/// cannot replay stale audio on the next start
const SILENCE_FLUSH_BYTES: usize = 128;

/// Streaming iterations between progress log lines
const PROGRESS_LOG_INTERVAL: u32 = 20;

/// Playback engine states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Decoding,
    Preloading,
    Streaming,
    Draining,
}

/// State observable from outside the playback task. The task writes,
/// everyone else only reads.
#[derive(Debug, Default)]
pub struct SharedState {
    playing: AtomicBool,
    underruns: AtomicU32,
}

impl SharedState {
    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    pub fn underruns(&self) -> u32 {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// One playback session's exclusively-owned data. Lives on `play`'s call
/// frame, so the cache is released on every exit path.
struct PlaybackSession {
    format: WavFormat,
    cache: SampleCache,
    mono: bool,
}

/// The playback state machine.
///
/// Owns the storage service, the output sink and the ping-pong buffers;
/// nothing here is shared with other tasks except the trigger gateway and
/// the read-only `SharedState` atomics.
pub struct PlaybackEngine {
    storage: Box<dyn BlockStorage>,
    sink: Box<dyn AudioSink>,
    slots: PingPongBuffers,
    state: PlaybackState,
    sample_rate: u32,
    gateway: Arc<TriggerGateway>,
    shared: Arc<SharedState>,
}

impl PlaybackEngine {
    pub fn new(
        storage: Box<dyn BlockStorage>,
        sink: Box<dyn AudioSink>,
        slot_capacity: usize,
        sample_rate: u32,
    ) -> Result<Self, PlaybackError> {
        let slots = PingPongBuffers::new(slot_capacity)?;
        info!("Allocated {} byte ping-pong buffers", slot_capacity);

        Ok(Self {
            storage,
            sink,
            slots,
            state: PlaybackState::Idle,
            sample_rate,
            gateway: Arc::new(TriggerGateway::new()),
            shared: Arc::new(SharedState::default()),
        })
    }

    /// The gateway foreign tasks use to trigger or stop this engine.
    pub fn gateway(&self) -> Arc<TriggerGateway> {
        Arc::clone(&self.gateway)
    }

    /// The externally observable playing flag and underrun counter.
    pub fn shared(&self) -> Arc<SharedState> {
        Arc::clone(&self.shared)
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    pub fn underruns(&self) -> u32 {
        self.shared.underruns()
    }

    /// Play `path` to completion. Blocks the calling task for the whole
    /// session; a stop raised through the gateway ends it between writes.
    pub fn play(&mut self, path: &Path) -> Result<(), PlaybackError> {
        if self.state != PlaybackState::Idle {
            warn!("Session already active, stopping it first");
            self.stop();
        }
        self.shared.underruns.store(0, Ordering::Relaxed);

        match self.run_session(path) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.state = PlaybackState::Idle;
                self.shared.playing.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    /// Stop playback and reset to idle. Never fails: cleanup is best-effort
    /// and a sink error during the silence flush is discarded.
    pub fn stop(&mut self) {
        let was_playing = self.shared.playing.swap(false, Ordering::AcqRel);
        self.state = PlaybackState::Idle;

        if let Err(err) = self.sink.preload_silence(SILENCE_FLUSH_BYTES) {
            debug!("Silence flush failed: {}", err);
        }

        if was_playing {
            info!(
                "Playback stopped (underruns: {})",
                self.shared.underruns.load(Ordering::Relaxed)
            );
        }
    }

    fn run_session(&mut self, path: &Path) -> Result<(), PlaybackError> {
        let mut session = self.open_session(path)?;
        self.prefill(&mut session, path)?;

        self.state = PlaybackState::Streaming;
        self.shared.playing.store(true, Ordering::Release);

        let streamed = self.stream_loop(&mut session);
        self.stop();
        if streamed.is_ok() {
            info!(
                "Playback complete ({} source bytes)",
                session.format.data_size
            );
        }
        streamed
        // session drops here: the cache is released no matter how the
        // streaming loop ended
    }

    /// Decode the header, validate the format and cache the whole payload.
    fn open_session(&mut self, path: &Path) -> Result<PlaybackSession, PlaybackError> {
        self.state = PlaybackState::Decoding;
        info!("Playing: {}", path.display());

        let mut reader = self.storage.open(path)?;
        let format = WavDecoder::decode(reader.as_mut())?;
        validate_format(&format)?;

        info!(
            "Format: {} Hz, {} ch, {} bit, {} bytes",
            format.sample_rate, format.channels, format.bits_per_sample, format.data_size
        );
        if format.sample_rate != self.sample_rate {
            warn!(
                "Sample rate mismatch: file={} Hz, output={} Hz",
                format.sample_rate, self.sample_rate
            );
        }
        check_block_align(&format);

        self.state = PlaybackState::Preloading;
        let cache = SampleCache::load_all(reader.as_mut(), format.data_size as usize)?;

        let mono = format.is_mono();
        if mono {
            info!("Mono file - duplicating samples to both channels");
        }

        Ok(PlaybackSession {
            format,
            cache,
            mono,
        })
    }

    /// Fill both slots before the first sink write, so the device never
    /// starts against an empty buffer.
    fn prefill(&mut self, session: &mut PlaybackSession, path: &Path) -> Result<(), PlaybackError> {
        self.slots.reset();

        let first = self
            .slots
            .fill_playing(&mut session.cache, session.mono);
        if first == 0 {
            error!("No audio data produced from {}", path.display());
            return Err(PlaybackError::EmptyStream);
        }

        let second = self
            .slots
            .fill_loading(&mut session.cache, session.mono);
        if second == 0 {
            warn!("File too small for double buffering (only one buffer filled)");
        }

        Ok(())
    }

    /// The ping-pong alternation: write the playing slot, swap, refill the
    /// just-played slot while the sink drains the other one.
    fn stream_loop(&mut self, session: &mut PlaybackSession) -> Result<(), PlaybackError> {
        info!("Starting playback loop");
        let mut iteration: u32 = 0;

        loop {
            if self.gateway.stop_pending() {
                info!("Stop requested, ending playback");
                return Ok(());
            }

            iteration += 1;
            self.write_playing_slot()?;

            if iteration % PROGRESS_LOG_INTERVAL == 0 {
                info!(
                    "Iteration {}: {} bytes remaining in cache",
                    iteration,
                    session.cache.bytes_remaining()
                );
            }

            // The just-written slot becomes the loading slot before it is
            // refilled; a prefilled second buffer is never overwritten while
            // it still holds unplayed samples.
            self.slots.swap();
            let loaded = self.slots.fill_loading(&mut session.cache, session.mono);
            if loaded == 0 {
                if self.slots.playing().filled() > 0 {
                    self.state = PlaybackState::Draining;
                    if self.gateway.stop_pending() {
                        info!("Stop requested, ending playback");
                        return Ok(());
                    }
                    self.write_playing_slot()?;
                }
                info!("Reached end of stream after {} iterations", iteration);
                return Ok(());
            }
        }
    }

    /// Hand the playing slot to the sink. Blocks until the sink has taken
    /// the bytes; a short count is an underrun, an error aborts the session.
    fn write_playing_slot(&mut self) -> Result<(), PlaybackError> {
        let requested = self.slots.playing().filled();
        let accepted = match self.sink.write(self.slots.playing().bytes()) {
            Ok(accepted) => accepted,
            Err(err) => {
                error!("Sink write failed: {}", err);
                return Err(PlaybackError::Sink(err));
            }
        };

        if accepted < requested {
            warn!("Partial write: {}/{} bytes", accepted, requested);
            self.shared.underruns.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }
}

/// Channel count and bit depth limits are playback policy, enforced here
/// rather than in the decoder.
fn validate_format(format: &WavFormat) -> Result<(), PlaybackError> {
    if format.channels != 1 && format.channels != 2 {
        error!(
            "Only mono or stereo files supported (got {} channels)",
            format.channels
        );
        return Err(DecodeError::UnsupportedFormat {
            detail: format!("{} channels", format.channels),
        }
        .into());
    }
    if format.bits_per_sample != 16 {
        error!(
            "Only 16-bit samples supported (got {})",
            format.bits_per_sample
        );
        return Err(DecodeError::UnsupportedFormat {
            detail: format!("{}-bit samples", format.bits_per_sample),
        }
        .into());
    }
    Ok(())
}

fn check_block_align(format: &WavFormat) {
    let expected = format.channels * 2;
    if format.block_align != expected {
        warn!(
            "Unexpected block align for {}-channel 16-bit audio: {} (expected {})",
            format.channels, format.block_align, expected
        );
    }
}

/// Public surface of the playback engine.
///
/// Owns the dedicated playback task; foreign tasks reach the engine only
/// through the trigger gateway and the shared read-only atomics.
pub struct AudioPlayer {
    gateway: Arc<TriggerGateway>,
    shared: Arc<SharedState>,
    engine: Option<PlaybackEngine>,
    task: Option<thread::JoinHandle<()>>,
}

impl AudioPlayer {
    pub fn new(
        storage: Box<dyn BlockStorage>,
        sink: Box<dyn AudioSink>,
        slot_capacity: usize,
        sample_rate: u32,
    ) -> Result<Self, PlaybackError> {
        let engine = PlaybackEngine::new(storage, sink, slot_capacity, sample_rate)?;
        Ok(Self {
            gateway: engine.gateway(),
            shared: engine.shared(),
            engine: Some(engine),
            task: None,
        })
    }

    /// Spawn the playback task. A second call is a no-op.
    pub fn start(&mut self) -> Result<(), PlaybackError> {
        let Some(engine) = self.engine.take() else {
            warn!("Playback task already running");
            return Ok(());
        };

        let gateway = Arc::clone(&self.gateway);
        let task = thread::Builder::new()
            .name("audio-player".to_string())
            .spawn(move || playback_task(engine, gateway))
            .map_err(PlaybackError::Io)?;

        self.task = Some(task);
        info!("Audio task started");
        Ok(())
    }

    /// The gateway handle, for callers that need to raise signals from
    /// their own contexts (signal handlers, other tasks).
    pub fn gateway(&self) -> Arc<TriggerGateway> {
        Arc::clone(&self.gateway)
    }

    /// Set the file to play when triggered. Does not start playback.
    pub fn set_trigger_file(&self, path: impl Into<std::path::PathBuf>) {
        self.gateway.set_trigger_file(path);
    }

    /// Wake the playback task to play the armed trigger file.
    /// Interrupt-safe: one atomic store and an unpark, nothing else.
    pub fn trigger_playback(&self) {
        self.gateway.trigger_playback();
    }

    /// Arm `path` and trigger playback of it.
    pub fn play_file(&self, path: impl Into<std::path::PathBuf>) {
        self.gateway.set_trigger_file(path);
        self.gateway.trigger_playback();
    }

    /// Request an unconditional stop. Interrupt-safe.
    pub fn stop(&self) {
        self.gateway.request_stop();
    }

    pub fn is_playing(&self) -> bool {
        self.shared.is_playing()
    }

    pub fn underruns(&self) -> u32 {
        self.shared.underruns()
    }

    /// Stop the playback task and wait for it to exit.
    pub fn shutdown(&mut self) {
        if let Some(task) = self.task.take() {
            self.gateway.request_shutdown();
            if task.join().is_err() {
                error!("Audio task panicked");
            }
        }
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// The dedicated playback task: wait for a trigger, play, repeat.
fn playback_task(mut engine: PlaybackEngine, gateway: Arc<TriggerGateway>) {
    info!("Audio task running");
    loop {
        match gateway.wait() {
            TriggerEvent::Shutdown => {
                engine.stop();
                break;
            }
            TriggerEvent::Stop => engine.stop(),
            TriggerEvent::Play => {
                let Some(path) = gateway.trigger_file() else {
                    warn!("Playback triggered with no trigger file set");
                    continue;
                };
                if let Err(err) = engine.play(&path) {
                    error!("Failed to play {}: {}", path.display(), err);
                }
            }
        }
    }
    info!("Audio task exited");
}
