use std::collections::VecDeque;
use std::sync::mpsc;
use std::sync::{Arc, Condvar, Mutex};
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleFormat, SampleRate, Stream, StreamConfig};
use log::{error, info};

use crate::audio::{AudioSink, OutputConfig, BYTES_PER_FRAME, SINK_CHANNELS};
use crate::error::SinkError;

/// Byte queue between the engine's writer side and the device callback.
///
/// The writer blocks while the queue is full, which gives `write` the same
/// backpressure a DMA peripheral applies; the callback drains it and
/// substitutes silence when starved.
struct FrameQueue {
    state: Mutex<QueueState>,
    signal: Condvar,
    capacity: usize,
}

struct QueueState {
    buf: VecDeque<u8>,
    closed: bool,
}

impl FrameQueue {
    fn new(capacity: usize) -> Self {
        Self {
            state: Mutex::new(QueueState {
                buf: VecDeque::with_capacity(capacity),
                closed: false,
            }),
            signal: Condvar::new(),
            capacity,
        }
    }

    /// Append all of `data`, waiting for space as the callback drains.
    fn push_blocking(&self, data: &[u8]) -> Result<(), SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::Closed)?;
        let mut written = 0;
        while written < data.len() {
            if state.closed {
                return Err(SinkError::Closed);
            }
            let free = self.capacity - state.buf.len();
            if free == 0 {
                state = self.signal.wait(state).map_err(|_| SinkError::Closed)?;
                continue;
            }
            let n = free.min(data.len() - written);
            state.buf.extend(&data[written..written + n]);
            written += n;
        }
        Ok(())
    }

    /// Drain into the callback's sample buffer, zero-filling when starved.
    fn pop_samples(&self, out: &mut [i16]) {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => {
                out.fill(0);
                return;
            }
        };
        for sample in out.iter_mut() {
            *sample = match (state.buf.pop_front(), state.buf.pop_front()) {
                (Some(lo), Some(hi)) => i16::from_le_bytes([lo, hi]),
                _ => 0,
            };
        }
        drop(state);
        self.signal.notify_all();
    }

    /// Replace whatever is pending with zeroed frames.
    fn preload_silence(&self, bytes: usize) -> Result<(), SinkError> {
        let mut state = self.state.lock().map_err(|_| SinkError::Closed)?;
        if state.closed {
            return Err(SinkError::Closed);
        }
        state.buf.clear();
        let n = bytes.min(self.capacity);
        state.buf.extend(std::iter::repeat(0u8).take(n));
        drop(state);
        self.signal.notify_all();
        Ok(())
    }

    fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
        self.signal.notify_all();
    }

    /// Block until `close` is called. Used by the worker that keeps the
    /// stream alive.
    fn wait_closed(&self) {
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        while !state.closed {
            state = match self.signal.wait(state) {
                Ok(state) => state,
                Err(_) => return,
            };
        }
    }
}

/// cpal-backed audio output sink.
///
/// The `cpal::Stream` is not `Send`, so a dedicated worker thread builds and
/// owns it; this handle only carries the shared frame queue, which keeps the
/// sink movable into the playback task.
pub struct CpalSink {
    queue: Arc<FrameQueue>,
    worker: Option<thread::JoinHandle<()>>,
}

impl CpalSink {
    /// Open the configured output device and start its stream.
    pub fn open(config: &OutputConfig) -> Result<Self, SinkError> {
        // Roughly 100 ms of queued audio before a writer blocks
        let capacity = ((config.sample_rate as usize * BYTES_PER_FRAME) / 10).max(4096);
        let queue = Arc::new(FrameQueue::new(capacity));

        let worker_queue = Arc::clone(&queue);
        let worker_config = config.clone();
        let (init_tx, init_rx) = mpsc::channel();

        let worker = thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                match build_stream(&worker_config, Arc::clone(&worker_queue)) {
                    Ok(stream) => {
                        if init_tx.send(Ok(())).is_err() {
                            return;
                        }
                        // The stream lives as long as this thread does
                        worker_queue.wait_closed();
                        drop(stream);
                    }
                    Err(err) => {
                        let _ = init_tx.send(Err(err));
                    }
                }
            })
            .map_err(|e| SinkError::Device(format!("failed to spawn output thread: {}", e)))?;

        match init_rx.recv() {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                queue.close();
                let _ = worker.join();
                return Err(err);
            }
            Err(_) => {
                queue.close();
                let _ = worker.join();
                return Err(SinkError::Device("output thread died during init".to_string()));
            }
        }

        info!(
            "Audio sink ready: {} Hz, stereo, 16-bit ({} byte queue)",
            config.sample_rate, capacity
        );

        Ok(Self {
            queue,
            worker: Some(worker),
        })
    }
}

impl AudioSink for CpalSink {
    fn write(&mut self, data: &[u8]) -> Result<usize, SinkError> {
        self.queue.push_blocking(data)?;
        Ok(data.len())
    }

    fn preload_silence(&mut self, bytes: usize) -> Result<(), SinkError> {
        self.queue.preload_silence(bytes)
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.queue.close();
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

/// List the names of all available output devices.
pub fn list_output_devices() -> Result<Vec<String>, SinkError> {
    let host = cpal::default_host();
    let devices = host
        .output_devices()
        .map_err(|e| SinkError::Device(format!("failed to enumerate devices: {}", e)))?;

    let mut names = Vec::new();
    for device in devices {
        let name = device
            .name()
            .map_err(|e| SinkError::Device(format!("failed to get device name: {}", e)))?;
        names.push(name);
    }
    Ok(names)
}

/// Select a device by name, or the host default when no name is given.
fn select_device(name: Option<&str>) -> Result<cpal::Device, SinkError> {
    let host = cpal::default_host();
    match name {
        Some(wanted) => {
            let mut devices = host
                .output_devices()
                .map_err(|e| SinkError::Device(format!("failed to enumerate devices: {}", e)))?;
            devices
                .find(|d| d.name().map(|n| n == wanted).unwrap_or(false))
                .ok_or_else(|| SinkError::DeviceNotFound {
                    device: wanted.to_string(),
                })
        }
        None => host
            .default_output_device()
            .ok_or_else(|| SinkError::Device("no default output device available".to_string())),
    }
}

/// Build and start the output stream on the calling thread.
fn build_stream(config: &OutputConfig, queue: Arc<FrameQueue>) -> Result<Stream, SinkError> {
    let device = select_device(config.device.as_deref())?;

    let supported = device
        .default_output_config()
        .map_err(|e| SinkError::Device(format!("failed to get default config: {}", e)))?;

    let stream_config = StreamConfig {
        channels: SINK_CHANNELS,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: cpal::BufferSize::Default,
    };

    let stream = match supported.sample_format() {
        SampleFormat::I16 => build_typed_stream::<i16>(&device, &stream_config, queue)?,
        SampleFormat::F32 => build_typed_stream::<f32>(&device, &stream_config, queue)?,
        other => {
            return Err(SinkError::Device(format!(
                "unsupported sample format: {:?}",
                other
            )))
        }
    };

    stream
        .play()
        .map_err(|e| SinkError::Stream(format!("failed to start output stream: {}", e)))?;

    Ok(stream)
}

fn build_typed_stream<T>(
    device: &cpal::Device,
    config: &StreamConfig,
    queue: Arc<FrameQueue>,
) -> Result<Stream, SinkError>
where
    T: cpal::Sample + cpal::SizedSample + Send + 'static,
    T: cpal::FromSample<i16>,
{
    let err_queue = Arc::clone(&queue);
    let mut scratch: Vec<i16> = Vec::new();

    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                scratch.resize(data.len(), 0);
                queue.pop_samples(&mut scratch);
                for (out, sample) in data.iter_mut().zip(&scratch) {
                    *out = cpal::Sample::from_sample(*sample);
                }
            },
            move |err| {
                // A dead stream would block the writer forever; closing the
                // queue turns the condition into a hard Closed error instead.
                error!("Audio stream error: {}", err);
                err_queue.close();
            },
            None,
        )
        .map_err(|e| SinkError::Stream(format!("failed to build output stream: {}", e)))
}
