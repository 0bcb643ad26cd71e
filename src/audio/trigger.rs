use std::path::PathBuf;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};
use std::thread::{self, Thread};

use log::info;

const PLAY_BIT: u8 = 1 << 0;
const STOP_BIT: u8 = 1 << 1;
const SHUTDOWN_BIT: u8 = 1 << 2;

/// Event consumed by the playback task's outer wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerEvent {
    Play,
    Stop,
    Shutdown,
}

/// Wake signal between foreign contexts and the playback task.
///
/// Raising a signal touches one atomic and unparks the waiting thread; no
/// locks, no allocation, no I/O, so it is usable from a signal handler or
/// any other context that must never block.
#[derive(Debug, Default)]
struct TriggerSignal {
    bits: AtomicU8,
    waiter: OnceLock<Thread>,
}

impl TriggerSignal {
    /// Block the calling thread until a signal is raised, then consume the
    /// pending bits. Shutdown and stop outrank play when raised together.
    ///
    /// Only the playback task calls this; the first call registers it as the
    /// wake target.
    fn wait(&self) -> TriggerEvent {
        self.waiter.get_or_init(thread::current);
        loop {
            let bits = self.bits.swap(0, Ordering::AcqRel);
            if bits & SHUTDOWN_BIT != 0 {
                return TriggerEvent::Shutdown;
            }
            if bits & STOP_BIT != 0 {
                return TriggerEvent::Stop;
            }
            if bits & PLAY_BIT != 0 {
                return TriggerEvent::Play;
            }
            thread::park();
        }
    }

    /// Consume a pending stop, leaving a pending shutdown visible for the
    /// outer wait. Used by the streaming loop between sink writes.
    fn stop_pending(&self) -> bool {
        let bits = self.bits.fetch_and(!STOP_BIT, Ordering::AcqRel);
        bits & (STOP_BIT | SHUTDOWN_BIT) != 0
    }

    fn raise(&self, bit: u8) {
        self.bits.fetch_or(bit, Ordering::Release);
        if let Some(waiter) = self.waiter.get() {
            waiter.unpark();
        }
    }
}

/// The one cross-context entry point into the playback engine: a pending
/// "play this file" request plus the wake signal pair.
#[derive(Debug, Default)]
pub struct TriggerGateway {
    signal: TriggerSignal,
    path: Mutex<Option<PathBuf>>,
}

impl TriggerGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the file to play on the next trigger. Does not start playback.
    /// Task context only (takes a lock).
    pub fn set_trigger_file(&self, path: impl Into<PathBuf>) {
        let path = path.into();
        info!("Trigger file set: {}", path.display());
        *self.path.lock().unwrap() = Some(path);
    }

    /// The currently armed trigger file, if any.
    pub fn trigger_file(&self) -> Option<PathBuf> {
        self.path.lock().unwrap().clone()
    }

    /// Request playback of the armed trigger file. Interrupt-safe.
    pub fn trigger_playback(&self) {
        self.signal.raise(PLAY_BIT);
    }

    /// Request an unconditional stop. Interrupt-safe.
    pub fn request_stop(&self) {
        self.signal.raise(STOP_BIT);
    }

    /// Ask the playback task to exit its outer loop. Interrupt-safe.
    pub fn request_shutdown(&self) {
        self.signal.raise(SHUTDOWN_BIT);
    }

    /// Playback-task side: block until any signal arrives.
    pub fn wait(&self) -> TriggerEvent {
        self.signal.wait()
    }

    /// Playback-task side: poll for a stop between sink writes.
    pub fn stop_pending(&self) -> bool {
        self.signal.stop_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[test]
    fn test_signal_raised_before_wait_is_consumed_immediately() {
        let gateway = TriggerGateway::new();
        gateway.trigger_playback();
        assert_eq!(gateway.wait(), TriggerEvent::Play);
    }

    #[test]
    fn test_stop_outranks_play() {
        let gateway = TriggerGateway::new();
        gateway.trigger_playback();
        gateway.request_stop();
        assert_eq!(gateway.wait(), TriggerEvent::Stop);
        // The play bit was consumed along with the stop
        gateway.trigger_playback();
        assert_eq!(gateway.wait(), TriggerEvent::Play);
    }

    #[test]
    fn test_shutdown_outranks_everything() {
        let gateway = TriggerGateway::new();
        gateway.trigger_playback();
        gateway.request_stop();
        gateway.request_shutdown();
        assert_eq!(gateway.wait(), TriggerEvent::Shutdown);
    }

    #[test]
    fn test_stop_pending_consumes_only_stop() {
        let gateway = TriggerGateway::new();
        assert!(!gateway.stop_pending());

        gateway.request_stop();
        assert!(gateway.stop_pending());
        assert!(!gateway.stop_pending());

        // Shutdown stays visible for the outer wait
        gateway.request_shutdown();
        assert!(gateway.stop_pending());
        assert_eq!(gateway.wait(), TriggerEvent::Shutdown);
    }

    #[test]
    fn test_trigger_file_round_trip() {
        let gateway = TriggerGateway::new();
        assert!(gateway.trigger_file().is_none());

        gateway.set_trigger_file("/sd/boop.wav");
        assert_eq!(gateway.trigger_file(), Some(PathBuf::from("/sd/boop.wav")));

        // The armed path survives consumption, like the original trigger
        gateway.trigger_playback();
        let _ = gateway.wait();
        assert!(gateway.trigger_file().is_some());
    }

    #[test]
    fn test_wait_is_woken_from_another_thread() {
        let gateway = Arc::new(TriggerGateway::new());
        let waker = Arc::clone(&gateway);

        let task = thread::spawn(move || gateway.wait());

        // Give the task a moment to actually park
        thread::sleep(Duration::from_millis(50));
        waker.set_trigger_file("/sd/wake.wav");
        waker.trigger_playback();

        assert_eq!(task.join().unwrap(), TriggerEvent::Play);
        assert_eq!(waker.trigger_file(), Some(PathBuf::from("/sd/wake.wav")));
    }
}
