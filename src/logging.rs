use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use log::{error, info, warn};

/// Audio event for logging and debugging
#[derive(Debug, Clone)]
pub struct AudioEvent {
    pub timestamp: DateTime<Utc>,
    pub event_type: AudioEventType,
    pub details: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioEventType {
    PlaybackStarted,
    PlaybackStopped,
    TriggerReceived,
    BufferUnderrun,
    DecodeError,
    SinkError,
}

impl AudioEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioEventType::PlaybackStarted => "PLAYBACK_STARTED",
            AudioEventType::PlaybackStopped => "PLAYBACK_STOPPED",
            AudioEventType::TriggerReceived => "TRIGGER_RECEIVED",
            AudioEventType::BufferUnderrun => "BUFFER_UNDERRUN",
            AudioEventType::DecodeError => "DECODE_ERROR",
            AudioEventType::SinkError => "SINK_ERROR",
        }
    }
}

/// Logger for playback operations and debugging
#[derive(Clone)]
pub struct AudioLogger {
    events: Arc<Mutex<VecDeque<AudioEvent>>>,
    max_events: usize,
}

impl AudioLogger {
    pub fn new() -> Self {
        Self {
            events: Arc::new(Mutex::new(VecDeque::new())),
            max_events: 1000, // Keep last 1000 events
        }
    }

    /// Initialize the logging system with appropriate log level
    pub fn init() -> Result<(), Box<dyn std::error::Error>> {
        // Set log level based on environment variable or default to Info
        let log_level =
            std::env::var("WAVPLAY_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let mut builder = env_logger::Builder::new();

        // Custom format for better readability
        builder.format(|buf, record| {
            use std::io::Write;
            writeln!(
                buf,
                "{} [{}] [{}:{}] {}",
                chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"),
                record.level(),
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.args()
            )
        });

        match log_level.to_lowercase().as_str() {
            "trace" => builder.filter_level(log::LevelFilter::Trace),
            "debug" => builder.filter_level(log::LevelFilter::Debug),
            "info" => builder.filter_level(log::LevelFilter::Info),
            "warn" => builder.filter_level(log::LevelFilter::Warn),
            "error" => builder.filter_level(log::LevelFilter::Error),
            _ => builder.filter_level(log::LevelFilter::Info),
        };

        builder.try_init()?;

        info!("Playback logging initialized with level: {}", log_level);
        Ok(())
    }

    /// Record an audio event and route it to the standard logger
    pub fn log_event(&self, event_type: AudioEventType, details: String) {
        let event = AudioEvent {
            timestamp: Utc::now(),
            event_type,
            details: details.clone(),
        };

        {
            let mut events = self.events.lock().unwrap();
            events.push_back(event);
            while events.len() > self.max_events {
                events.pop_front();
            }
        }

        match event_type {
            AudioEventType::PlaybackStarted
            | AudioEventType::PlaybackStopped
            | AudioEventType::TriggerReceived => {
                info!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::BufferUnderrun => {
                warn!("[{}] {}", event_type.as_str(), details);
            }
            AudioEventType::DecodeError | AudioEventType::SinkError => {
                error!("[{}] {}", event_type.as_str(), details);
            }
        }
    }

    pub fn log_playback_started(&self, path: &str) {
        self.log_event(
            AudioEventType::PlaybackStarted,
            format!("Started playing: {}", path),
        );
    }

    pub fn log_playback_stopped(&self, path: &str, underruns: u32) {
        self.log_event(
            AudioEventType::PlaybackStopped,
            format!("Stopped playing: {} (underruns: {})", path, underruns),
        );
    }

    pub fn log_trigger_received(&self, path: &str) {
        self.log_event(
            AudioEventType::TriggerReceived,
            format!("Trigger received for: {}", path),
        );
    }

    pub fn log_underruns(&self, count: u32) {
        self.log_event(
            AudioEventType::BufferUnderrun,
            format!("{} underruns during playback", count),
        );
    }

    /// Most recent events, newest last
    pub fn recent_events(&self, limit: usize) -> Vec<AudioEvent> {
        let events = self.events.lock().unwrap();
        events
            .iter()
            .rev()
            .take(limit)
            .rev()
            .cloned()
            .collect()
    }

    pub fn event_count(&self) -> usize {
        self.events.lock().unwrap().len()
    }
}

impl Default for AudioLogger {
    fn default() -> Self {
        Self::new()
    }
}
