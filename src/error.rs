use thiserror::Error;

/// Main player error type
#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("Playback error: {0}")]
    Playback(#[from] PlaybackError),

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl PlayerError {
    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            PlayerError::Playback(err) => err.user_message(),
            PlayerError::Sink(err) => err.user_message(),
            PlayerError::Config(err) => err.user_message(),
        }
    }

    /// Check if this error allows for automatic recovery
    pub fn is_recoverable(&self) -> bool {
        match self {
            PlayerError::Playback(err) => err.is_recoverable(),
            PlayerError::Sink(err) => err.is_recoverable(),
            PlayerError::Config(err) => err.is_recoverable(),
        }
    }

    /// Get error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            PlayerError::Playback(PlaybackError::Decode(_)) => ErrorSeverity::Warning,
            PlayerError::Playback(PlaybackError::EmptyStream) => ErrorSeverity::Warning,
            PlayerError::Playback(_) => ErrorSeverity::Error,
            PlayerError::Sink(_) => ErrorSeverity::Critical,
            PlayerError::Config(_) => ErrorSeverity::Warning,
        }
    }
}

/// Error severity levels for logging and user feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorSeverity {
    Info,
    Warning,
    Error,
    Critical,
}

impl ErrorSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorSeverity::Info => "INFO",
            ErrorSeverity::Warning => "WARNING",
            ErrorSeverity::Error => "ERROR",
            ErrorSeverity::Critical => "CRITICAL",
        }
    }

    pub fn log_level(&self) -> log::Level {
        match self {
            ErrorSeverity::Info => log::Level::Info,
            ErrorSeverity::Warning => log::Level::Warn,
            ErrorSeverity::Error => log::Level::Error,
            ErrorSeverity::Critical => log::Level::Error,
        }
    }
}

/// WAV container parsing errors
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Malformed header: {reason}")]
    MalformedHeader { reason: String },

    #[error("Unsupported format: {detail}")]
    UnsupportedFormat { detail: String },

    #[error("Data chunk missing")]
    DataChunkMissing,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl DecodeError {
    pub fn user_message(&self) -> String {
        match self {
            DecodeError::MalformedHeader { reason } => {
                format!("File is not a valid WAV file ({})", reason)
            }
            DecodeError::UnsupportedFormat { detail } => {
                format!("WAV format not supported: {}", detail)
            }
            DecodeError::DataChunkMissing => {
                "WAV file contains no audio data chunk".to_string()
            }
            DecodeError::Io(err) => {
                format!("Cannot read WAV file: {}", err)
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            DecodeError::MalformedHeader { .. } => false, // Requires a valid file
            DecodeError::UnsupportedFormat { .. } => false, // Requires conversion
            DecodeError::DataChunkMissing => false,       // Requires a valid file
            DecodeError::Io(_) => true,                   // Storage may recover
        }
    }
}

/// Playback session errors
#[derive(Debug, Error)]
pub enum PlaybackError {
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    #[error("File not found: {path}")]
    NotFound { path: String },

    #[error("Short read: got {actual}/{expected} bytes")]
    ShortRead { expected: usize, actual: usize },

    #[error("Out of memory: failed to allocate {requested} bytes")]
    OutOfMemory { requested: usize },

    #[error("Empty stream: file contains no audio data")]
    EmptyStream,

    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PlaybackError {
    pub fn user_message(&self) -> String {
        match self {
            PlaybackError::Decode(err) => err.user_message(),
            PlaybackError::NotFound { path } => {
                format!("Cannot find audio file: {}", path)
            }
            PlaybackError::ShortRead { expected, actual } => {
                format!(
                    "Audio file appears truncated: read {} of {} bytes",
                    actual, expected
                )
            }
            PlaybackError::OutOfMemory { requested } => {
                format!("Not enough memory to cache {} bytes of audio", requested)
            }
            PlaybackError::EmptyStream => "Audio file contains no samples".to_string(),
            PlaybackError::Sink(err) => err.user_message(),
            PlaybackError::Io(err) => format!("Storage error: {}", err),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            PlaybackError::Decode(err) => err.is_recoverable(),
            PlaybackError::NotFound { .. } => false, // Requires a valid path
            PlaybackError::ShortRead { .. } => false, // Requires an intact file
            PlaybackError::OutOfMemory { .. } => true, // A smaller file may fit
            PlaybackError::EmptyStream => false,     // Requires a non-empty file
            PlaybackError::Sink(err) => err.is_recoverable(),
            PlaybackError::Io(_) => true, // Storage may recover
        }
    }
}

/// Audio output sink errors. Any of these is a hard device failure; transient
/// conditions are reported as short writes, not errors.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("Device not found: {device}")]
    DeviceNotFound { device: String },

    #[error("Device error: {0}")]
    Device(String),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("Sink closed")]
    Closed,
}

impl SinkError {
    pub fn user_message(&self) -> String {
        match self {
            SinkError::DeviceNotFound { device } => {
                format!("Audio device '{}' is not available", device)
            }
            SinkError::Device(msg) => format!("Audio device failure: {}", msg),
            SinkError::Stream(msg) => format!("Audio output interrupted: {}", msg),
            SinkError::Closed => "Audio output has shut down".to_string(),
        }
    }

    pub fn is_recoverable(&self) -> bool {
        match self {
            SinkError::DeviceNotFound { .. } => true, // Can fall back to default device
            SinkError::Device(_) => false,            // Requires device attention
            SinkError::Stream(_) => true,             // Can reopen the stream
            SinkError::Closed => false,               // Sink is gone
        }
    }
}

/// Configuration-related errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration directory not found")]
    ConfigDirNotFound,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] toml::ser::Error),

    #[error("Deserialization error: {0}")]
    DeserializationError(#[from] toml::de::Error),
}

impl ConfigError {
    pub fn user_message(&self) -> String {
        match self {
            ConfigError::ConfigDirNotFound => {
                "Cannot find or create configuration directory".to_string()
            }
            ConfigError::IoError(err) => {
                format!("Cannot access configuration file: {}", err)
            }
            ConfigError::SerializationError(_) => {
                "Failed to save configuration settings".to_string()
            }
            ConfigError::DeserializationError(_) => {
                "Configuration file is corrupted or has invalid format".to_string()
            }
        }
    }

    pub fn is_recoverable(&self) -> bool {
        // Every config failure can fall back to defaults
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_player_error_from_playback_error() {
        let playback_error = PlaybackError::EmptyStream;
        let player_error: PlayerError = playback_error.into();

        match player_error {
            PlayerError::Playback(PlaybackError::EmptyStream) => {}
            _ => panic!("Expected Playback error variant"),
        }
    }

    #[test]
    fn test_playback_error_from_decode_error() {
        let decode_error = DecodeError::DataChunkMissing;
        let playback_error: PlaybackError = decode_error.into();

        match playback_error {
            PlaybackError::Decode(DecodeError::DataChunkMissing) => {}
            _ => panic!("Expected Decode error variant"),
        }
    }

    #[test]
    fn test_playback_error_from_io_error() {
        let io_error = io::Error::new(io::ErrorKind::PermissionDenied, "denied");
        let playback_error: PlaybackError = io_error.into();

        match playback_error {
            PlaybackError::Io(_) => {}
            _ => panic!("Expected Io error variant"),
        }
    }

    #[test]
    fn test_decode_error_display() {
        let error = DecodeError::MalformedHeader {
            reason: "missing RIFF tag".to_string(),
        };
        assert_eq!(format!("{}", error), "Malformed header: missing RIFF tag");

        let error = DecodeError::UnsupportedFormat {
            detail: "audio format tag 3 is not PCM".to_string(),
        };
        assert_eq!(
            format!("{}", error),
            "Unsupported format: audio format tag 3 is not PCM"
        );

        let error = DecodeError::DataChunkMissing;
        assert_eq!(format!("{}", error), "Data chunk missing");
    }

    #[test]
    fn test_playback_error_display() {
        let error = PlaybackError::ShortRead {
            expected: 8000,
            actual: 512,
        };
        assert_eq!(format!("{}", error), "Short read: got 512/8000 bytes");

        let error = PlaybackError::OutOfMemory { requested: 1 << 30 };
        assert!(format!("{}", error).contains("failed to allocate"));

        let error = PlaybackError::NotFound {
            path: "/sd/boop.wav".to_string(),
        };
        assert_eq!(format!("{}", error), "File not found: /sd/boop.wav");
    }

    #[test]
    fn test_sink_error_display() {
        let error = SinkError::DeviceNotFound {
            device: "Speakers".to_string(),
        };
        assert_eq!(format!("{}", error), "Device not found: Speakers");

        let error = SinkError::Stream("stream failed".to_string());
        assert_eq!(format!("{}", error), "Stream error: stream failed");

        let error = SinkError::Closed;
        assert_eq!(format!("{}", error), "Sink closed");
    }

    #[test]
    fn test_severity_log_levels() {
        assert_eq!(ErrorSeverity::Info.log_level(), log::Level::Info);
        assert_eq!(ErrorSeverity::Warning.log_level(), log::Level::Warn);
        assert_eq!(ErrorSeverity::Error.log_level(), log::Level::Error);
        assert_eq!(ErrorSeverity::Critical.log_level(), log::Level::Error);
    }

    #[test]
    fn test_severity_mapping() {
        let error: PlayerError = PlaybackError::Decode(DecodeError::DataChunkMissing).into();
        assert_eq!(error.severity(), ErrorSeverity::Warning);

        let error: PlayerError = SinkError::Closed.into();
        assert_eq!(error.severity(), ErrorSeverity::Critical);

        let error: PlayerError = PlaybackError::ShortRead {
            expected: 10,
            actual: 0,
        }
        .into();
        assert_eq!(error.severity(), ErrorSeverity::Error);
    }

    #[test]
    fn test_recoverability() {
        assert!(!DecodeError::DataChunkMissing.is_recoverable());
        assert!(PlaybackError::OutOfMemory { requested: 1 }.is_recoverable());
        assert!(!PlaybackError::EmptyStream.is_recoverable());
        assert!(SinkError::DeviceNotFound {
            device: "x".to_string()
        }
        .is_recoverable());
        assert!(!SinkError::Closed.is_recoverable());
    }

    #[test]
    fn test_error_source_chain() {
        use std::error::Error;

        let io_error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof");
        let decode_error = DecodeError::Io(io_error);
        let playback_error = PlaybackError::Decode(decode_error);
        let player_error = PlayerError::Playback(playback_error);

        let mut current_error: &dyn Error = &player_error;
        let mut depth = 0;
        while let Some(source) = current_error.source() {
            current_error = source;
            depth += 1;
        }

        assert!(depth >= 2);
    }
}
