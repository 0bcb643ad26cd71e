pub mod audio;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;


pub use audio::{AudioPlayer, AudioSink, OutputConfig, PlaybackEngine, PlaybackState};
pub use error::*;
pub use storage::{BlockStorage, FsStorage, StorageReader};
