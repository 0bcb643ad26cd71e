use std::fs::File;
use std::io::{self, Read, Seek, SeekFrom};
use std::path::Path;

use crate::error::PlaybackError;

/// Reader over a single opened file on block storage.
///
/// Forward seeking is the only positioning the engine needs (chunk skipping
/// while parsing the container); the handle is closed by dropping it.
pub trait StorageReader: Read + Send {
    /// Skip forward `n` bytes from the current position.
    fn skip(&mut self, n: u64) -> io::Result<()>;
}

impl<T: Read + Seek + Send> StorageReader for T {
    fn skip(&mut self, n: u64) -> io::Result<()> {
        self.seek(SeekFrom::Current(n as i64)).map(|_| ())
    }
}

/// Block storage service: opens files by path for reading.
pub trait BlockStorage: Send {
    fn open(&self, path: &Path) -> Result<Box<dyn StorageReader>, PlaybackError>;
}

/// Filesystem-backed storage (an SD card mount point or any directory tree).
#[derive(Debug, Default)]
pub struct FsStorage;

impl BlockStorage for FsStorage {
    fn open(&self, path: &Path) -> Result<Box<dyn StorageReader>, PlaybackError> {
        match File::open(path) {
            Ok(file) => Ok(Box::new(file)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(PlaybackError::NotFound {
                path: path.display().to_string(),
            }),
            Err(err) => Err(PlaybackError::Io(err)),
        }
    }
}
