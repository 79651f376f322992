use std::{
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
};

use bytes::Bytes;
use tracing::trace;

use super::{Connection, ConnectionError};

/// [`Connection`] over a local file.
#[derive(Debug)]
pub struct FileConnection {
    path: PathBuf,
    file: Option<File>,
}

impl FileConnection {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Connection for FileConnection {
    fn open(&mut self) -> Result<u64, ConnectionError> {
        let file = File::open(&self.path)?;
        let size = file.metadata()?.len();
        trace!(path = %self.path.display(), size, "file opened");
        self.file = Some(file);
        Ok(size)
    }

    fn read_at(&mut self, offset: u64, len: usize) -> Result<Bytes, ConnectionError> {
        let file = self.file.as_mut().ok_or(ConnectionError::NotOpen)?;
        file.seek(SeekFrom::Start(offset))?;

        let mut data = Vec::with_capacity(len);
        file.by_ref()
            .take(u64::try_from(len).unwrap_or(u64::MAX))
            .read_to_end(&mut data)?;
        Ok(Bytes::from(data))
    }

    fn close(&mut self) {
        self.file = None;
    }
}
