//! Positional block file I/O.
//!
//! A thin synchronous wrapper over a database file supporting reads and
//! writes at absolute offsets. The engine performs no concurrent I/O on a
//! single offset; a mutex serializes access to the file cursor.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use parking_lot::Mutex;

use crate::error::StorageResult;

/// A database file accessed by absolute offset.
pub struct BlockFile {
    file: Mutex<File>,
}

impl BlockFile {
    /// Opens (or creates) the file at the given path for read/write access.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }

    /// Reads exactly `buf.len()` bytes starting at `offset`.
    pub fn read_exact_at(&self, buf: &mut [u8], offset: u64) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.read_exact(buf)?;
        Ok(())
    }

    /// Writes all of `buf` starting at `offset`.
    pub fn write_all_at(&self, buf: &[u8], offset: u64) -> StorageResult<()> {
        let mut file = self.file.lock();
        file.seek(SeekFrom::Start(offset))?;
        file.write_all(buf)?;
        Ok(())
    }

    /// Flushes file contents and metadata to stable storage.
    pub fn sync(&self) -> StorageResult<()> {
        self.file.lock().sync_all()?;
        Ok(())
    }

    /// Returns the current length of the file in bytes.
    pub fn len(&self) -> StorageResult<u64> {
        Ok(self.file.lock().metadata()?.len())
    }

    /// Returns true if the file is empty.
    pub fn is_empty(&self) -> StorageResult<bool> {
        Ok(self.len()? == 0)
    }
}

impl std::fmt::Debug for BlockFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BlockFile").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_write_read_round_trip() {
        let dir = tempdir().unwrap();
        let file = BlockFile::open(dir.path().join("test.db")).unwrap();

        file.write_all_at(b"hello", 100).unwrap();
        file.sync().unwrap();

        let mut buf = [0u8; 5];
        file.read_exact_at(&mut buf, 100).unwrap();
        assert_eq!(&buf, b"hello");
    }

    #[test]
    fn test_len() {
        let dir = tempdir().unwrap();
        let file = BlockFile::open(dir.path().join("test.db")).unwrap();
        assert!(file.is_empty().unwrap());

        file.write_all_at(&[0u8; 64], 0).unwrap();
        assert_eq!(file.len().unwrap(), 64);
    }

    #[test]
    fn test_read_past_end_fails() {
        let dir = tempdir().unwrap();
        let file = BlockFile::open(dir.path().join("test.db")).unwrap();

        let mut buf = [0u8; 16];
        assert!(file.read_exact_at(&mut buf, 0).is_err());
    }
}
