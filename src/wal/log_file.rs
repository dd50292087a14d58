//! Append-only log file with a sequential read cursor.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use crate::error::{MinirelError, Result};

/// Append-only sequential file.
///
/// Writes always land at the end of the file; reads advance a logical
/// cursor that is independent of the append position. Opening an existing
/// file never truncates it, so a log written before a crash survives for
/// recovery.
pub struct LogFile {
    /// Path to the log file.
    path: PathBuf,
    /// Underlying file handle.
    file: File,
    /// Logical read cursor, advanced only by successful reads.
    read_pos: u64,
}

impl LogFile {
    /// Opens or creates the log file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if the file cannot be opened or created.
    pub fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path)
            .map_err(|e| MinirelError::io("open log file", e))?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
            read_pos: 0,
        })
    }

    /// Returns the path to the log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Appends `bytes` at the end of the file.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if seeking or writing fails.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        self.file
            .seek(SeekFrom::End(0))
            .map_err(|e| MinirelError::io("seek to log end", e))?;
        self.file
            .write_all(bytes)
            .map_err(|e| MinirelError::io("append to log", e))
    }

    /// Reads exactly `buf.len()` bytes at the read cursor.
    ///
    /// The cursor advances only on success, so a failed read (including
    /// `UnexpectedEof`) leaves it where it was. Raw `std::io` errors are
    /// returned so the caller can tell end-of-file from real failures.
    pub fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.file.seek(SeekFrom::Start(self.read_pos))?;
        self.file.read_exact(buf)?;
        self.read_pos += buf.len() as u64;
        Ok(())
    }

    /// Current position of the read cursor.
    #[must_use]
    pub fn read_pos(&self) -> u64 {
        self.read_pos
    }

    /// Moves the read cursor back to the start of the file.
    pub fn rewind(&mut self) {
        self.read_pos = 0;
    }

    /// Returns the file length in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if the metadata cannot be read.
    pub fn len(&self) -> Result<u64> {
        self.file
            .metadata()
            .map(|m| m.len())
            .map_err(|e| MinirelError::io("log file metadata", e))
    }

    /// Returns whether the read cursor has reached the end of the file.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if the file length cannot be read.
    pub fn eof(&self) -> Result<bool> {
        Ok(self.read_pos >= self.len()?)
    }

    /// Forces all written data to stable storage.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if the sync fails.
    pub fn sync(&mut self) -> Result<()> {
        self.file
            .sync_all()
            .map_err(|e| MinirelError::io("sync log file", e))
    }

    /// Truncates the file to `len` bytes, clamping the read cursor.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if the truncation fails.
    pub fn truncate(&mut self, len: u64) -> Result<()> {
        self.file
            .set_len(len)
            .map_err(|e| MinirelError::io("truncate log file", e))?;
        self.read_pos = self.read_pos.min(len);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_file() -> (LogFile, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("redo.log");
        let file = LogFile::open(&path).unwrap();
        (file, temp_dir)
    }

    #[test]
    fn test_append_then_read() {
        let (mut file, _temp) = create_test_file();

        file.append(b"hello").unwrap();
        file.append(b"world").unwrap();

        let mut buf = [0u8; 10];
        file.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"helloworld");
        assert!(file.eof().unwrap());
    }

    #[test]
    fn test_read_cursor_independent_of_appends() {
        let (mut file, _temp) = create_test_file();

        file.append(b"abc").unwrap();
        let mut buf = [0u8; 3];
        file.read_exact(&mut buf).unwrap();

        file.append(b"def").unwrap();
        assert!(!file.eof().unwrap());
        file.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"def");
    }

    #[test]
    fn test_short_read_leaves_cursor() {
        let (mut file, _temp) = create_test_file();

        file.append(b"ab").unwrap();
        let mut buf = [0u8; 4];
        let err = file.read_exact(&mut buf).unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::UnexpectedEof);
        assert_eq!(file.read_pos(), 0);
    }

    #[test]
    fn test_open_does_not_truncate() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("redo.log");

        {
            let mut file = LogFile::open(&path).unwrap();
            file.append(b"persist").unwrap();
            file.sync().unwrap();
        }

        let reopened = LogFile::open(&path).unwrap();
        assert_eq!(reopened.len().unwrap(), 7);
    }

    #[test]
    fn test_truncate_resets() {
        let (mut file, _temp) = create_test_file();

        file.append(b"doomed").unwrap();
        file.truncate(0).unwrap();

        assert_eq!(file.len().unwrap(), 0);
        assert_eq!(file.read_pos(), 0);
        assert!(file.eof().unwrap());
    }

    #[test]
    fn test_truncate_to_prefix() {
        let (mut file, _temp) = create_test_file();

        file.append(b"keep/drop").unwrap();
        file.truncate(4).unwrap();

        assert_eq!(file.len().unwrap(), 4);
        let mut buf = [0u8; 4];
        file.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"keep");
    }
}
