//! Forward cursor over a redo log file.

use std::io::ErrorKind;
use std::path::Path;

use crate::error::{MinirelError, Result};
use crate::wal::entry::{LogEntry, LogEntryHeader, LOG_HEADER_SIZE};
use crate::wal::log_file::LogFile;

/// Forward iterator yielding whole log entries in append order.
///
/// Clean end-of-file at a record boundary yields `Ok(None)`. A record cut
/// short by a crash mid-write (header bytes missing, or a header whose
/// payload runs off the end) yields [`MinirelError::TruncatedRecord`],
/// letting recovery keep the longest clean prefix.
pub struct LogEntryIterator {
    file: LogFile,
}

impl LogEntryIterator {
    /// Opens an iterator over the log at `path`, positioned at its start.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if the file cannot be opened.
    pub fn open(path: &Path) -> Result<Self> {
        Ok(Self::new(LogFile::open(path)?))
    }

    /// Binds an iterator to `file`, rewinding its read cursor to the start.
    #[must_use]
    pub fn new(mut file: LogFile) -> Self {
        file.rewind();
        Self { file }
    }

    /// Reads the next entry.
    ///
    /// # Errors
    ///
    /// - [`MinirelError::TruncatedRecord`] if the record is torn at the
    ///   tail of the file,
    /// - [`MinirelError::InvalidArgument`] for an unknown record type or a
    ///   malformed payload,
    /// - [`MinirelError::Io`] for any other read failure.
    pub fn next_entry(&mut self) -> Result<Option<LogEntry>> {
        let offset = self.file.read_pos();

        let mut header_buf = [0u8; LOG_HEADER_SIZE];
        match self.file.read_exact(&mut header_buf) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                // End-of-file exactly at a record boundary is a clean end;
                // a few stray header bytes mean the tail was torn.
                if offset >= self.file.len()? {
                    return Ok(None);
                }
                return Err(MinirelError::TruncatedRecord { offset });
            }
            Err(e) => return Err(MinirelError::io("read log entry header", e)),
        }

        let header = LogEntryHeader::decode(&header_buf)?;

        let payload_len = header.log_entry_len as usize;
        let mut payload_buf = vec![0u8; payload_len];
        if payload_len > 0 {
            match self.file.read_exact(&mut payload_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::UnexpectedEof => {
                    return Err(MinirelError::TruncatedRecord { offset });
                }
                Err(e) => return Err(MinirelError::io("read log entry payload", e)),
            }
        }

        let payload = LogEntry::decode_payload(header.log_type, &payload_buf)?;
        Ok(Some(LogEntry { header, payload }))
    }

    /// Collects every remaining entry until clean end-of-file.
    ///
    /// # Errors
    ///
    /// Propagates the first error from [`Self::next_entry`].
    pub fn read_all(&mut self) -> Result<Vec<LogEntry>> {
        let mut entries = Vec::new();
        while let Some(entry) = self.next_entry()? {
            entries.push(entry);
        }
        Ok(entries)
    }
}
