//! In-memory accumulation of encoded log entries.

use std::collections::VecDeque;

use crate::error::Result;
use crate::wal::entry::LogEntry;
use crate::wal::log_file::LogFile;

/// Buffered bytes beyond which the log manager forces a flush.
pub const LOG_BUFFER_HIGH_WATER: usize = 64 * 1024;

/// Ordered buffer of whole encoded log entries.
///
/// Entries are kept as individual byte chunks rather than one flat byte
/// run so a flush can never split an entry: each chunk reaches the file
/// completely or stays buffered. Insertion order is retained.
#[derive(Debug, Default)]
pub struct LogBuffer {
    /// Encoded entries in append order.
    entries: VecDeque<Vec<u8>>,
    /// Total buffered bytes.
    byte_len: usize,
}

impl LogBuffer {
    /// Creates an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates, encodes, and queues an entry.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::InvalidArgument`](crate::MinirelError::InvalidArgument)
    /// if the entry's payload does not match its header.
    pub fn append_entry(&mut self, entry: &LogEntry) -> Result<()> {
        entry.validate()?;
        let bytes = entry.encode();
        self.byte_len += bytes.len();
        self.entries.push_back(bytes);
        Ok(())
    }

    /// Writes all buffered entries to `file` in order, then clears.
    ///
    /// Entries are popped only after their write succeeds. If a write
    /// fails, everything already written forms a clean prefix of whole
    /// entries on disk and the failed entry onward stays buffered.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`](crate::MinirelError::Io) from the
    /// failed write.
    pub fn flush(&mut self, file: &mut LogFile) -> Result<()> {
        while let Some(front) = self.entries.front() {
            let len = front.len();
            file.append(front)?;
            self.byte_len -= len;
            self.entries.pop_front();
        }
        Ok(())
    }

    /// Drops all buffered entries without writing them.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.byte_len = 0;
    }

    /// Returns whether the high-water mark has been reached.
    #[must_use]
    pub fn should_flush(&self) -> bool {
        self.byte_len >= LOG_BUFFER_HIGH_WATER
    }

    /// Number of buffered entries.
    #[must_use]
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Total buffered bytes.
    #[must_use]
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Returns whether the buffer is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::entry::{LogPayload, LogRecordType, Rid};
    use tempfile::TempDir;

    #[test]
    fn test_append_accumulates() {
        let mut buffer = LogBuffer::new();

        buffer
            .append_entry(&LogEntry::mtr(LogRecordType::MtrBegin, 1))
            .unwrap();
        buffer.append_entry(&LogEntry::commit(1, 2)).unwrap();

        assert_eq!(buffer.entry_count(), 2);
        assert_eq!(buffer.byte_len(), 18 + 18 + 4);
        assert!(!buffer.should_flush());
    }

    #[test]
    fn test_append_rejects_inconsistent_entry() {
        let mut buffer = LogBuffer::new();
        let mut entry = LogEntry::commit(1, 2);
        entry.payload = LogPayload::Mtr;

        assert!(buffer.append_entry(&entry).is_err());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_flush_preserves_order_and_clears() {
        let temp_dir = TempDir::new().unwrap();
        let mut file = LogFile::open(&temp_dir.path().join("redo.log")).unwrap();
        let mut buffer = LogBuffer::new();

        let first = LogEntry::mtr(LogRecordType::MtrBegin, 7);
        let second = LogEntry::record(LogRecordType::Insert, 7, 1, Rid::new(0, 0), 0, b"row");
        buffer.append_entry(&first).unwrap();
        buffer.append_entry(&second).unwrap();

        buffer.flush(&mut file).unwrap();
        assert!(buffer.is_empty());
        assert_eq!(buffer.byte_len(), 0);

        let mut expected = first.encode();
        expected.extend_from_slice(&second.encode());
        let mut on_disk = vec![0u8; expected.len()];
        file.read_exact(&mut on_disk).unwrap();
        assert_eq!(on_disk, expected);
        assert!(file.eof().unwrap());
    }

    #[test]
    fn test_high_water_mark() {
        let mut buffer = LogBuffer::new();
        let big = vec![0u8; 4096];
        let entry = LogEntry::record(LogRecordType::Update, 1, 0, Rid::new(0, 0), 0, &big);

        while !buffer.should_flush() {
            buffer.append_entry(&entry).unwrap();
        }
        assert!(buffer.byte_len() >= LOG_BUFFER_HIGH_WATER);
    }
}
