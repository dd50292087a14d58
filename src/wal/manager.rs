//! Log manager: builds entries, routes them through the buffer, and drives
//! durability on commit.

use std::path::{Path, PathBuf};

use log::{debug, warn};
use parking_lot::Mutex;

use crate::error::{MinirelError, Result};
use crate::wal::buffer::LogBuffer;
use crate::wal::entry::{LogEntry, LogRecordType, Rid};
use crate::wal::iterator::LogEntryIterator;
use crate::wal::log_file::LogFile;

/// First LSN of a fresh (or freshly truncated) log.
const INITIAL_LSN: i64 = 1;

/// Owns one [`LogBuffer`] and one [`LogFile`] and serializes all appenders.
///
/// Entries reach the file in the order `append_log` is invoked; LSNs are
/// stamped under the same lock, so LSN order equals file order. When a
/// commit record is appended the buffer is flushed and the file fsynced
/// before the call returns: a successful commit append means the commit
/// and everything before it are on stable storage.
pub struct LogManager {
    /// Path to the redo log file.
    path: PathBuf,
    inner: Mutex<LogManagerInner>,
}

struct LogManagerInner {
    buffer: LogBuffer,
    file: LogFile,
    /// LSN the next appended entry will receive.
    next_lsn: i64,
}

impl LogManager {
    /// Creates a log manager over the file at `path`.
    ///
    /// An existing log is preserved and appended to: the LSN counter
    /// continues past the highest LSN on disk, and a record torn by a
    /// mid-write crash is dropped so new appends start at a clean entry
    /// boundary.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if the file cannot be opened or the
    /// existing log cannot be scanned.
    pub fn new(path: &Path) -> Result<Self> {
        let scan = Self::scan_existing(path)?;
        let mut file = LogFile::open(path)?;

        if let Some(clean_len) = scan.torn_at {
            warn!(
                "dropping torn record at the tail of {}, keeping {clean_len} bytes",
                path.display()
            );
            file.truncate(clean_len)?;
        }
        debug!(
            "log manager opened {} at lsn {}",
            path.display(),
            scan.next_lsn
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: Mutex::new(LogManagerInner {
                buffer: LogBuffer::new(),
                file,
                next_lsn: scan.next_lsn,
            }),
        })
    }

    /// Scans an existing log for the LSN to continue from and any torn
    /// tail to drop.
    fn scan_existing(path: &Path) -> Result<LogScan> {
        if !path.exists() {
            return Ok(LogScan {
                next_lsn: INITIAL_LSN,
                torn_at: None,
            });
        }

        let mut iter = LogEntryIterator::open(path)?;
        let mut next_lsn = INITIAL_LSN;
        loop {
            match iter.next_entry() {
                Ok(Some(entry)) => next_lsn = next_lsn.max(entry.header.lsn + 1),
                Ok(None) => {
                    return Ok(LogScan {
                        next_lsn,
                        torn_at: None,
                    })
                }
                Err(MinirelError::TruncatedRecord { offset }) => {
                    return Ok(LogScan {
                        next_lsn,
                        torn_at: Some(offset),
                    })
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Returns the path to the redo log file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// LSN the next appended entry will receive.
    #[must_use]
    pub fn next_lsn(&self) -> i64 {
        self.inner.lock().next_lsn
    }

    /// Appends a transaction-begin record.
    ///
    /// # Errors
    ///
    /// Propagates buffer or I/O failures from [`Self::append_log`].
    pub fn append_begin_trx_log(&self, trx_id: i32) -> Result<()> {
        self.append_log(LogEntry::mtr(LogRecordType::MtrBegin, trx_id))
    }

    /// Appends a transaction-rollback record.
    ///
    /// # Errors
    ///
    /// Propagates buffer or I/O failures from [`Self::append_log`].
    pub fn append_rollback_trx_log(&self, trx_id: i32) -> Result<()> {
        self.append_log(LogEntry::mtr(LogRecordType::MtrRollback, trx_id))
    }

    /// Appends a commit record and forces it to stable storage.
    ///
    /// # Errors
    ///
    /// Returns an error if the append or the sync fails. On any error the
    /// commit must be treated as not durable; callers typically escalate
    /// to rollback.
    pub fn append_commit_trx_log(&self, trx_id: i32, commit_xid: i32) -> Result<()> {
        let entry = LogEntry::commit(trx_id, commit_xid);
        let mut inner = self.inner.lock();
        Self::append_locked(&mut inner, entry)?;
        Self::sync_locked(&mut inner)
    }

    /// Appends a record-mutation entry.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::InvalidArgument`] if `log_type` is not a
    /// mutation type, otherwise propagates from [`Self::append_log`].
    pub fn append_record_log(
        &self,
        log_type: LogRecordType,
        trx_id: i32,
        table_id: i32,
        rid: Rid,
        data_offset: i32,
        data: &[u8],
    ) -> Result<()> {
        if !log_type.is_mutation() {
            return Err(MinirelError::InvalidArgument(format!(
                "{log_type:?} is not a record mutation type"
            )));
        }
        self.append_log(LogEntry::record(
            log_type,
            trx_id,
            table_id,
            rid,
            data_offset,
            data,
        ))
    }

    /// Stamps the next LSN on `entry` and appends it to the log buffer,
    /// flushing to the file when the buffer crosses its high-water mark.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::InvalidArgument`] for an entry whose payload
    /// does not match its type, or [`MinirelError::Io`] from a high-water
    /// flush.
    pub fn append_log(&self, entry: LogEntry) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::append_locked(&mut inner, entry)?;
        if inner.buffer.should_flush() {
            let LogManagerInner { buffer, file, .. } = &mut *inner;
            buffer.flush(file)?;
        }
        Ok(())
    }

    /// Flushes the buffer and fsyncs the file.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if the flush or the fsync fails.
    pub fn sync(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        Self::sync_locked(&mut inner)
    }

    /// Discards the whole log: buffered entries, file contents, and the
    /// LSN counter. Used after a checkpoint has made the log redundant.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Io`] if the file truncation fails.
    pub fn truncate(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.buffer.clear();
        inner.file.truncate(0)?;
        inner.next_lsn = INITIAL_LSN;
        Ok(())
    }

    // Validation happens once, inside the buffer's append; a rejected
    // entry leaves the LSN counter untouched.
    fn append_locked(inner: &mut LogManagerInner, mut entry: LogEntry) -> Result<()> {
        entry.header.lsn = inner.next_lsn;
        inner.buffer.append_entry(&entry)?;
        inner.next_lsn += 1;
        Ok(())
    }

    fn sync_locked(inner: &mut LogManagerInner) -> Result<()> {
        let LogManagerInner { buffer, file, .. } = &mut *inner;
        buffer.flush(file)?;
        file.sync()
    }
}

struct LogScan {
    next_lsn: i64,
    /// Offset of the torn tail to drop, if the last record is incomplete.
    torn_at: Option<u64>,
}
