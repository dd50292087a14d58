//! minirel - storage core for a small relational database.
//!
//! Two tightly coupled subsystems carry the work:
//!
//! - [`frame`] - a pinned-frame cache over a bounded pool of page frames
//!   shared across open files, with LRU eviction.
//! - [`wal`] - an append-only redo log with a buffered writer, a forward
//!   iterator, and a recovery driver that replays committed transactions
//!   and rolls back uncommitted ones.
//!
//! Higher layers pin pages through the [`FrameManager`] and record
//! mutations through the [`LogManager`]; commit forces the log to stable
//! storage. On startup, [`Database::recover`] consumes the log and
//! delegates redo/rollback to the transaction manager behind the
//! [`TrxManager`] seam.
//!
//! # Example
//!
//! ```ignore
//! let mut db = Database::open(&dir, DatabaseConfig::default())?;
//! db.recover(&mut trx_manager)?;
//!
//! let frame = db.frame_manager().alloc(fd, page_num).expect("pool has room");
//! frame.write().data[..4].copy_from_slice(&row_bytes);
//! db.log_manager().append_record_log(LogRecordType::Insert, trx_id, table_id, rid, 0, &row_bytes)?;
//! ```

pub mod error;
pub mod frame;
pub mod wal;

use std::path::{Path, PathBuf};

pub use error::{MinirelError, Result};
pub use frame::{Frame, FrameId, FrameManager, FrameManagerStats, FrameRef, PAGE_SIZE};
pub use wal::{
    recover, LogEntry, LogEntryIterator, LogManager, LogPayload, LogRecordType, RecoverySummary,
    Rid, Transaction, TrxManager,
};

/// Configuration for opening a database directory.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// Number of frames in the shared page pool (default: 1024).
    pub pool_frames: usize,
    /// File name of the redo log inside the database directory
    /// (default: `redo.log`).
    pub log_file_name: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            pool_frames: 1024,
            log_file_name: "redo.log".into(),
        }
    }
}

/// The storage substrate of one database directory: a frame manager for
/// page caching and a log manager for durability.
///
/// Table files and their descriptors are owned by higher layers; this
/// handle is what recovery passes through to transaction redo.
pub struct Database {
    frame_manager: FrameManager,
    log_manager: LogManager,
    dir: PathBuf,
}

impl Database {
    /// Opens or creates a database directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created, the frame pool
    /// cannot be allocated, or the redo log cannot be opened.
    pub fn open(dir: &Path, config: DatabaseConfig) -> Result<Self> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)
                .map_err(|e| MinirelError::io("create database directory", e))?;
        }

        let frame_manager = FrameManager::new(config.pool_frames)?;
        let log_manager = LogManager::new(&dir.join(&config.log_file_name))?;

        Ok(Self {
            frame_manager,
            log_manager,
            dir: dir.to_path_buf(),
        })
    }

    /// Returns the database directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.dir
    }

    /// Returns the frame manager.
    #[must_use]
    pub fn frame_manager(&self) -> &FrameManager {
        &self.frame_manager
    }

    /// Returns the log manager.
    #[must_use]
    pub fn log_manager(&self) -> &LogManager {
        &self.log_manager
    }

    /// Returns the path of the redo log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        self.log_manager.path()
    }

    /// Replays the redo log through `trx_manager`.
    ///
    /// # Errors
    ///
    /// See [`wal::recovery::recover`].
    pub fn recover(&mut self, trx_manager: &mut dyn TrxManager) -> Result<RecoverySummary> {
        wal::recovery::recover(self, trx_manager)
    }

    /// Writes every dirty page out through `flush`, then truncates the
    /// redo log.
    ///
    /// All dirty frames are flushed, pinned or not; frames stay resident.
    /// The log is truncated only after the flushed state is on disk, so
    /// nothing the log still protected is lost. Assumes no transaction is
    /// in flight: log entries for uncommitted work are discarded with the
    /// rest of the log. Returns the number of frames flushed.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Internal`] if any frame could not be
    /// flushed (the log is left untouched in that case), or an I/O error
    /// from the log sync/truncation.
    pub fn checkpoint<F>(&mut self, flush: F) -> Result<usize>
    where
        F: FnMut(&mut Frame) -> Result<()>,
    {
        let flushed = self.frame_manager.flush_dirty(flush);
        let still_dirty = self.frame_manager.stats().dirty_frames;
        if still_dirty > 0 {
            return Err(MinirelError::Internal(format!(
                "{still_dirty} dirty frames could not be flushed, log kept"
            )));
        }
        self.log_manager.sync()?;
        self.log_manager.truncate()?;
        Ok(flushed)
    }

    /// Syncs the log and verifies no frame is still resident.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::Internal`] if a frame leaked, or an I/O
    /// error from the final sync.
    pub fn close(&mut self) -> Result<()> {
        self.log_manager.sync()?;
        self.frame_manager.cleanup()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_open_creates_directory_and_log() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("db");

        let db = Database::open(&dir, DatabaseConfig::default()).unwrap();

        assert!(dir.exists());
        assert!(db.log_path().exists());
        assert_eq!(db.frame_manager().capacity(), 1024);
    }

    #[test]
    fn test_checkpoint_flushes_and_truncates() {
        let temp_dir = TempDir::new().unwrap();
        let mut db = Database::open(temp_dir.path(), DatabaseConfig::default()).unwrap();

        let frame = db.frame_manager().alloc(0, 1).unwrap();
        frame.write().dirty = true;
        db.log_manager().append_begin_trx_log(1).unwrap();
        db.log_manager().append_commit_trx_log(1, 1).unwrap();

        let flushed = db.checkpoint(|_| Ok(())).unwrap();

        assert_eq!(flushed, 1, "pinned dirty frame was flushed");
        assert!(!frame.read().dirty);
        assert_eq!(db.frame_manager().resident(), 1, "checkpoint does not evict");
        assert_eq!(db.log_manager().next_lsn(), 1);
        let mut iter = LogEntryIterator::open(db.log_path()).unwrap();
        assert!(iter.next_entry().unwrap().is_none());

        db.frame_manager().unpin(0, 1);
    }

    #[test]
    fn test_checkpoint_keeps_log_when_flush_fails() {
        let temp_dir = TempDir::new().unwrap();
        let mut db = Database::open(temp_dir.path(), DatabaseConfig::default()).unwrap();

        let frame = db.frame_manager().alloc(0, 1).unwrap();
        frame.write().dirty = true;
        db.log_manager().append_begin_trx_log(1).unwrap();
        db.log_manager().append_commit_trx_log(1, 1).unwrap();

        let err = db
            .checkpoint(|_| Err(MinirelError::Io("disk full".into())))
            .unwrap_err();
        assert!(matches!(err, MinirelError::Internal(_)));

        // The log still protects the unflushed page.
        let mut iter = LogEntryIterator::open(db.log_path()).unwrap();
        assert_eq!(iter.read_all().unwrap().len(), 2);

        db.frame_manager().unpin(0, 1);
    }

    #[test]
    fn test_close_detects_leaked_frames() {
        let temp_dir = TempDir::new().unwrap();
        let mut db = Database::open(temp_dir.path(), DatabaseConfig::default()).unwrap();

        let frame = db.frame_manager().alloc(0, 1).unwrap();
        assert!(matches!(db.close(), Err(MinirelError::Internal(_))));

        db.frame_manager().free(0, 1, &frame);
        assert!(db.close().is_ok());
    }
}
