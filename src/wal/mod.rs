//! Write-ahead redo logging and crash recovery.
//!
//! This module implements the append-only redo log that makes committed
//! transactions durable and lets the database reconstruct their effects
//! after a crash.
//!
//! # Architecture
//!
//! The log is a flat sequence of framed records ([`LogEntry`]) with no file
//! header and no inter-record padding. [`LogBuffer`] batches encoded entries
//! in memory, [`LogFile`] is the append-only byte sink, and [`LogManager`]
//! ties them together: it stamps LSNs, routes entries through the buffer,
//! and forces everything to stable storage when a transaction commits.
//!
//! # Recovery
//!
//! On startup [`recovery::recover`] scans the log front to back with a
//! [`LogEntryIterator`], replays entries through the transaction manager,
//! and rolls back every transaction whose commit never reached the log.
//! A record torn by a mid-write crash ends the scan; everything after the
//! last whole record is discarded.

mod buffer;
mod entry;
mod iterator;
mod log_file;
mod manager;
pub mod recovery;

pub use buffer::{LogBuffer, LOG_BUFFER_HIGH_WATER};
pub use entry::{
    LogEntry, LogEntryHeader, LogPayload, LogRecordType, Rid, LOG_HEADER_SIZE,
};
pub use iterator::LogEntryIterator;
pub use log_file::LogFile;
pub use manager::LogManager;
pub use recovery::{recover, RecoverySummary, Transaction, TrxManager};
