//! One-pass crash recovery over the redo log.
//!
//! The log holds mutations for transactions whose commit may or may not
//! have reached disk. Recovery scans forward once: every entry is routed
//! into its transaction object, which stages mutations and applies them
//! only when it observes the commit. Transactions still open at the end of
//! the log were in flight at the crash and are rolled back.

use log::{debug, warn};

use crate::error::{MinirelError, Result};
use crate::wal::entry::{LogEntry, LogRecordType};
use crate::wal::iterator::LogEntryIterator;
use crate::Database;

/// A transaction as recovery sees it.
///
/// Implemented by the transaction manager; recovery itself never interprets
/// mutation payloads.
pub trait Transaction {
    /// Replays one log entry. Mutations are staged inside the transaction
    /// until its commit entry arrives, at which point the commit entry's
    /// `redo` applies them against `db`.
    ///
    /// # Errors
    ///
    /// Implementations surface their own failures; recovery propagates
    /// them.
    fn redo(&mut self, db: &mut Database, entry: &LogEntry) -> Result<()>;

    /// Discards everything this transaction staged.
    ///
    /// # Errors
    ///
    /// Implementations surface their own failures; recovery propagates
    /// them.
    fn rollback(&mut self) -> Result<()>;
}

/// The transaction-manager contract recovery drives.
pub trait TrxManager {
    /// Creates a transaction with the given id, as seen in a begin record.
    ///
    /// # Errors
    ///
    /// Implementations surface their own failures; recovery propagates
    /// them.
    fn create_trx(&mut self, trx_id: i32) -> Result<&mut dyn Transaction>;

    /// Looks up a previously created transaction.
    fn find_trx(&mut self, trx_id: i32) -> Option<&mut dyn Transaction>;
}

/// Counters describing what a recovery pass did.
#[derive(Debug, Default, Clone)]
pub struct RecoverySummary {
    /// Whole log entries scanned.
    pub entries_scanned: usize,
    /// Transactions whose commit was observed and replayed.
    pub committed: usize,
    /// Transactions rolled back (logged rollbacks plus end-of-log
    /// survivors).
    pub rolled_back: usize,
    /// Whether the scan stopped at a record torn by a mid-write crash.
    pub torn_tail: bool,
}

/// Replays the database's redo log through `trx_manager`.
///
/// One forward pass: a begin record creates its transaction and marks it
/// uncommitted; mutations and commits are routed through
/// [`Transaction::redo`]; logged rollbacks roll back immediately. A torn
/// record ends the scan with a warning and the clean prefix stands. After
/// the scan every transaction still uncommitted is rolled back, in the
/// order it was first seen.
///
/// A missing or empty log recovers trivially without touching the
/// transaction manager.
///
/// # Errors
///
/// Propagates I/O and decode failures from the log iterator (other than a
/// torn tail) and any failure from `redo`/`rollback`/`create_trx`.
pub fn recover(db: &mut Database, trx_manager: &mut dyn TrxManager) -> Result<RecoverySummary> {
    let log_path = db.log_path().to_path_buf();
    let mut summary = RecoverySummary::default();

    if !log_path.exists() {
        return Ok(summary);
    }
    let mut iter = LogEntryIterator::open(&log_path)?;

    // Ids of transactions begun but not yet resolved, in first-seen order.
    let mut uncommitted: Vec<i32> = Vec::new();

    loop {
        let entry = match iter.next_entry() {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(MinirelError::TruncatedRecord { offset }) => {
                warn!("log torn at offset {offset}; replaying the clean prefix only");
                summary.torn_tail = true;
                break;
            }
            Err(e) => return Err(e),
        };
        summary.entries_scanned += 1;
        let trx_id = entry.header.trx_id;

        match entry.header.log_type {
            LogRecordType::MtrBegin => {
                trx_manager.create_trx(trx_id)?;
                if !uncommitted.contains(&trx_id) {
                    uncommitted.push(trx_id);
                }
            }
            LogRecordType::MtrCommit => {
                if let Some(trx) = trx_manager.find_trx(trx_id) {
                    trx.redo(db, &entry)?;
                    summary.committed += 1;
                } else {
                    warn!("commit for unknown transaction {trx_id}, skipped");
                }
                uncommitted.retain(|&id| id != trx_id);
            }
            LogRecordType::MtrRollback => {
                if let Some(trx) = trx_manager.find_trx(trx_id) {
                    trx.rollback()?;
                    summary.rolled_back += 1;
                } else {
                    warn!("rollback for unknown transaction {trx_id}, skipped");
                }
                uncommitted.retain(|&id| id != trx_id);
            }
            // Reserved sentinel, carries nothing to replay.
            LogRecordType::Error => {}
            LogRecordType::Insert | LogRecordType::Delete | LogRecordType::Update => {
                if let Some(trx) = trx_manager.find_trx(trx_id) {
                    trx.redo(db, &entry)?;
                } else {
                    warn!("mutation for unknown transaction {trx_id}, skipped");
                }
            }
        }
    }

    // Whatever is left was in flight at the crash.
    for trx_id in uncommitted {
        if let Some(trx) = trx_manager.find_trx(trx_id) {
            trx.rollback()?;
            summary.rolled_back += 1;
        } else {
            warn!("transaction {trx_id} vanished before rollback");
        }
    }

    debug!(
        "recovery scanned {} entries: {} committed, {} rolled back",
        summary.entries_scanned, summary.committed, summary.rolled_back
    );
    Ok(summary)
}
