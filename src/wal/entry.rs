//! Redo log records and their wire encoding.
//!
//! Every record is framed by a fixed 18-byte header followed by a payload
//! whose layout depends on the record type:
//!
//! ```text
//! [0..2)   log_type       u16 LE
//! [2..6)   trx_id         i32 LE
//! [6..10)  log_entry_len  i32 LE   (payload size in bytes)
//! [10..18) lsn            i64 LE   (monotonic; 0 if unused)
//! [18..)   payload
//! ```
//!
//! Begin and rollback records carry no payload. A commit record carries the
//! commit transaction id. Record mutations carry the table, the row id, and
//! the changed bytes. There is no padding between records.

use serde::{Deserialize, Serialize};

use crate::error::{MinirelError, Result};

/// Size in bytes of the fixed log entry header.
pub const LOG_HEADER_SIZE: usize = 18;

/// Record identifier: the location of a row within a table file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rid {
    /// Page number within the table file.
    pub page_num: u32,
    /// Slot number within the page.
    pub slot_num: u32,
}

impl Rid {
    /// Creates a new record identifier.
    #[must_use]
    pub const fn new(page_num: u32, slot_num: u32) -> Self {
        Self { page_num, slot_num }
    }
}

impl std::fmt::Display for Rid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Rid({}:{})", self.page_num, self.slot_num)
    }
}

/// Type of redo log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u16)]
pub enum LogRecordType {
    /// Reserved sentinel; recovery skips it.
    Error = 0,
    /// A transaction began.
    MtrBegin = 1,
    /// A transaction committed.
    MtrCommit = 2,
    /// A transaction rolled back.
    MtrRollback = 3,
    /// A row was inserted.
    Insert = 30,
    /// A row was deleted.
    Delete = 31,
    /// A row was updated in place.
    Update = 32,
}

impl LogRecordType {
    /// Returns whether this type is a record mutation (insert/delete/update).
    #[must_use]
    pub fn is_mutation(self) -> bool {
        matches!(
            self,
            LogRecordType::Insert | LogRecordType::Delete | LogRecordType::Update
        )
    }
}

impl TryFrom<u16> for LogRecordType {
    type Error = MinirelError;

    fn try_from(value: u16) -> Result<Self> {
        match value {
            0 => Ok(LogRecordType::Error),
            1 => Ok(LogRecordType::MtrBegin),
            2 => Ok(LogRecordType::MtrCommit),
            3 => Ok(LogRecordType::MtrRollback),
            30 => Ok(LogRecordType::Insert),
            31 => Ok(LogRecordType::Delete),
            32 => Ok(LogRecordType::Update),
            other => Err(MinirelError::InvalidArgument(format!(
                "unknown log record type {other}"
            ))),
        }
    }
}

/// Fixed-size framing header preceding every payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogEntryHeader {
    /// Record type tag.
    pub log_type: LogRecordType,
    /// Transaction that produced the record.
    pub trx_id: i32,
    /// Size of the payload that follows, in bytes.
    pub log_entry_len: i32,
    /// Log sequence number; monotonic, 0 until stamped by the log manager.
    pub lsn: i64,
}

impl LogEntryHeader {
    /// Appends the little-endian encoding of this header to `buf`.
    pub fn encode_into(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&(self.log_type as u16).to_le_bytes());
        buf.extend_from_slice(&self.trx_id.to_le_bytes());
        buf.extend_from_slice(&self.log_entry_len.to_le_bytes());
        buf.extend_from_slice(&self.lsn.to_le_bytes());
    }

    /// Decodes a header from its fixed-size encoding.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::InvalidArgument`] for an unknown record type
    /// or a negative payload length.
    pub fn decode(bytes: &[u8; LOG_HEADER_SIZE]) -> Result<Self> {
        let raw_type = u16::from_le_bytes([bytes[0], bytes[1]]);
        let log_type = LogRecordType::try_from(raw_type)?;
        let trx_id = i32::from_le_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
        let log_entry_len = i32::from_le_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]);
        let lsn = i64::from_le_bytes([
            bytes[10], bytes[11], bytes[12], bytes[13], bytes[14], bytes[15], bytes[16],
            bytes[17],
        ]);

        if log_entry_len < 0 {
            return Err(MinirelError::InvalidArgument(format!(
                "negative payload length {log_entry_len}"
            )));
        }

        Ok(Self {
            log_type,
            trx_id,
            log_entry_len,
            lsn,
        })
    }
}

/// Payload of a redo log record, one variant per layout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogPayload {
    /// Begin/rollback/sentinel records carry nothing.
    Mtr,
    /// Commit record.
    Commit {
        /// Commit transaction id assigned at commit time.
        commit_xid: i32,
    },
    /// Record mutation (insert, delete, update).
    Record {
        /// Table the row belongs to.
        table_id: i32,
        /// Location of the row.
        rid: Rid,
        /// Byte offset of the change within the row.
        data_offset: i32,
        /// Changed bytes.
        data: Vec<u8>,
    },
}

/// Fixed prefix of a record-mutation payload before the data bytes.
const RECORD_PAYLOAD_PREFIX: usize = 20;

impl LogPayload {
    /// Encoded size of this payload in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        match self {
            LogPayload::Mtr => 0,
            LogPayload::Commit { .. } => 4,
            LogPayload::Record { data, .. } => RECORD_PAYLOAD_PREFIX + data.len(),
        }
    }

    fn encode_into(&self, buf: &mut Vec<u8>) {
        match self {
            LogPayload::Mtr => {}
            LogPayload::Commit { commit_xid } => {
                buf.extend_from_slice(&commit_xid.to_le_bytes());
            }
            LogPayload::Record {
                table_id,
                rid,
                data_offset,
                data,
            } => {
                buf.extend_from_slice(&table_id.to_le_bytes());
                buf.extend_from_slice(&rid.page_num.to_le_bytes());
                buf.extend_from_slice(&rid.slot_num.to_le_bytes());
                buf.extend_from_slice(&data_offset.to_le_bytes());
                buf.extend_from_slice(&(data.len() as i32).to_le_bytes());
                buf.extend_from_slice(data);
            }
        }
    }
}

/// A single redo log record: framing header plus typed payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Framing header.
    pub header: LogEntryHeader,
    /// Typed payload matching `header.log_type`.
    pub payload: LogPayload,
}

impl LogEntry {
    fn build(log_type: LogRecordType, trx_id: i32, payload: LogPayload) -> Self {
        let log_entry_len = payload.encoded_len() as i32;
        Self {
            header: LogEntryHeader {
                log_type,
                trx_id,
                log_entry_len,
                lsn: 0,
            },
            payload,
        }
    }

    /// Builds a begin or rollback record.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `log_type` is not `MtrBegin` or
    /// `MtrRollback`.
    #[must_use]
    pub fn mtr(log_type: LogRecordType, trx_id: i32) -> Self {
        debug_assert!(
            matches!(log_type, LogRecordType::MtrBegin | LogRecordType::MtrRollback),
            "mtr builder used for {log_type:?}"
        );
        Self::build(log_type, trx_id, LogPayload::Mtr)
    }

    /// Builds a commit record.
    #[must_use]
    pub fn commit(trx_id: i32, commit_xid: i32) -> Self {
        Self::build(
            LogRecordType::MtrCommit,
            trx_id,
            LogPayload::Commit { commit_xid },
        )
    }

    /// Builds a record-mutation entry, copying `data`.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `log_type` is not a mutation type.
    #[must_use]
    pub fn record(
        log_type: LogRecordType,
        trx_id: i32,
        table_id: i32,
        rid: Rid,
        data_offset: i32,
        data: &[u8],
    ) -> Self {
        debug_assert!(
            log_type.is_mutation(),
            "record builder used for {log_type:?}"
        );
        Self::build(
            log_type,
            trx_id,
            LogPayload::Record {
                table_id,
                rid,
                data_offset,
                data: data.to_vec(),
            },
        )
    }

    /// Checks that the payload variant matches the header type and that the
    /// framed length is consistent.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::InvalidArgument`] on any mismatch. This is
    /// the guard `append_log` runs on every entry.
    pub fn validate(&self) -> Result<()> {
        let type_matches = match (&self.header.log_type, &self.payload) {
            (
                LogRecordType::Error | LogRecordType::MtrBegin | LogRecordType::MtrRollback,
                LogPayload::Mtr,
            )
            | (LogRecordType::MtrCommit, LogPayload::Commit { .. }) => true,
            (t, LogPayload::Record { .. }) if t.is_mutation() => true,
            _ => false,
        };
        if !type_matches {
            return Err(MinirelError::InvalidArgument(format!(
                "payload does not match record type {:?}",
                self.header.log_type
            )));
        }
        if self.header.log_entry_len as usize != self.payload.encoded_len() {
            return Err(MinirelError::InvalidArgument(format!(
                "framed length {} does not match payload length {}",
                self.header.log_entry_len,
                self.payload.encoded_len()
            )));
        }
        Ok(())
    }

    /// Encodes the whole record, header and payload contiguous.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(LOG_HEADER_SIZE + self.payload.encoded_len());
        self.header.encode_into(&mut buf);
        self.payload.encode_into(&mut buf);
        buf
    }

    /// Decodes a payload of the given type from its framed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`MinirelError::InvalidArgument`] if the bytes do not match
    /// the layout the record type requires.
    pub fn decode_payload(log_type: LogRecordType, bytes: &[u8]) -> Result<LogPayload> {
        match log_type {
            LogRecordType::Error | LogRecordType::MtrBegin | LogRecordType::MtrRollback => {
                if !bytes.is_empty() {
                    return Err(MinirelError::InvalidArgument(format!(
                        "{log_type:?} record with unexpected {}-byte payload",
                        bytes.len()
                    )));
                }
                Ok(LogPayload::Mtr)
            }
            LogRecordType::MtrCommit => {
                let raw: [u8; 4] = bytes.try_into().map_err(|_| {
                    MinirelError::InvalidArgument(format!(
                        "commit record with {}-byte payload, expected 4",
                        bytes.len()
                    ))
                })?;
                Ok(LogPayload::Commit {
                    commit_xid: i32::from_le_bytes(raw),
                })
            }
            LogRecordType::Insert | LogRecordType::Delete | LogRecordType::Update => {
                if bytes.len() < RECORD_PAYLOAD_PREFIX {
                    return Err(MinirelError::InvalidArgument(format!(
                        "mutation record with {}-byte payload, expected at least {RECORD_PAYLOAD_PREFIX}",
                        bytes.len()
                    )));
                }
                let table_id = i32::from_le_bytes(bytes[0..4].try_into().unwrap());
                let page_num = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
                let slot_num = u32::from_le_bytes(bytes[8..12].try_into().unwrap());
                let data_offset = i32::from_le_bytes(bytes[12..16].try_into().unwrap());
                let data_len = i32::from_le_bytes(bytes[16..20].try_into().unwrap());

                if data_len < 0 || data_len as usize != bytes.len() - RECORD_PAYLOAD_PREFIX {
                    return Err(MinirelError::InvalidArgument(format!(
                        "mutation record data length {data_len} does not match framed payload"
                    )));
                }

                Ok(LogPayload::Record {
                    table_id,
                    rid: Rid::new(page_num, slot_num),
                    data_offset,
                    data: bytes[RECORD_PAYLOAD_PREFIX..].to_vec(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_type_conversion() {
        assert_eq!(LogRecordType::try_from(1).unwrap(), LogRecordType::MtrBegin);
        assert_eq!(LogRecordType::try_from(2).unwrap(), LogRecordType::MtrCommit);
        assert_eq!(LogRecordType::try_from(30).unwrap(), LogRecordType::Insert);
        assert_eq!(LogRecordType::try_from(0).unwrap(), LogRecordType::Error);
        assert!(LogRecordType::try_from(99).is_err());
    }

    #[test]
    fn test_header_layout_is_bit_exact() {
        let mut entry = LogEntry::commit(7, 42);
        entry.header.lsn = 3;
        let bytes = entry.encode();

        assert_eq!(&bytes[0..2], &2u16.to_le_bytes()); // MtrCommit
        assert_eq!(&bytes[2..6], &7i32.to_le_bytes()); // trx_id
        assert_eq!(&bytes[6..10], &4i32.to_le_bytes()); // payload length
        assert_eq!(&bytes[10..18], &3i64.to_le_bytes()); // lsn
        assert_eq!(&bytes[18..22], &42i32.to_le_bytes()); // commit_xid
        assert_eq!(bytes.len(), LOG_HEADER_SIZE + 4);
    }

    #[test]
    fn test_mtr_entry_has_no_payload() {
        let entry = LogEntry::mtr(LogRecordType::MtrBegin, 1);
        assert_eq!(entry.header.log_entry_len, 0);
        assert_eq!(entry.encode().len(), LOG_HEADER_SIZE);
    }

    #[test]
    fn test_record_entry_copies_data() {
        let data = [9u8, 8, 7];
        let entry = LogEntry::record(LogRecordType::Insert, 1, 5, Rid::new(2, 4), 16, &data);

        assert_eq!(entry.header.log_entry_len, 23);
        match &entry.payload {
            LogPayload::Record {
                table_id,
                rid,
                data_offset,
                data,
            } => {
                assert_eq!(*table_id, 5);
                assert_eq!(*rid, Rid::new(2, 4));
                assert_eq!(*data_offset, 16);
                assert_eq!(data.as_slice(), &[9, 8, 7]);
            }
            other => panic!("wrong payload variant: {other:?}"),
        }
    }

    #[test]
    fn test_encode_decode_roundtrip() {
        let entries = [
            LogEntry::mtr(LogRecordType::MtrBegin, 1),
            LogEntry::record(LogRecordType::Update, 1, 3, Rid::new(0, 9), 64, b"abcd"),
            LogEntry::commit(1, 11),
            LogEntry::mtr(LogRecordType::MtrRollback, 2),
        ];

        for entry in &entries {
            let bytes = entry.encode();
            let header_bytes: [u8; LOG_HEADER_SIZE] =
                bytes[..LOG_HEADER_SIZE].try_into().unwrap();
            let header = LogEntryHeader::decode(&header_bytes).unwrap();
            let payload =
                LogEntry::decode_payload(header.log_type, &bytes[LOG_HEADER_SIZE..]).unwrap();

            assert_eq!(header, entry.header);
            assert_eq!(payload, entry.payload);
        }
    }

    #[test]
    fn test_validate_rejects_mismatched_payload() {
        let mut entry = LogEntry::commit(1, 2);
        entry.payload = LogPayload::Mtr;
        assert!(matches!(
            entry.validate(),
            Err(MinirelError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_validate_rejects_bad_framed_length() {
        let mut entry = LogEntry::commit(1, 2);
        entry.header.log_entry_len = 9;
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_decode_payload_rejects_short_commit() {
        let err = LogEntry::decode_payload(LogRecordType::MtrCommit, &[1, 2]).unwrap_err();
        assert!(matches!(err, MinirelError::InvalidArgument(_)));
    }

    #[test]
    fn test_decode_payload_rejects_bad_data_len() {
        let entry = LogEntry::record(LogRecordType::Delete, 1, 0, Rid::new(0, 0), 0, b"xy");
        let mut bytes = entry.encode();
        // Corrupt the embedded data length.
        bytes[LOG_HEADER_SIZE + 16] = 0xFF;
        let err =
            LogEntry::decode_payload(LogRecordType::Delete, &bytes[LOG_HEADER_SIZE..]).unwrap_err();
        assert!(matches!(err, MinirelError::InvalidArgument(_)));
    }
}
