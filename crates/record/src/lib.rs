//! # Record — on-disk record codec
//!
//! Every key-value pair (and every deletion) is stored as one variable-length
//! record appended to a data file. Records are never modified in place; a
//! newer record for the same key supersedes the old one, and compaction
//! eventually drops the superseded bytes.
//!
//! ## Binary Record Format
//!
//! ```text
//! [crc32: u32 BE][timestamp_ms: u64 BE][key_size: u32 BE][value_size: u32 BE][key][value]
//! ```
//!
//! The header is exactly [`HEADER_LEN`] (20) bytes. The CRC-32/IEEE checksum
//! covers every byte after the checksum field itself, i.e. `timestamp`
//! through the end of `value`. A record with `value_size == 0` is a
//! **tombstone** marking its key as deleted.
//!
//! ## Example
//!
//! ```rust
//! use record::Record;
//!
//! let rec = Record::new(b"hello", b"world").unwrap();
//! let bytes = rec.encode();
//! let back = Record::decode(&bytes).unwrap();
//! assert_eq!(back.key, b"hello");
//! assert_eq!(back.value, b"world");
//! ```

use byteorder::{BigEndian, ByteOrder};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Fixed size of the record header in bytes: checksum (4) + timestamp (8) +
/// key_size (4) + value_size (4).
pub const HEADER_LEN: usize = 20;

/// Errors that can occur while encoding, decoding, or reading records.
#[derive(Debug, Error)]
pub enum RecordError {
    /// Keys must be at least one byte long.
    #[error("key cannot be empty")]
    EmptyKey,

    /// An underlying I/O error (seek, short read, stat).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The bytes failed CRC validation or carried inconsistent sizes.
    #[error("corrupt record")]
    Corrupt,
}

/// One decoded record: a key with either a value or, when `value` is empty,
/// a tombstone. The checksum is verified on decode and recomputed on encode,
/// so it is not stored here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Milliseconds since the Unix epoch at the moment the record was formed.
    pub timestamp: u64,
    /// The lookup key. Never empty.
    pub key: Vec<u8>,
    /// The payload. Empty marks a tombstone.
    pub value: Vec<u8>,
}

impl Record {
    /// Builds a record for `key`/`value` stamped with the current wall clock.
    ///
    /// Returns [`RecordError::EmptyKey`] if the key is empty.
    pub fn new(key: &[u8], value: &[u8]) -> Result<Self, RecordError> {
        if key.is_empty() {
            return Err(RecordError::EmptyKey);
        }
        Ok(Self {
            timestamp: now_ms(),
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    /// Builds a tombstone record for `key` stamped with the current wall clock.
    pub fn tombstone(key: &[u8]) -> Result<Self, RecordError> {
        Self::new(key, &[])
    }

    /// True if this record marks a deletion.
    pub fn is_tombstone(&self) -> bool {
        self.value.is_empty()
    }

    /// The encoded size of this record: header plus key plus value.
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.key.len() + self.value.len()
    }

    /// Serializes the record into a fresh byte block, CRC included.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = vec![0u8; self.encoded_len()];
        BigEndian::write_u64(&mut buf[4..12], self.timestamp);
        BigEndian::write_u32(&mut buf[12..16], self.key.len() as u32);
        BigEndian::write_u32(&mut buf[16..20], self.value.len() as u32);
        buf[HEADER_LEN..HEADER_LEN + self.key.len()].copy_from_slice(&self.key);
        buf[HEADER_LEN + self.key.len()..].copy_from_slice(&self.value);

        let crc = crc32fast::hash(&buf[4..]);
        BigEndian::write_u32(&mut buf[..4], crc);
        buf
    }

    /// Parses a full record from `bytes`.
    ///
    /// Fails with [`RecordError::Corrupt`] if the block is shorter than a
    /// header plus a one-byte key, if the checksum does not match, or if the
    /// declared sizes disagree with the body length.
    pub fn decode(bytes: &[u8]) -> Result<Self, RecordError> {
        if bytes.len() < HEADER_LEN + 1 {
            return Err(RecordError::Corrupt);
        }

        let checksum = BigEndian::read_u32(&bytes[..4]);
        if checksum != crc32fast::hash(&bytes[4..]) {
            return Err(RecordError::Corrupt);
        }

        let key_size = BigEndian::read_u32(&bytes[12..16]) as usize;
        let value_size = BigEndian::read_u32(&bytes[16..20]) as usize;
        if key_size == 0 || key_size + value_size != bytes.len() - HEADER_LEN {
            return Err(RecordError::Corrupt);
        }

        Ok(Self {
            timestamp: BigEndian::read_u64(&bytes[4..12]),
            key: bytes[HEADER_LEN..HEADER_LEN + key_size].to_vec(),
            value: bytes[HEADER_LEN + key_size..].to_vec(),
        })
    }

    /// Reads and validates one record from `file` at byte offset `pos`.
    ///
    /// Any seek failure, short read, size inconsistency, or checksum mismatch
    /// is an error; the recovery scanner treats the first such error in a
    /// file as that file's end.
    pub fn read_at(file: &mut File, pos: u64) -> Result<Self, RecordError> {
        let file_len = file.metadata()?.len();
        file.seek(SeekFrom::Start(pos))?;

        let mut header = [0u8; HEADER_LEN];
        file.read_exact(&mut header)?;

        let key_size = BigEndian::read_u32(&header[12..16]) as u64;
        let value_size = BigEndian::read_u32(&header[16..20]) as u64;

        // A garbage header must not drive the allocation below: the body can
        // never be larger than what remains of the file.
        let remaining = file_len.saturating_sub(pos + HEADER_LEN as u64);
        if key_size + value_size > remaining {
            return Err(RecordError::Corrupt);
        }

        let mut body = vec![0u8; (key_size + value_size) as usize];
        file.read_exact(&mut body)?;

        let mut block = Vec::with_capacity(HEADER_LEN + body.len());
        block.extend_from_slice(&header);
        block.extend_from_slice(&body);
        Self::decode(&block)
    }
}

/// Current wall clock in milliseconds since the Unix epoch.
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests;
