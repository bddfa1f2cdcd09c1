//! In-memory key directory: maps each live key to the location of its latest
//! on-disk record. Lookups are O(1); the map holds one entry per live key and
//! nothing for deleted ones.
//!
//! The directory performs no synchronization and no timestamp comparison of
//! its own. The store serializes access, and callers decide whether an
//! overwrite is warranted (the merge-update hook consults [`KeyDir::lookup`]
//! before choosing to [`KeyDir::put`]).

use std::collections::HashMap;
use std::path::PathBuf;

use record::Record;
use thiserror::Error;

/// Errors from directory lookups and updates.
#[derive(Debug, Error)]
pub enum KeyDirError {
    /// The key has no live entry.
    #[error("Key not found: {0}")]
    NotFound(String),

    /// `put_from_bytes` was handed bytes that do not decode as a record.
    #[error("invalid record bytes: {0}")]
    BadRecord(#[from] record::RecordError),
}

/// Where the latest record for a key lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Path of the data file holding the record.
    pub file_id: PathBuf,
    /// Length of the record's value in bytes.
    pub value_size: u32,
    /// Byte offset of the start of the record within `file_id`.
    pub value_pos: u64,
    /// The record's timestamp in milliseconds.
    pub timestamp: u64,
}

/// The directory itself.
#[derive(Debug, Default)]
pub struct KeyDir {
    map: HashMap<Vec<u8>, DirEntry>,
}

impl KeyDir {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decodes `record_bytes` and installs an entry for its key pointing at
    /// `(file_id, pos)`. Fails if the bytes are not a valid record.
    pub fn put_from_bytes(
        &mut self,
        file_id: PathBuf,
        pos: u64,
        record_bytes: &[u8],
    ) -> Result<(), KeyDirError> {
        let rec = Record::decode(record_bytes)?;
        self.put(
            &rec.key,
            DirEntry {
                file_id,
                value_size: rec.value.len() as u32,
                value_pos: pos,
                timestamp: rec.timestamp,
            },
        );
        Ok(())
    }

    /// Unconditionally installs `entry` under `key`.
    pub fn put(&mut self, key: &[u8], entry: DirEntry) {
        self.map.insert(key.to_vec(), entry);
    }

    /// The current entry for `key`, or `None`.
    pub fn lookup(&self, key: &[u8]) -> Option<&DirEntry> {
        self.map.get(key)
    }

    /// The current entry for `key`, erroring if absent.
    pub fn get(&self, key: &[u8]) -> Result<&DirEntry, KeyDirError> {
        self.lookup(key)
            .ok_or_else(|| KeyDirError::NotFound(String::from_utf8_lossy(key).into_owned()))
    }

    /// Removes the entry for `key`, erroring if absent.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), KeyDirError> {
        self.map
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| KeyDirError::NotFound(String::from_utf8_lossy(key).into_owned()))
    }

    /// True if `key` has a live entry.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.map.contains_key(key)
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}
