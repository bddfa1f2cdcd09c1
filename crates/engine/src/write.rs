//! Write path: `set()`, `del()`, and the merger's directory-update hook.
//!
//! Every mutation appends one encoded record to the live log and only then
//! touches the key directory, so a rotation inside the append can never
//! leave an entry pointing at the wrong file.

use anyhow::{ensure, Result};
use std::path::{Path, PathBuf};

use keydir::DirEntry;
use record::Record;

use crate::{Store, StoreInner};

impl Store {
    /// Inserts or updates a key-value pair.
    ///
    /// The record is appended to the live log first; the directory entry is
    /// installed only after the append succeeds, pointing at wherever the
    /// bytes actually landed.
    ///
    /// Empty keys are rejected by the codec. Empty values are rejected here:
    /// a zero-length value is byte-identical to a tombstone on disk and
    /// would read back as a deletion after restart.
    pub fn set(&self, key: &[u8], value: &[u8]) -> Result<()> {
        ensure!(!value.is_empty(), "value cannot be empty");
        let rec = Record::new(key, value)?;
        let bytes = rec.encode();

        let mut inner = self.lock()?;
        let (file_id, pos) = inner.append_record(&bytes)?;
        inner.keydir.put(
            key,
            DirEntry {
                file_id,
                value_size: value.len() as u32,
                value_pos: pos,
                timestamp: rec.timestamp,
            },
        );
        Ok(())
    }

    /// Deletes a key by appending a tombstone record, then dropping its
    /// directory entry. Deleting an absent key is an error.
    pub fn del(&self, key: &[u8]) -> Result<()> {
        let rec = Record::tombstone(key)?;
        let bytes = rec.encode();

        let mut inner = self.lock()?;
        inner.append_record(&bytes)?;
        inner.keydir.remove(key)?;
        Ok(())
    }

    /// Installs the location of a record the merger just rewrote, unless the
    /// directory already holds a strictly newer entry for the key.
    ///
    /// This is the race-safety hook of the merge cycle: a `set` that landed
    /// during or after the fold carries a fresher timestamp and must win.
    pub fn update_from_merge(
        &self,
        key: &[u8],
        file_id: &Path,
        pos: u64,
        value_size: u32,
        timestamp: u64,
    ) -> Result<()> {
        let mut inner = self.lock()?;
        if let Some(existing) = inner.keydir.lookup(key) {
            if existing.timestamp > timestamp {
                return Ok(());
            }
        }
        inner.keydir.put(
            key,
            DirEntry {
                file_id: file_id.to_path_buf(),
                value_size,
                value_pos: pos,
                timestamp,
            },
        );
        Ok(())
    }
}

impl StoreInner {
    /// Appends an encoded record and reports the file and offset where it
    /// landed. Both are read back from the writer after the append because
    /// the append may rotate.
    fn append_record(&mut self, bytes: &[u8]) -> Result<(PathBuf, u64)> {
        let prev_path = self.log.active_path().to_path_buf();
        let prev_pos = self.log.offset();
        if let Err(e) = self.log.append(bytes) {
            // A partial write that did not rotate is overwritten by the next
            // append once the handle is rolled back. After a rotation the
            // fresh file is left as is; recovery skips any torn tail.
            if self.log.active_path() == prev_path {
                let _ = self.log.seek(prev_pos);
            }
            return Err(e.into());
        }
        let pos = self.log.offset() - bytes.len() as u64;
        Ok((self.log.active_path().to_path_buf(), pos))
    }
}
