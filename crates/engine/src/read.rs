//! Read path: `get()`.
//!
//! A lookup resolves the key through the in-memory directory, then opens a
//! short-lived read-only handle on the file the entry points at and decodes
//! the record in place. The handle never outlives the call.

use anyhow::{ensure, Context, Result};
use std::fs::{self, File};

use record::Record;

use crate::Store;

impl Store {
    /// Returns the current value for `key`.
    ///
    /// Errors: key not found, data file missing, record position past the
    /// end of the file, or corruption at the recorded position.
    pub fn get(&self, key: &[u8]) -> Result<Vec<u8>> {
        let inner = self.lock()?;
        let entry = inner.keydir.get(key)?;

        let file_len = fs::metadata(&entry.file_id)
            .with_context(|| format!("missing data file {}", entry.file_id.display()))?
            .len();
        ensure!(
            entry.value_pos < file_len,
            "record position {} is past the end of {}",
            entry.value_pos,
            entry.file_id.display()
        );

        let mut file = File::open(&entry.file_id)
            .with_context(|| format!("open data file {}", entry.file_id.display()))?;
        let rec = Record::read_at(&mut file, entry.value_pos)
            .with_context(|| format!("read record in {}", entry.file_id.display()))?;
        Ok(rec.value)
    }
}
