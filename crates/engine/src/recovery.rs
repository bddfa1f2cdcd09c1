//! Startup recovery: rebuilds the key directory from the data files already
//! on disk.
//!
//! Files are visited oldest-first by their parsed timestamp suffix and each
//! file is scanned record by record from offset 0. Because both orders match
//! append order, replaying every record left-to-right leaves the freshest
//! surviving entry per key in the directory. Two records with the same
//! millisecond timestamp resolve by visit order.

use anyhow::{Context, Result};
use std::fs::File;
use std::path::Path;
use tracing::warn;

use keydir::{DirEntry, KeyDir};
use record::Record;

/// Scans every `data.bit.*` file under `data_dir` into `keydir`.
///
/// The first record that fails to decode ends the scan of its file; trailing
/// corruption (a torn append, a truncated tail) is treated as end-of-file,
/// never as a startup failure. Unreadable files are skipped with a warning.
pub(crate) fn load_existing(data_dir: &Path, keydir: &mut KeyDir) -> Result<()> {
    for (_, path) in bitlog::list_data_files(data_dir).context("list data directory")? {
        let mut file = match File::open(&path) {
            Ok(f) => f,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable data file");
                continue;
            }
        };

        let mut pos = 0u64;
        while let Ok(rec) = Record::read_at(&mut file, pos) {
            if rec.is_tombstone() {
                // The key may never have been seen; absence is fine.
                let _ = keydir.remove(&rec.key);
            } else {
                keydir.put(
                    &rec.key,
                    DirEntry {
                        file_id: path.clone(),
                        value_size: rec.value.len() as u32,
                        value_pos: pos,
                        timestamp: rec.timestamp,
                    },
                );
            }
            pos += rec.encoded_len() as u64;
        }
    }
    Ok(())
}
