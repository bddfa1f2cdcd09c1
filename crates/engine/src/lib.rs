//! # Engine — the caskd storage core
//!
//! Composes the [`record`] codec, the [`bitlog`] rolling writer, and the
//! in-memory [`keydir`] into a complete log-structured key-value store, plus
//! the background merger that compacts sealed files.
//!
//! ## Architecture
//!
//! ```text
//! Client
//!   |
//!   v
//! ┌──────────────────────────────────────────────────┐
//! │                    STORE                         │
//! │                                                  │
//! │ write.rs → encode record → append → index        │
//! │ read.rs  → keydir lookup → seek + decode         │
//! │ recovery.rs → scan data.bit.* oldest-first       │
//! │                                                  │
//! │          one mutex serializes everything         │
//! └──────────────────────────────────────────────────┘
//!          ^                        ^
//!          | active_file()          | update_from_merge()
//! ┌──────────────────────────────────────────────────┐
//! │                    MERGER                        │
//! │ merge.rs → fold sealed files → rewrite survivors │
//! │            → redirect keydir → delete sources    │
//! └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Responsibilities
//!
//! | Module       | Purpose                                            |
//! |--------------|----------------------------------------------------|
//! | `lib.rs`     | `Store` struct, constructor, accessors             |
//! | [`recovery`] | keydir reconstruction from existing data files     |
//! | [`write`]    | `set()`, `del()`, `update_from_merge()`            |
//! | [`read`]     | `get()`                                            |
//! | [`merge`]    | `Merger` background thread and `run_cycle()`       |
//!
//! ## Concurrency
//!
//! A single coarse mutex guards the keydir and the live writer. Every store
//! operation, including the merger's directory updates, runs under it; the
//! work held under the lock is a handful of file operations, so contention
//! stays acceptable. The merger is the only other thread that touches the
//! data directory, and it never touches the active file.

mod merge;
mod read;
mod recovery;
mod write;

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

use bitlog::{BitLog, LogMode};
use keydir::KeyDir;

pub use merge::{run_cycle, MergeSink, Merger};

/// The storage core: one key directory plus one live log writer behind a
/// mutex. Share it across threads with `Arc`.
pub struct Store {
    data_dir: PathBuf,
    file_size_mb: u64,
    inner: Mutex<StoreInner>,
}

struct StoreInner {
    keydir: KeyDir,
    log: BitLog,
}

impl Store {
    /// Opens (or creates) a store over `data_dir`, rebuilding the key
    /// directory from every data file already present.
    ///
    /// Files are visited in timestamp order and records in append order, so
    /// the final entry per key is the freshest surviving one. Trailing
    /// corruption in a file ends that file's scan without failing startup.
    pub fn open<P: AsRef<Path>>(data_dir: P, file_size_mb: u64) -> Result<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        let log =
            BitLog::open(&data_dir, file_size_mb, LogMode::Live).context("open live data log")?;

        let mut keydir = KeyDir::new();
        recovery::load_existing(&data_dir, &mut keydir)?;
        info!(
            dir = %data_dir.display(),
            keys = keydir.len(),
            "store opened"
        );

        Ok(Self {
            data_dir,
            file_size_mb,
            inner: Mutex::new(StoreInner { keydir, log }),
        })
    }

    /// Path of the file the live writer is currently appending to.
    pub fn active_file(&self) -> Result<PathBuf> {
        Ok(self.lock()?.log.active_path().to_path_buf())
    }

    /// Number of live keys in the directory.
    pub fn key_count(&self) -> Result<usize> {
        Ok(self.lock()?.keydir.len())
    }

    /// The directory this store writes into.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// The per-file rotation budget in megabytes.
    pub fn file_size_mb(&self) -> u64 {
        self.file_size_mb
    }

    fn lock(&self) -> Result<MutexGuard<'_, StoreInner>> {
        self.inner.lock().map_err(|_| anyhow!("store lock poisoned"))
    }
}

#[cfg(test)]
mod tests;
