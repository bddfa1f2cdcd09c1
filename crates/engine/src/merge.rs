//! Compaction: folds sealed data files into a fresh merged file, keeping
//! only the latest live record per key, then deletes the sources.
//!
//! The merger runs concurrently with live writes. Two rules keep that safe:
//! the live writer's active file is never a candidate, and the store's
//! [`MergeSink::update_from_merge`] hook refuses to replace a directory
//! entry that is strictly newer than the rewritten record.

use anyhow::{ensure, Context, Result};
use crossbeam_channel::{bounded, select, tick, Sender};
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{error, info, warn};

use bitlog::{BitLog, LogMode};
use record::Record;

use crate::Store;

/// The narrow view of the store the merger is allowed to touch.
pub trait MergeSink: Send + Sync {
    /// Path of the live writer's active file, which must never be merged.
    fn active_file(&self) -> Result<PathBuf>;

    /// Installs a rewritten record's location unless the directory already
    /// holds a strictly newer entry for the key.
    fn update_from_merge(
        &self,
        key: &[u8],
        file_id: &Path,
        pos: u64,
        value_size: u32,
        timestamp: u64,
    ) -> Result<()>;
}

impl MergeSink for Store {
    fn active_file(&self) -> Result<PathBuf> {
        Store::active_file(self)
    }

    fn update_from_merge(
        &self,
        key: &[u8],
        file_id: &Path,
        pos: u64,
        value_size: u32,
        timestamp: u64,
    ) -> Result<()> {
        Store::update_from_merge(self, key, file_id, pos, value_size, timestamp)
    }
}

/// Background compactor. Runs [`run_cycle`] on a fixed period until stopped;
/// cycles never overlap because a single thread runs them all.
///
/// `stop()` (and `Drop`) closes the quit channel and joins the thread, so an
/// in-flight cycle always finishes before shutdown completes.
pub struct Merger {
    quit: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Merger {
    /// Spawns the merge thread over `data_dir` with the given tick period.
    ///
    /// The directory must already exist; the store creates it when opening.
    pub fn start(
        data_dir: PathBuf,
        file_size_mb: u64,
        period: Duration,
        sink: Arc<dyn MergeSink>,
    ) -> Result<Self> {
        ensure!(
            data_dir.is_dir(),
            "data directory does not exist: {}",
            data_dir.display()
        );

        let (quit_tx, quit_rx) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("merger".into())
            .spawn(move || {
                let ticker = tick(period);
                loop {
                    select! {
                        recv(quit_rx) -> _ => break,
                        recv(ticker) -> _ => {
                            if let Err(e) = run_cycle(&data_dir, file_size_mb, sink.as_ref()) {
                                error!(error = %e, "merge cycle failed");
                            }
                        }
                    }
                }
            })
            .context("spawn merger thread")?;

        Ok(Self {
            quit: Some(quit_tx),
            handle: Some(handle),
        })
    }

    /// Signals the thread and blocks until it has finished its current tick.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.quit.take();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Merger {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// One merge cycle over `data_dir`.
///
/// Every `data.bit.*` file other than the live active file is a candidate.
/// If no unmerged candidate exists the cycle is a no-op. Otherwise the
/// candidates sealed before the cycle's cutoff (the fresh merged file's own
/// timestamp) are folded oldest-first into a per-key map: later records
/// overwrite earlier ones and tombstones drop the key. The survivors are
/// rewritten into the merged file with their timestamps unchanged, each
/// rewrite is reported to the sink, and the candidates are deleted.
pub fn run_cycle(data_dir: &Path, file_size_mb: u64, sink: &dyn MergeSink) -> Result<()> {
    let files = bitlog::list_data_files(data_dir).context("list data directory")?;
    let active = sink.active_file()?;

    let mut candidates: Vec<(u64, PathBuf)> = Vec::new();
    let mut old_live_count = 0usize;
    for (ts, path) in files {
        if path == active {
            continue;
        }
        let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if !bitlog::is_merged_file(name) {
            old_live_count += 1;
        }
        candidates.push((ts, path));
    }
    if old_live_count == 0 {
        return Ok(());
    }

    let mut merged =
        BitLog::open(data_dir, file_size_mb, LogMode::Merged).context("create merged log")?;
    let cutoff = BitLog::timestamp_of(merged.active_path())?;

    let mut entries: HashMap<Vec<u8>, Record> = HashMap::new();
    for (ts, path) in &candidates {
        // Candidates newer than the cycle itself wait for the next one.
        if *ts > cutoff {
            continue;
        }
        let mut file = match File::open(path) {
            Ok(f) => f,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "skipping unreadable data file");
                continue;
            }
        };
        let mut pos = 0u64;
        while let Ok(rec) = Record::read_at(&mut file, pos) {
            pos += rec.encoded_len() as u64;
            if rec.is_tombstone() {
                entries.remove(&rec.key);
            } else {
                entries.insert(rec.key.clone(), rec);
            }
        }
    }

    // Rewrite the survivors. A failure here aborts the cycle with every
    // source file intact: an orphaned merged file is harmless, a deleted
    // source with an unwritten record is not. Timestamps are preserved so
    // the sink's guard can compare against concurrent live writes.
    let rewritten = entries.len();
    for rec in entries.values() {
        let bytes = rec.encode();
        merged.append(&bytes).context("append to merged log")?;
        let pos = merged.offset() - bytes.len() as u64;
        sink.update_from_merge(
            &rec.key,
            merged.active_path(),
            pos,
            rec.value.len() as u32,
            rec.timestamp,
        )?;
    }

    for (_, path) in &candidates {
        if let Err(e) = fs::remove_file(path) {
            warn!(file = %path.display(), error = %e, "failed to delete merged-out file");
        }
    }

    info!(
        candidates = candidates.len(),
        rewritten, "merge cycle complete"
    );
    Ok(())
}
