//! # BitLog — rolling append-only data files
//!
//! A [`BitLog`] appends byte blocks to the active file of a data directory
//! and rotates to a fresh file once the configured size budget is reached.
//! Files are immutable from the moment they stop being active; the only
//! thing that ever deletes one is the merger.
//!
//! ## File naming
//!
//! ```text
//! data.bit.<ms_timestamp>          live data file
//! data.bit.merged.<ms_timestamp>   compaction output
//! ```
//!
//! The millisecond suffix orders files: every selection (adoption of the
//! newest under-budget file on open, recovery, merging) parses the suffix
//! and sorts numerically. Lexicographic order would misorder suffixes with
//! different digit counts.

use std::fs::{self, File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use thiserror::Error;

/// Prefix shared by every data file in a directory.
pub const DATA_FILE_PREFIX: &str = "data.bit.";

/// Prefix of compaction output files.
pub const MERGED_FILE_PREFIX: &str = "data.bit.merged.";

const MEGABYTE: u64 = 1024 * 1024;

/// Errors from opening, appending to, or rotating the log.
#[derive(Debug, Error)]
pub enum LogError {
    /// The data directory path was empty.
    #[error("data directory cannot be empty")]
    EmptyDir,

    /// The size budget was zero.
    #[error("file max size must be a positive number of megabytes")]
    InvalidSize,

    /// A filename did not carry a numeric timestamp suffix.
    #[error("no timestamp suffix in file name: {0}")]
    BadFileName(String),

    /// An underlying I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Which role the writer's files play.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogMode {
    /// Regular data files fed by client writes.
    Live,
    /// Compaction output files written by the merger.
    Merged,
}

/// Append-only writer over a rolling sequence of files.
///
/// At most one writer per role may exist for a directory; `append` takes
/// `&mut self`, so the owner (the store's mutex for live files, the merger
/// for merged files) provides the single-writer discipline.
pub struct BitLog {
    dir: PathBuf,
    max_size_mb: u64,
    mode: LogMode,
    path: PathBuf,
    file: File,
    pos: u64,
}

impl BitLog {
    /// Opens a writer over `dir`, creating the directory if needed.
    ///
    /// In [`LogMode::Live`], the numerically newest unmerged data file is
    /// adopted as the active file if it is still under the size budget;
    /// otherwise a fresh timestamped file is started. [`LogMode::Merged`]
    /// always starts a fresh file.
    pub fn open<P: AsRef<Path>>(dir: P, size_mb: u64, mode: LogMode) -> Result<Self, LogError> {
        let dir = dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Err(LogError::EmptyDir);
        }
        if size_mb == 0 {
            return Err(LogError::InvalidSize);
        }
        fs::create_dir_all(dir)?;

        if mode == LogMode::Live {
            if let Some((path, size)) = find_latest_available(dir, size_mb * MEGABYTE)? {
                let mut file = OpenOptions::new().read(true).write(true).open(&path)?;
                file.seek(SeekFrom::End(0))?;
                return Ok(Self {
                    dir: dir.to_path_buf(),
                    max_size_mb: size_mb,
                    mode,
                    path,
                    file,
                    pos: size,
                });
            }
        }

        let path = fresh_path(dir, mode);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            max_size_mb: size_mb,
            mode,
            path,
            file,
            pos: 0,
        })
    }

    /// Appends `bytes` to the active file, rotating first if the write would
    /// reach the size budget. On success the offset advances by the full
    /// block length.
    pub fn append(&mut self, bytes: &[u8]) -> Result<usize, LogError> {
        if self.pos + bytes.len() as u64 >= self.max_size_bytes() {
            self.rotate()?;
        }
        self.file.write_all(bytes)?;
        self.pos += bytes.len() as u64;
        Ok(bytes.len())
    }

    /// Seals the active file and starts a fresh one of the same role.
    fn rotate(&mut self) -> Result<(), LogError> {
        let path = fresh_path(&self.dir, self.mode);
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(&path)?;
        self.path = path;
        self.file = file;
        self.pos = 0;
        Ok(())
    }

    /// Moves the write handle to `pos` relative to the start of the active
    /// file. Used to roll back after an append that failed without rotating.
    pub fn seek(&mut self, pos: u64) -> Result<(), LogError> {
        self.file.seek(SeekFrom::Start(pos))?;
        self.pos = pos;
        Ok(())
    }

    /// Path of the file currently open for append.
    pub fn active_path(&self) -> &Path {
        &self.path
    }

    /// Byte offset within the active file, which mirrors its length.
    pub fn offset(&self) -> u64 {
        self.pos
    }

    /// The rotation budget in bytes.
    pub fn max_size_bytes(&self) -> u64 {
        self.max_size_mb * MEGABYTE
    }

    /// Parses the trailing millisecond suffix of a data file name.
    pub fn timestamp_of(path: &Path) -> Result<u64, LogError> {
        let name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| LogError::BadFileName(path.display().to_string()))?;
        name.rsplit('.')
            .next()
            .and_then(|ts| ts.parse().ok())
            .ok_or_else(|| LogError::BadFileName(name.to_string()))
    }
}

/// True for any data file name, merged or live.
pub fn is_data_file(name: &str) -> bool {
    name.starts_with(DATA_FILE_PREFIX)
}

/// True for compaction output file names.
pub fn is_merged_file(name: &str) -> bool {
    name.starts_with(MERGED_FILE_PREFIX)
}

/// Lists every regular `data.bit.*` file in `dir` whose timestamp suffix
/// parses, sorted ascending by that timestamp. Files with unparseable names
/// are ignored.
pub fn list_data_files(dir: &Path) -> Result<Vec<(u64, PathBuf)>, LogError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_file() {
            continue;
        }
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !is_data_file(name) {
            continue;
        }
        if let Ok(ts) = BitLog::timestamp_of(&entry.path()) {
            files.push((ts, entry.path()));
        }
    }
    files.sort_by_key(|(ts, _)| *ts);
    Ok(files)
}

/// The newest unmerged data file, if it is still under `max_bytes`.
fn find_latest_available(dir: &Path, max_bytes: u64) -> Result<Option<(PathBuf, u64)>, LogError> {
    let latest = list_data_files(dir)?
        .into_iter()
        .rev()
        .map(|(_, path)| path)
        .find(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| !is_merged_file(n))
                .unwrap_or(false)
        });
    match latest {
        Some(path) => {
            let size = fs::metadata(&path)?.len();
            if size >= max_bytes {
                Ok(None)
            } else {
                Ok(Some((path, size)))
            }
        }
        None => Ok(None),
    }
}

/// A timestamped path that does not exist yet. Two rotations inside the same
/// millisecond bump the suffix rather than truncate the sealed file.
fn fresh_path(dir: &Path, mode: LogMode) -> PathBuf {
    let prefix = match mode {
        LogMode::Live => DATA_FILE_PREFIX,
        LogMode::Merged => MERGED_FILE_PREFIX,
    };
    let mut ts = now_ms();
    loop {
        let path = dir.join(format!("{prefix}{ts}"));
        if !path.exists() {
            return path;
        }
        ts += 1;
    }
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
