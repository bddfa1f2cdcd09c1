use std::fs;
use std::path::{Path, PathBuf};

use record::Record;

use crate::Store;

/// A store with a 1 MiB rotation budget, the smallest the config allows.
pub fn open_store(dir: &Path) -> Store {
    Store::open(dir, 1).unwrap()
}

/// Every `data.bit.*` file in `dir`, sorted by timestamp suffix.
pub fn data_files(dir: &Path) -> Vec<PathBuf> {
    bitlog::list_data_files(dir)
        .unwrap()
        .into_iter()
        .map(|(_, p)| p)
        .collect()
}

pub fn merged_files(dir: &Path) -> Vec<PathBuf> {
    data_files(dir)
        .into_iter()
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .map(bitlog::is_merged_file)
                .unwrap_or(false)
        })
        .collect()
}

/// A record with an explicit timestamp; an empty value makes a tombstone.
pub fn rec(ts: u64, key: &[u8], value: &[u8]) -> Record {
    Record {
        timestamp: ts,
        key: key.to_vec(),
        value: value.to_vec(),
    }
}

/// Hand-writes a sealed `data.bit.<ts>` file from pre-built records, as if a
/// past writer had rotated away from it.
pub fn write_sealed_file(dir: &Path, ts: u64, records: &[Record]) -> PathBuf {
    let mut bytes = Vec::new();
    for r in records {
        bytes.extend_from_slice(&r.encode());
    }
    let path = dir.join(format!("data.bit.{ts}"));
    fs::write(&path, bytes).unwrap();
    path
}

pub fn now_ms() -> u64 {
    record::now_ms()
}
