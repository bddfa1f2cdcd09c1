//! JSON configuration.
//!
//! ```json
//! {
//!     "host": "127.0.0.1",
//!     "port": 9736,
//!     "pidfile": "bitcask.pid",
//!     "data_directory": "data",
//!     "data_filesize_in_mb": 64,
//!     "merge_frequency_in_seconds": 3600
//! }
//! ```
//!
//! `pidfile` defaults to `bitcask.pid`; a missing or zero
//! `merge_frequency_in_seconds` becomes one hour.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// PID file used when the config does not name one.
pub const DEFAULT_PIDFILE: &str = "bitcask.pid";

const DEFAULT_MERGE_FREQUENCY_SECS: u64 = 3600;

/// The full server configuration, loaded once at startup and passed by value
/// into the store, merger, and listener.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// TCP bind host.
    pub host: String,
    /// TCP bind port.
    pub port: u16,
    /// Path of the PID file.
    #[serde(default)]
    pub pidfile: String,
    /// Root directory for data files.
    pub data_directory: String,
    /// Rotation budget per data file, in megabytes.
    pub data_filesize_in_mb: u64,
    /// Merge period in seconds.
    #[serde(default)]
    pub merge_frequency_in_seconds: u64,
}

impl Config {
    /// Reads and validates the configuration at `path`, applying defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to open config file {}", path.display()))?;
        let mut cfg: Config =
            serde_json::from_str(&content).context("config file is not valid json")?;

        ensure!(
            cfg.data_filesize_in_mb > 0,
            "data_filesize_in_mb must be a positive integer"
        );
        ensure!(
            !cfg.data_directory.is_empty(),
            "data_directory must be set"
        );

        if cfg.pidfile.is_empty() {
            cfg.pidfile = DEFAULT_PIDFILE.to_string();
        }
        if cfg.merge_frequency_in_seconds == 0 {
            cfg.merge_frequency_in_seconds = DEFAULT_MERGE_FREQUENCY_SECS;
        }
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn write_config(json: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, json).unwrap();
        (dir, path)
    }

    #[test]
    fn full_config_parses() {
        let (_dir, path) = write_config(
            r#"{
                "host": "0.0.0.0",
                "port": 9736,
                "pidfile": "/tmp/cask.pid",
                "data_directory": "/tmp/cask-data",
                "data_filesize_in_mb": 16,
                "merge_frequency_in_seconds": 120
            }"#,
        );

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.host, "0.0.0.0");
        assert_eq!(cfg.port, 9736);
        assert_eq!(cfg.pidfile, "/tmp/cask.pid");
        assert_eq!(cfg.data_directory, "/tmp/cask-data");
        assert_eq!(cfg.data_filesize_in_mb, 16);
        assert_eq!(cfg.merge_frequency_in_seconds, 120);
    }

    #[test]
    fn pidfile_and_merge_frequency_default() {
        let (_dir, path) = write_config(
            r#"{
                "host": "127.0.0.1",
                "port": 9736,
                "data_directory": "data",
                "data_filesize_in_mb": 1
            }"#,
        );

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.pidfile, DEFAULT_PIDFILE);
        assert_eq!(cfg.merge_frequency_in_seconds, 3600);
    }

    #[test]
    fn zero_merge_frequency_becomes_an_hour() {
        let (_dir, path) = write_config(
            r#"{
                "host": "127.0.0.1",
                "port": 9736,
                "data_directory": "data",
                "data_filesize_in_mb": 1,
                "merge_frequency_in_seconds": 0
            }"#,
        );

        let cfg = Config::load(&path).unwrap();
        assert_eq!(cfg.merge_frequency_in_seconds, 3600);
    }

    #[test]
    fn invalid_json_is_rejected() {
        let (_dir, path) = write_config("{ not json");
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("not valid json"));
    }

    #[test]
    fn zero_filesize_is_rejected() {
        let (_dir, path) = write_config(
            r#"{
                "host": "127.0.0.1",
                "port": 9736,
                "data_directory": "data",
                "data_filesize_in_mb": 0
            }"#,
        );
        let err = Config::load(&path).unwrap_err();
        assert!(err.to_string().contains("positive"));
    }

    #[test]
    fn missing_file_is_rejected() {
        let err = Config::load(Path::new("/nonexistent/config.json")).unwrap_err();
        assert!(err.to_string().contains("failed to open config file"));
    }
}
