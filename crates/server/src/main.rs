//! # caskd — Bitcask-style key-value server
//!
//! Wires the pieces together: load the JSON config, claim the PID file, open
//! the store (recovering the key directory from disk), start the TCP front
//! end and the background merger, then wait for SIGINT/SIGTERM and shut
//! everything down in order.
//!
//! ```text
//! $ caskd -c config.json
//! $ echo -n "set greeting hello" | nc 127.0.0.1 9736
//! OK
//! $ echo -n "get greeting" | nc 127.0.0.1 9736
//! hello
//! ```
//!
//! Any startup failure (bad config, bind error, PID file already present)
//! exits non-zero; a signal-driven shutdown exits zero.

use anyhow::Result;
use clap::Parser;
use signal_hook::consts::{SIGINT, SIGTERM};
use signal_hook::iterator::Signals;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engine::{MergeSink, Merger, Store};
use server::config::Config;
use server::net::Server;
use server::pidfile::PidFile;

/// Bitcask-style key-value store served over TCP.
#[derive(Parser)]
#[command(name = "caskd", version, about)]
struct Args {
    /// Path to the JSON config file.
    #[arg(short = 'c', long = "config")]
    config: PathBuf,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    let pidfile = PidFile::create(&cfg.pidfile)?;
    let store = Arc::new(Store::open(&cfg.data_directory, cfg.data_filesize_in_mb)?);
    let server = Server::start(&cfg.host, cfg.port, Arc::clone(&store))?;
    let merger = Merger::start(
        store.data_dir().to_path_buf(),
        cfg.data_filesize_in_mb,
        Duration::from_secs(cfg.merge_frequency_in_seconds),
        Arc::clone(&store) as Arc<dyn MergeSink>,
    )?;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    signals.forever().next();

    info!("shutting down");
    server.stop();
    merger.stop();
    drop(store);
    drop(pidfile);
    Ok(())
}
