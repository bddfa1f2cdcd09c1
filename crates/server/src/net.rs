//! The TCP command surface: a thin request loop over the store.
//!
//! One received buffer is one command. Tokens are whitespace-separated;
//! replies are `OK`, raw value bytes, or the error's message text with no
//! framing of any kind; clients distinguish by content. The listener runs
//! on its own thread, each connection on another; all of them poll a shared
//! quit flag so shutdown is observed within a read deadline.

use anyhow::{Context, Result};
use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, info};

use engine::Store;

/// One command per received buffer, up to this many bytes.
const READ_BUFFER_SIZE: usize = 4096;

/// How long a connection blocks in `read` before re-checking the quit flag.
const READ_DEADLINE: Duration = Duration::from_millis(200);

/// How long the acceptor sleeps when no connection is pending.
const ACCEPT_POLL: Duration = Duration::from_millis(100);

/// The running TCP front end. `stop()` (or `Drop`) stops accepting, wakes
/// every connection handler, and joins them all.
pub struct Server {
    local_addr: SocketAddr,
    quit: Arc<AtomicBool>,
    acceptor: Option<JoinHandle<()>>,
}

impl Server {
    /// Binds `host:port` and starts serving. Pass port `0` to let the OS
    /// choose one; the bound address is available from [`Server::local_addr`].
    pub fn start(host: &str, port: u16, store: Arc<Store>) -> Result<Self> {
        let listener =
            TcpListener::bind((host, port)).with_context(|| format!("bind {host}:{port}"))?;
        // Non-blocking accept lets the loop observe the quit flag.
        listener.set_nonblocking(true)?;
        let local_addr = listener.local_addr()?;
        info!(addr = %local_addr, "listening");

        let quit = Arc::new(AtomicBool::new(false));
        let acceptor = {
            let quit = Arc::clone(&quit);
            thread::Builder::new()
                .name("acceptor".into())
                .spawn(move || accept_loop(listener, store, quit))
                .context("spawn acceptor thread")?
        };

        Ok(Self {
            local_addr,
            quit,
            acceptor: Some(acceptor),
        })
    }

    /// The address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting and blocks until every connection handler has exited.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.quit.store(true, Ordering::SeqCst);
        if let Some(handle) = self.acceptor.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn accept_loop(listener: TcpListener, store: Arc<Store>, quit: Arc<AtomicBool>) {
    let mut handlers: Vec<JoinHandle<()>> = Vec::new();
    loop {
        if quit.load(Ordering::SeqCst) {
            break;
        }
        match listener.accept() {
            Ok((stream, peer)) => {
                debug!(%peer, "connection accepted");
                let store = Arc::clone(&store);
                let quit = Arc::clone(&quit);
                let spawned = thread::Builder::new()
                    .name("conn".into())
                    .spawn(move || {
                        if let Err(e) = serve_connection(stream, &store, &quit) {
                            debug!(%peer, error = %e, "connection closed");
                        }
                    });
                match spawned {
                    Ok(handle) => handlers.push(handle),
                    Err(e) => error!(error = %e, "failed to spawn connection handler"),
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => thread::sleep(ACCEPT_POLL),
            Err(e) => error!(error = %e, "accept error"),
        }
    }
    for handle in handlers {
        let _ = handle.join();
    }
}

fn serve_connection(mut stream: TcpStream, store: &Store, quit: &AtomicBool) -> Result<()> {
    // The stream may inherit the listener's non-blocking mode on some
    // platforms; a plain blocking read with a deadline is what we want.
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(READ_DEADLINE))?;

    let mut buf = [0u8; READ_BUFFER_SIZE];
    loop {
        if quit.load(Ordering::SeqCst) {
            return Ok(());
        }
        match stream.read(&mut buf) {
            Ok(0) => return Ok(()),
            Ok(n) => {
                let line = String::from_utf8_lossy(&buf[..n]);
                let line = line.trim();
                debug!(command = line, "received");
                let reply = dispatch(store, line);
                stream.write_all(&reply)?;
            }
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                continue
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Runs one whitespace-tokenized command line against the store and returns
/// the reply bytes. Errors travel as their message text.
pub fn dispatch(store: &Store, line: &str) -> Vec<u8> {
    match run_command(store, line) {
        Ok(reply) => reply,
        Err(message) => message.into_bytes(),
    }
}

fn run_command(store: &Store, line: &str) -> Result<Vec<u8>, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some(verb) = tokens.first() else {
        // Empty command, empty reply.
        return Ok(Vec::new());
    };

    match *verb {
        "set" => {
            check_arity(&tokens, 3)?;
            store
                .set(tokens[1].as_bytes(), tokens[2].as_bytes())
                .map_err(|e| e.to_string())?;
            Ok(b"OK".to_vec())
        }
        "get" => {
            check_arity(&tokens, 2)?;
            store.get(tokens[1].as_bytes()).map_err(|e| e.to_string())
        }
        "del" => {
            check_arity(&tokens, 2)?;
            store.del(tokens[1].as_bytes()).map_err(|e| e.to_string())?;
            Ok(b"OK".to_vec())
        }
        _ => Err("Unknown command".to_string()),
    }
}

fn check_arity(tokens: &[&str], want: usize) -> Result<(), String> {
    if tokens.len() > want {
        return Err("Too many arguments".to_string());
    }
    if tokens.len() < want {
        return Err("Too few arguments".to_string());
    }
    Ok(())
}
