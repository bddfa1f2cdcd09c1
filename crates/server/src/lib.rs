//! The caskd front end: JSON configuration, the PID-file process contract,
//! and the line-oriented TCP command surface over the storage engine.

pub mod config;
pub mod net;
pub mod pidfile;
