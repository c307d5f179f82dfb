use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GpioError {
    #[error("Pin not found: {0}")]
    NotFoundPin(u32),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Invalid value: {0}")]
    InvalidValue(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("export gpio{pin}: {source}")]
    Export {
        pin: u32,
        #[source]
        source: io::Error,
    },
    #[error("configure gpio{pin} {attribute}: {source}")]
    Configure {
        pin: u32,
        attribute: &'static str,
        #[source]
        source: io::Error,
    },
    #[error("gpio{pin} value: {source}")]
    Io {
        pin: u32,
        #[source]
        source: io::Error,
    },
    #[error("gpio{0} is not exported")]
    NotExported(u32),
    #[error("watch registration on {path}: {reason}")]
    WatchRegistration { path: PathBuf, reason: String },
    #[error("watch failed: {0}")]
    WatchTerminal(String),
}
