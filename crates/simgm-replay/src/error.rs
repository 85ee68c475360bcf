//! Error types for message logs, log stores and the server logger.

use std::io;

use thiserror::Error;

use simgm_core::ParamError;
use simgm_engine::GmError;
use simgm_net::WireError;

use crate::config::LoggerConfigError;

/// Errors that can occur while recording, reading or managing logs.
#[derive(Debug, Error)]
pub enum LogError {
    /// An I/O error occurred during read or write.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The stream does not start with the `GMLOGMSGDB` magic bytes.
    #[error("invalid magic bytes (expected b\"GMLOGMSGDB\")")]
    InvalidMagic,
    /// The log was written by an incompatible format version.
    #[error("unsupported log format version {major}.{minor}")]
    UnsupportedVersion {
        /// Major version found in the log.
        major: u8,
        /// Minor version found in the log.
        minor: u8,
    },
    /// An entry could not be decoded (truncated or corrupt data).
    #[error("malformed log entry: {detail}")]
    MalformedEntry {
        /// What went wrong.
        detail: String,
    },
    /// A recorded message could not be encoded or decoded.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// The operation is not allowed in the logger's current state.
    #[error("cannot {operation} while {state}")]
    InvalidState {
        /// Attempted operation.
        operation: &'static str,
        /// State the logger was in.
        state: &'static str,
    },
    /// Log names must be non-empty and must not contain path separators.
    #[error("invalid log name {name:?}")]
    InvalidLogName {
        /// Offending name.
        name: String,
    },
    /// No log of this name exists in the store.
    #[error("log {name:?} not found")]
    LogNotFound {
        /// Requested name.
        name: String,
    },
    /// The logger configuration is invalid.
    #[error(transparent)]
    Config(#[from] LoggerConfigError),
    /// Reading or writing a message parameter failed.
    #[error(transparent)]
    Param(#[from] ParamError),
    /// The game manager refused an operation.
    #[error(transparent)]
    Gm(#[from] GmError),
}

impl LogError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        LogError::MalformedEntry {
            detail: detail.into(),
        }
    }

    /// Map an unexpected end of stream inside an entry to
    /// [`LogError::MalformedEntry`].
    pub(crate) fn truncated(e: WireError) -> Self {
        match e {
            WireError::Io(io) if io.kind() == io::ErrorKind::UnexpectedEof => {
                LogError::malformed("truncated entry")
            }
            other => LogError::Wire(other),
        }
    }
}
