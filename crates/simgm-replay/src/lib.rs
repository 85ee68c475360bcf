//! Message logging for the simgm runtime.
//!
//! Records the messages a game manager dispatches and plays them back
//! later, into the same or another game manager.
//!
//! # Architecture
//!
//! - [`LogWriter`] streams log entries to any `Write` sink
//! - [`LogReader`] reads them back from any `Read` source
//! - [`LogStore`] names logs: [`MemoryLogStore`] in process,
//!   [`DirLogStore`] as `<name>.dlm` files in a directory
//! - [`ServerLogger`] is the component that records and plays back,
//!   driven by the `LOG_REQ_*` messages and reporting with
//!   `LOG_INFO_STATUS`
//!
//! # Format
//!
//! ```text
//! [MAGIC "GMLOGMSGDB"] [MAJOR u8] [MINOR u8]
//! [entry 1] [entry 2] ... [END]
//! ```
//!
//! Entries are recorded messages (in the game manager wire encoding,
//! with their dispatch sim time), tags and keyframe markers. See
//! [`codec`] for the byte layout.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod codec;
pub mod config;
pub mod error;
pub mod logger;
pub mod reader;
pub mod status;
pub mod store;
pub mod types;
pub mod writer;

pub use config::{LoggerConfig, LoggerConfigError, DEFAULT_LOG_NAME};
pub use error::LogError;
pub use logger::{
    ServerLogger, FIRST_KEYFRAME_NAME, PLAYBACK_MACHINE_ID, PLAYBACK_MACHINE_NAME,
    SERVER_LOGGER_NAME,
};
pub use reader::{EntryIter, LogReader};
pub use status::{LogStatus, LoggerState};
pub use store::{is_valid_log_name, DirLogStore, LogStore, MemoryLogStore, LOG_EXTENSION};
pub use types::{LogEnd, LogEntry, LogIndex, LogKeyframe, LogTag, RecordedMessage};
pub use writer::LogWriter;

/// Magic bytes at the start of every message log.
pub const MAGIC: [u8; 10] = *b"GMLOGMSGDB";

/// Major format version. Logs with another major version are refused.
pub const MAJOR_VERSION: u8 = 1;

/// Minor format version. Logs with an older or equal minor version are
/// read.
pub const MINOR_VERSION: u8 = 0;
