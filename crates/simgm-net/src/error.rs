//! Error types for the wire codec, transports and the network bridge.

use std::io;

use thiserror::Error;

use simgm_core::MessageTypeId;

use crate::config::BridgeConfigError;
use crate::connection::{ConnectionEvent, ConnectionState};
use crate::transport::ConnectionId;

/// Errors raised while encoding or decoding a message on the wire.
#[derive(Debug, Error)]
pub enum WireError {
    /// An I/O error occurred while reading or writing.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// The bytes do not form a valid message (truncated data, bad tag,
    /// wrong parameter count, trailing bytes).
    #[error("malformed message: {detail}")]
    MalformedMessage {
        /// What went wrong.
        detail: String,
    },
    /// The message type id is not registered with the decoding factory.
    #[error("message type {id} is not registered")]
    UnknownMessageType {
        /// The unrecognised id.
        id: MessageTypeId,
    },
    /// Sender and receiver disagree about the parameter layout of a type.
    #[error(
        "schema mismatch for message type {id}: sender {found:#010x}, receiver {expected:#010x}"
    )]
    SchemaMismatch {
        /// Message type id.
        id: MessageTypeId,
        /// Fingerprint of the local prototype.
        expected: u32,
        /// Fingerprint carried in the encoded message.
        found: u32,
    },
    /// A frame exceeds the configured size limit.
    #[error("frame of {len} bytes exceeds the {max} byte limit")]
    FrameTooLarge {
        /// Frame length.
        len: usize,
        /// Configured limit.
        max: usize,
    },
}

impl WireError {
    pub(crate) fn malformed(detail: impl Into<String>) -> Self {
        WireError::MalformedMessage {
            detail: detail.into(),
        }
    }
}

/// Errors returned by transports and the network bridge.
#[derive(Debug, Error)]
pub enum NetError {
    /// Encoding or decoding failed.
    #[error(transparent)]
    Wire(#[from] WireError),
    /// A socket operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// Another listener already owns this address.
    #[error("address {address:?} is already in use")]
    AddressInUse {
        /// Requested address.
        address: String,
    },
    /// The connection id is unknown or already closed.
    #[error("connection {conn} is not open")]
    UnknownConnection {
        /// Connection id.
        conn: ConnectionId,
    },
    /// A connection event is not valid in the connection's current state.
    #[error("connection cannot handle {event:?} while {from:?}")]
    InvalidTransition {
        /// State at the time of the event.
        from: ConnectionState,
        /// Rejected event.
        event: ConnectionEvent,
    },
    /// The transport cannot open outgoing connections.
    #[error("transport does not support outgoing connections")]
    ConnectUnsupported,
    /// The bridge configuration is invalid.
    #[error(transparent)]
    Config(#[from] BridgeConfigError),
    /// A background thread could not be started.
    #[error("failed to spawn network thread: {reason}")]
    ThreadSpawn {
        /// Spawn error text.
        reason: String,
    },
}
