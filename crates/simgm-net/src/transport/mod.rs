//! Byte-frame transports between game managers.
//!
//! A [`Transport`] moves opaque frames. Connection attempts, incoming frames
//! and link failures are reported as [`TransportEvent`]s collected by
//! [`Transport::poll`], which the network bridge calls once per step on the
//! tick thread. I/O threads never touch game manager state.

use std::fmt;

use crate::error::NetError;

pub mod memory;
pub mod tcp;

pub use memory::{MemoryHub, MemoryTransport};
pub use tcp::TcpTransport;

/// Transport-local connection handle.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Something that happened on a transport since the last poll.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TransportEvent {
    /// A link came up. `inbound` is true for links accepted by a listener.
    Opened {
        /// Connection handle.
        conn: ConnectionId,
        /// Whether the remote side initiated the link.
        inbound: bool,
    },
    /// An outgoing connection attempt failed.
    ConnectFailed {
        /// Handle returned by [`Transport::connect`].
        conn: ConnectionId,
        /// Failure description.
        reason: String,
    },
    /// A complete frame arrived.
    Frame {
        /// Connection handle.
        conn: ConnectionId,
        /// Frame payload.
        bytes: Vec<u8>,
    },
    /// The link reported an error and is unusable.
    Error {
        /// Connection handle.
        conn: ConnectionId,
        /// Error description.
        reason: String,
    },
    /// The remote side closed the link.
    Closed {
        /// Connection handle.
        conn: ConnectionId,
    },
}

/// A frame transport.
pub trait Transport: Send + 'static {
    /// Start an outgoing connection to `address`. The returned handle is
    /// reported as [`TransportEvent::Opened`] or
    /// [`TransportEvent::ConnectFailed`] by a later poll.
    fn connect(&mut self, address: &str) -> Result<ConnectionId, NetError>;

    /// Send one frame.
    ///
    /// # Errors
    ///
    /// [`NetError::UnknownConnection`] for a closed handle, or the I/O
    /// error that made the link unusable.
    fn send(&mut self, conn: ConnectionId, frame: &[u8]) -> Result<(), NetError>;

    /// Close a link. Unknown handles are ignored. No event is reported for
    /// a locally closed link.
    fn close(&mut self, conn: ConnectionId);

    /// Append every event since the last poll to `events`.
    fn poll(&mut self, events: &mut Vec<TransportEvent>);
}
