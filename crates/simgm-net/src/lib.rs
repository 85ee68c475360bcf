//! Game-manager-to-game-manager networking for the simgm runtime.
//!
//! - [`codec`]: the binary message encoding, shared with the replay log,
//!   and length-prefixed framing.
//! - [`transport`]: frame transports, in-process ([`MemoryHub`]) and TCP
//!   ([`TcpTransport`]). I/O threads only move bytes; everything that
//!   touches game manager state runs on the tick thread.
//! - [`connection`]: the per-link lifecycle state machine.
//! - [`bridge`]: the [`NetworkBridge`] component, which runs client/server
//!   sessions, routes outgoing messages and injects received ones.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod bridge;
pub mod codec;
pub mod config;
pub mod connection;
pub mod error;
pub mod transport;

pub use bridge::{
    BridgeEvent, BridgeStats, DisconnectReason, MessageAction, MessageFilter, NetworkBridge, Peer,
    NETWORK_BRIDGE_NAME,
};
pub use config::{BridgeConfig, BridgeConfigError, BridgeRole};
pub use connection::{ConnectionEvent, ConnectionState};
pub use error::{NetError, WireError};
pub use transport::{
    ConnectionId, MemoryHub, MemoryTransport, TcpTransport, Transport, TransportEvent,
};
