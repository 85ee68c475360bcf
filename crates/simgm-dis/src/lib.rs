//! DIS (IEEE 1278.1) boundary for the simgm runtime.
//!
//! - [`pdu`]: Entity State, Create Entity and Remove Entity PDUs with a
//!   configurable byte order.
//! - [`adapter`]: the [`OutgoingMessage`] adapter multimap (message → PDU)
//!   and the [`IncomingMessage`] processor registry (PDU → message).
//! - [`adapters`]: built-in adapters for actor lifecycle messages.
//! - [`entity_map`]: DIS entity id ↔ actor id pairings.
//! - [`sink`]: UDP and in-process datagram endpoints.
//! - [`component`]: the [`DisComponent`] that plugs all of the above into
//!   a game manager.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod adapter;
pub mod adapters;
pub mod component;
pub mod config;
pub mod entity_map;
pub mod error;
pub mod pdu;
pub mod sink;

pub use adapter::{
    AdapterContext, IncomingMessage, IncomingStats, OutgoingAdapter, OutgoingMessage,
    OutgoingStats, PduProcessor,
};
pub use adapters::entity_actor_type;
pub use component::{DisComponent, DisStats, DIS_COMPONENT_NAME};
pub use config::{DisConfig, DisConfigError, DEFAULT_REMOTE_ACTOR_TYPE};
pub use entity_map::{EntityMap, EntityTypeMap};
pub use error::{DisError, PduError};
pub use pdu::{Endian, EntityId, EntityType, Pdu, PduHeader, PduType};
pub use sink::{ChannelSink, PduSink, UdpSink};
