//! Core message types for the simgm runtime.
//!
//! This is the leaf crate of the workspace. It defines identifiers,
//! typed message parameters, the message envelope, machine identity and
//! the runtime message-type registry that every other crate builds on.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod builtin;
pub mod error;
pub mod factory;
pub mod hash;
pub mod id;
pub mod machine;
pub mod message;
pub mod param;

pub use error::{FactoryError, IdParseError, ParamError};
pub use factory::{MessageFactory, MessageType, PrototypeBuilder};
pub use id::{ActorId, MachineId, MessageTypeId, TickId, UidGenerator};
pub use machine::MachineInfo;
pub use message::Message;
pub use param::{MessageParameter, ParamGroup, ParamType, ParamValue};
