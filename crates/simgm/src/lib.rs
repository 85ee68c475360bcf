//! simgm: a message-driven game manager runtime.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all simgm sub-crates. For most users, adding `simgm` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use simgm::prelude::*;
//! use simgm::core::builtin::INFO_GAME_EVENT;
//!
//! // A component that counts game events.
//! #[derive(Default)]
//! struct EventCounter(u32);
//! impl GmComponent for EventCounter {
//!     fn name(&self) -> &str { "event_counter" }
//!     fn process_message(&mut self, msg: &Message, _gm: &mut GmContext<'_>) -> ComponentResult {
//!         if msg.message_type() == INFO_GAME_EVENT {
//!             self.0 += 1;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let mut gm = GameManager::new(GameManagerConfig::default()).unwrap();
//! gm.configure().unwrap();
//! gm.register_actor_type(ActorType::builder("demo.Crate", "props").property("Mass", 5.0f32).build())
//!     .unwrap();
//! gm.add_component(Box::new(DefaultMessageProcessor::new())).unwrap();
//! gm.add_component(Box::new(EventCounter::default())).unwrap();
//! gm.start().unwrap();
//!
//! let crate_actor = gm.create_actor("demo.Crate").unwrap();
//! let id = gm.add_actor(crate_actor).unwrap();
//! let mut event = gm.create_message(INFO_GAME_EVENT).unwrap();
//! event.set("EventName", "spawned").unwrap();
//! gm.send_message(event).unwrap();
//! gm.step(0.1, 0.1).unwrap();
//!
//! assert!(gm.actor(id).is_some());
//! assert_eq!(gm.component_as::<EventCounter>("event_counter").unwrap().0, 1);
//! ```
//!
//! # Modules
//!
//! Each module corresponds to a sub-crate. Use them for types not in the prelude:
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`core`] | `simgm-core` | IDs, messages, parameters, the message factory, built-in types |
//! | [`engine`] | `simgm-engine` | The game manager, components, actors, timers, the tick thread |
//! | [`net`] | `simgm-net` | Wire codec, transports and the network bridge |
//! | [`dis`] | `simgm-dis` | DIS PDUs, adapters and the DIS component |
//! | [`replay`] | `simgm-replay` | Message logs, log stores and the server logger |

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// Identifiers, messages and the message factory (`simgm-core`).
///
/// The built-in message types and their ids live in [`core::builtin`].
pub use simgm_core as core;

/// The game manager and its extension points (`simgm-engine`).
///
/// [`engine::GameManager`] runs the per-step dispatch loop;
/// [`engine::GmThread`] runs one on a dedicated tick thread.
pub use simgm_engine as engine;

/// Game-manager-to-game-manager networking (`simgm-net`).
///
/// [`net::NetworkBridge`] connects managers over [`net::MemoryHub`] or TCP.
pub use simgm_net as net;

/// DIS boundary (`simgm-dis`).
///
/// [`dis::DisComponent`] maps actor lifecycle messages to PDUs and back.
pub use simgm_dis as dis;

/// Record and playback (`simgm-replay`).
///
/// [`replay::ServerLogger`] records dispatched messages into a
/// [`replay::LogStore`] and plays them back.
pub use simgm_replay as replay;

/// Common imports for typical simgm usage.
///
/// ```rust
/// use simgm::prelude::*;
/// ```
///
/// This imports the most frequently used types: the game manager and its
/// configuration, the component trait, actors, messages and identifiers.
pub mod prelude {
    // Core types
    pub use simgm_core::{
        ActorId, MachineId, MachineInfo, Message, MessageFactory, MessageTypeId, ParamType,
        ParamValue, TickId,
    };

    // Engine
    pub use simgm_engine::{
        ActorComponent, ActorType, ComponentPriority, ComponentResult, DefaultMessageProcessor,
        GameActor, GameManager, GameManagerConfig, GmComponent, GmContext, GmCore, GmThread,
        StepReport,
    };

    // Errors
    pub use simgm_core::{FactoryError, ParamError};
    pub use simgm_engine::{ActorError, GmError};

    // Network, DIS and logging components
    pub use simgm_dis::{DisComponent, DisConfig};
    pub use simgm_net::{BridgeConfig, NetworkBridge};
    pub use simgm_replay::{LoggerConfig, ServerLogger};
}
