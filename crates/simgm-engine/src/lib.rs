//! The game manager: actor lifecycle, component dispatch and the per-tick
//! message loop.
//!
//! A [`GameManager`] owns the actors in the world and an ordered list of
//! [`GmComponent`]s. Messages sent through it are queued and dispatched at
//! the next [`step`](GameManager::step): to every component in priority
//! order, then to the interested actors. Nothing sent during a step is
//! seen before the following one, which keeps runs deterministic and
//! replayable.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

pub mod actor;
pub mod component;
pub mod config;
pub mod context;
pub mod default_processor;
pub mod error;
pub mod manager;
pub mod metrics;
pub mod property;
pub mod queue;
pub mod runner;
pub mod timer;

pub use actor::{ActorComponent, ActorCore, ActorState, ActorTable, GameActor, TickInfo};
pub use component::{AsAny, ComponentPriority, ComponentResult, GmComponent};
pub use config::{ConfigError, GameManagerConfig};
pub use context::{GmContext, GmCore};
pub use default_processor::DefaultMessageProcessor;
pub use error::{ActorError, BoxError, GmError};
pub use manager::{GameManager, GmState, StepReport};
pub use metrics::StepMetrics;
pub use property::{ActorType, ActorTypeBuilder, ActorTypeRegistry, PropertyDef};
pub use runner::{GmThread, StoppedGm, SubmitError};
pub use timer::TimerClock;
