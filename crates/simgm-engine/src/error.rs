//! Error types for the game manager and actors.

use thiserror::Error;

use simgm_core::{ActorId, FactoryError, MessageTypeId, ParamError};

use crate::config::ConfigError;
use crate::manager::GmState;

/// Boxed error returned by component and actor hooks.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by [`GameManager`](crate::GameManager) operations.
#[derive(Debug, Error)]
pub enum GmError {
    /// The operation is not valid in the current lifecycle state.
    #[error("cannot {op} while the game manager is {state}")]
    InvalidState {
        /// Attempted operation.
        op: &'static str,
        /// State at the time of the call.
        state: GmState,
    },
    /// `configure` was called twice without an intervening shutdown.
    #[error("game manager is already configured")]
    AlreadyConfigured,
    /// A component with the same name is registered.
    #[error("a component named {name:?} is already registered")]
    DuplicateComponent {
        /// Component name.
        name: String,
    },
    /// No component with this name is registered.
    #[error("no component named {name:?}")]
    ComponentNotFound {
        /// Component name.
        name: String,
    },
    /// A component's `on_added_to_gm` hook failed; it was not registered.
    #[error("component {name:?} failed to initialise: {source}")]
    ComponentInit {
        /// Component name.
        name: String,
        /// Hook error.
        source: BoxError,
    },
    /// An actor with this id is already in the world.
    #[error("actor {id} is already in the world")]
    DuplicateActor {
        /// Actor id.
        id: ActorId,
    },
    /// No actor with this id is in the world.
    #[error("actor {id} is not in the world")]
    ActorNotFound {
        /// Actor id.
        id: ActorId,
    },
    /// The null actor id was supplied.
    #[error("the null actor id cannot be added to the world")]
    NullActorId,
    /// The operation is only valid for local actors.
    #[error("actor {id} is a remote mirror")]
    ActorIsRemote {
        /// Actor id.
        id: ActorId,
    },
    /// No actor type with this name is registered.
    #[error("actor type {name:?} is not registered")]
    UnknownActorType {
        /// Type name.
        name: String,
    },
    /// An actor type with this name is already registered.
    #[error("actor type {name:?} is already registered")]
    DuplicateActorType {
        /// Type name.
        name: String,
    },
    /// Actors may not subscribe to this message type.
    #[error("actors cannot subscribe to message type {type_id}")]
    InvalidSubscription {
        /// Rejected message type.
        type_id: MessageTypeId,
    },
    /// The outbound message queue is at capacity.
    #[error("message queue is full ({capacity} messages)")]
    QueueFull {
        /// Configured capacity.
        capacity: usize,
    },
    /// Invalid configuration or time settings.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Message factory failure.
    #[error(transparent)]
    Factory(#[from] FactoryError),
    /// Message parameter failure.
    #[error(transparent)]
    Param(#[from] ParamError),
    /// Actor property or component failure.
    #[error(transparent)]
    Actor(#[from] ActorError),
    /// An actor's own message handler failed. Actor state is authoritative,
    /// so this aborts the step.
    #[error("actor {actor} failed handling message type {message_type}: {source}")]
    ActorHandler {
        /// Failing actor.
        actor: ActorId,
        /// Type of the message being handled.
        message_type: MessageTypeId,
        /// Handler error.
        source: BoxError,
    },
    /// A background thread could not be spawned.
    #[error("failed to spawn thread: {reason}")]
    ThreadSpawn {
        /// OS error text.
        reason: String,
    },
    /// The tick thread panicked; its game manager could not be recovered.
    #[error("tick thread panicked")]
    TickThreadPanicked,
}

/// Errors raised by actor property and component access.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActorError {
    /// The actor has been removed from the world.
    #[error("actor {id} has been removed from the world")]
    InvalidState {
        /// Actor id.
        id: ActorId,
    },
    /// The actor type declares no such property.
    #[error("no property named {name:?}")]
    UnknownProperty {
        /// Property name.
        name: String,
    },
    /// The property is read-only for local writers.
    #[error("property {name:?} is read-only")]
    ReadOnlyProperty {
        /// Property name.
        name: String,
    },
    /// A component with the same key is already attached.
    #[error("actor already has a component with key {key:?}")]
    DuplicateActorComponent {
        /// Component key.
        key: &'static str,
    },
    /// The value does not match the property type.
    #[error(transparent)]
    Param(#[from] ParamError),
}
